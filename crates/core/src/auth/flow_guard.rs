//! Explicit-flow guard
//!
//! Decides whether an identity provider notification may drive passive
//! re-hydration. Two inputs:
//!
//! - an in-flight marker held by a [`FlowTicket`] for the whole explicit
//!   login/register/logout, released when the ticket is completed or dropped
//! - a revision watermark: notifications at or below it were caused by work
//!   the synchronizer already accounted for
//!
//! An epoch counter lets a passive hydration detect that an explicit flow
//! started while it was awaiting I/O.

use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

/// Kind of explicit flow holding the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Login,
    Register,
    Logout,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::Logout => "logout",
        })
    }
}

/// Why a notification was suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    /// An explicit flow owns the transition
    FlowInFlight(FlowKind),
    /// Revision already accounted for
    Stale { revision: u64, watermark: u64 },
}

#[derive(Debug, Default)]
struct GuardState {
    in_flight: Option<FlowKind>,
    epoch: u64,
    watermark: u64,
}

/// Shared guard owned by the synchronizer
#[derive(Debug, Default)]
pub struct FlowGuard {
    state: Mutex<GuardState>,
}

impl FlowGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an explicit flow as in flight
    ///
    /// Callers serialize explicit flows; beginning a second flow while one is
    /// held simply replaces the marker.
    pub fn begin(&self, kind: FlowKind) -> FlowTicket<'_> {
        let epoch = {
            let mut state = self.state.lock();
            state.in_flight = Some(kind);
            state.epoch += 1;
            state.epoch
        };
        debug!(flow = %kind, epoch, "explicit auth flow started");
        FlowTicket { guard: self, kind, epoch, released: false }
    }

    /// `Some` when a notification with `revision` must not trigger hydration
    #[must_use]
    pub fn suppression(&self, revision: u64) -> Option<Suppression> {
        let state = self.state.lock();
        if let Some(kind) = state.in_flight {
            return Some(Suppression::FlowInFlight(kind));
        }
        (revision <= state.watermark)
            .then_some(Suppression::Stale { revision, watermark: state.watermark })
    }

    /// Ignore every notification up to and including `revision`
    pub fn advance_watermark(&self, revision: u64) {
        let mut state = self.state.lock();
        state.watermark = state.watermark.max(revision);
    }

    /// Number of explicit flows started so far
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    #[must_use]
    pub fn watermark(&self) -> u64 {
        self.state.lock().watermark
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<FlowKind> {
        self.state.lock().in_flight
    }

    fn release(&self, epoch: u64) {
        let mut state = self.state.lock();
        // A newer flow may have replaced the marker
        if state.epoch == epoch {
            state.in_flight = None;
        }
    }
}

/// Proof that an explicit flow is in flight
///
/// Dropping the ticket releases the in-flight marker; [`FlowTicket::complete`]
/// additionally advances the watermark.
#[must_use = "dropping the ticket immediately releases the guard"]
pub struct FlowTicket<'a> {
    guard: &'a FlowGuard,
    kind: FlowKind,
    epoch: u64,
    released: bool,
}

impl FlowTicket<'_> {
    #[must_use]
    pub const fn kind(&self) -> FlowKind {
        self.kind
    }

    /// Finish the flow, ignoring notifications up to `revision`
    pub fn complete(mut self, revision: u64) {
        self.guard.advance_watermark(revision);
        self.guard.release(self.epoch);
        self.released = true;
        debug!(flow = %self.kind, epoch = self.epoch, revision, "explicit auth flow settled");
    }
}

impl Drop for FlowTicket<'_> {
    fn drop(&mut self) {
        if !self.released {
            self.guard.release(self.epoch);
            debug!(flow = %self.kind, epoch = self.epoch, "explicit auth flow abandoned");
        }
    }
}
