//! Auth error taxonomy
//!
//! Identity-provider and backend-bridge errors are separate types so the
//! synchronizer can decide per call site which are fatal and which only
//! degrade the session.

use homechef_domain::FormError;
use thiserror::Error;

/// Identity provider failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Malformed or already-registered email
    #[error("Credential rejected: {0}")]
    Credential(String),

    /// Password does not satisfy the provider's policy
    #[error("Weak password: {0}")]
    WeakPassword(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    /// No principal is signed in
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Identity provider unreachable: {0}")]
    Network(String),

    /// Any other provider response, including malformed tokens
    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Backend session bridge failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// `POST /register` rejected the identity token or fields
    #[error("Backend registration failed: {0}")]
    Registration(String),

    /// `POST /login` rejected the identity token (stale, revoked, ...)
    #[error("Backend login failed: {0}")]
    Login(String),

    #[error("Backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Backend unreachable: {0}")]
    Network(String),

    #[error("Invalid backend response: {0}")]
    Decode(String),
}

/// Underlying cause of a failed explicit flow
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowFailure {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Backend(#[from] BridgeError),
}

/// Errors surfaced to the UI by explicit login/register calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Login failed: {0}")]
    LoginFailed(#[source] FlowFailure),

    #[error("Registration failed: {0}")]
    RegistrationFailed(#[source] FlowFailure),

    #[error("Invalid form input: {}", join_form_errors(.0))]
    InvalidForm(Vec<FormError>),
}

impl AuthError {
    /// Actionable message suitable for a toast or inline form error
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::LoginFailed(FlowFailure::Identity(
                IdentityError::InvalidCredentials | IdentityError::Credential(_),
            )) => "Login failed: invalid email or password.".to_string(),
            Self::LoginFailed(FlowFailure::Identity(IdentityError::AccountDisabled)) => {
                "Login failed: this account has been disabled.".to_string()
            }
            Self::LoginFailed(FlowFailure::Identity(IdentityError::Network(_)))
            | Self::LoginFailed(FlowFailure::Backend(BridgeError::Network(_))) => {
                "Login failed: check your connection and try again.".to_string()
            }
            Self::LoginFailed(_) => "Login failed.".to_string(),
            Self::RegistrationFailed(FlowFailure::Identity(IdentityError::Credential(reason))) => {
                format!("Registration failed: {reason}.")
            }
            Self::RegistrationFailed(FlowFailure::Identity(IdentityError::WeakPassword(_))) => {
                "Registration failed: choose a stronger password.".to_string()
            }
            Self::RegistrationFailed(_) => "Registration failed.".to_string(),
            Self::InvalidForm(errors) => join_form_errors(errors),
        }
    }
}

fn join_form_errors(errors: &[FormError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_are_actionable() {
        let err = AuthError::LoginFailed(IdentityError::InvalidCredentials.into());
        assert_eq!(err.user_message(), "Login failed: invalid email or password.");

        let err = AuthError::LoginFailed(BridgeError::Login("revoked".to_string()).into());
        assert_eq!(err.user_message(), "Login failed.");

        let err = AuthError::RegistrationFailed(
            IdentityError::Credential("email already in use".to_string()).into(),
        );
        assert_eq!(err.user_message(), "Registration failed: email already in use.");
    }

    #[test]
    fn test_invalid_form_lists_every_rule() {
        let err = AuthError::InvalidForm(vec![
            FormError::Required("Email"),
            FormError::PasswordTooShort(6),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid form input: Email is required; Password must be at least 6 characters"
        );
    }

    #[test]
    fn test_source_chain_preserved() {
        use std::error::Error as _;

        let err = AuthError::LoginFailed(IdentityError::NotAuthenticated.into());
        assert_eq!(err.source().map(ToString::to_string), Some("Not authenticated".to_string()));
    }
}
