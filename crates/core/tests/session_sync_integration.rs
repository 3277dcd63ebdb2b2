//! End-to-end behaviour of the session synchronizer over in-memory ports

use std::sync::Arc;
use std::time::Duration;

use homechef_core::testing::{BackendCall, MockIdentityProvider, MockSessionBackend};
use homechef_core::{
    AuthError, BridgeError, FlowFailure, FlowKind, GuardDecision, IdentityError, IdentityProvider,
    NotificationOutcome, Redirect, RouteGuards, RouteTable, SessionSynchronizer, Suppression,
};
use homechef_domain::{
    AuthNotification, AuthPhase, BackendProfile, LoginForm, RegistrationForm, Role, UnifiedSession,
};
use tokio::sync::watch;

fn server_error() -> BridgeError {
    BridgeError::Status { status: 500, message: "Internal Server Error".to_string() }
}

fn setup(
    identity: MockIdentityProvider,
    backend: MockSessionBackend,
) -> (Arc<MockIdentityProvider>, Arc<MockSessionBackend>, Arc<SessionSynchronizer>) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("homechef_core=debug")
        .try_init();
    let identity = Arc::new(identity);
    let backend = Arc::new(backend);
    let sync = Arc::new(SessionSynchronizer::new(identity.clone(), backend.clone()));
    (identity, backend, sync)
}

async fn wait_for_phase(
    receiver: &mut watch::Receiver<UnifiedSession>,
    phase: AuthPhase,
) -> UnifiedSession {
    tokio::time::timeout(Duration::from_secs(2), receiver.wait_for(|s| s.phase() == phase))
        .await
        .expect("timed out waiting for session phase")
        .expect("session channel closed")
        .clone()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_login_uses_role_claim_even_when_profile_fetch_fails() {
    let (_, backend, sync) = setup(
        MockIdentityProvider::new().with_account("admin@x.com", "secret1", Some("admin")),
        MockSessionBackend::new(),
    );
    backend.fail_fetch(server_error());

    let authenticated = sync.login(&LoginForm::new("admin@x.com", "secret1")).await.unwrap();

    assert_eq!(authenticated.role, Role::Admin);
    assert!(!authenticated.user.has_backend_profile);
    assert_eq!(sync.session().phase(), AuthPhase::Authenticated(Role::Admin));
}

#[tokio::test]
async fn test_login_without_role_claim_is_standard_user() {
    let (_, _, sync) = setup(
        MockIdentityProvider::new().with_account("a@x.com", "secret1", None),
        MockSessionBackend::new(),
    );

    let authenticated = sync.login(&LoginForm::new("a@x.com", "secret1")).await.unwrap();

    assert_eq!(authenticated.role, Role::User);
    assert_eq!(sync.session().role(), Some(Role::User));
}

#[tokio::test]
async fn test_login_merges_backend_profile() {
    let (_, _, sync) = setup(
        MockIdentityProvider::new().with_account("a@x.com", "secret1", Some("chef")),
        MockSessionBackend::new().with_profile(
            "uid-1",
            BackendProfile {
                name: Some("Chef Ann".to_string()),
                address: Some("1 Main St".to_string()),
                ..BackendProfile::default()
            },
        ),
    );

    let authenticated = sync.login(&LoginForm::new("a@x.com", "secret1")).await.unwrap();

    assert_eq!(authenticated.user.name.as_deref(), Some("Chef Ann"));
    assert_eq!(authenticated.user.address.as_deref(), Some("1 Main St"));
    assert!(authenticated.user.has_backend_profile);
}

#[tokio::test]
async fn test_repeated_login_tolerates_existing_backend_profile() {
    let (_, backend, sync) = setup(
        MockIdentityProvider::new().with_account("a@x.com", "secret1", None),
        MockSessionBackend::new(),
    );

    sync.login(&LoginForm::new("a@x.com", "secret1")).await.unwrap();
    sync.logout().await;
    sync.login(&LoginForm::new("a@x.com", "secret1")).await.unwrap();

    let upserts = backend
        .calls()
        .into_iter()
        .filter(|call| matches!(call, BackendCall::EnsureRegistered { .. }))
        .count();
    assert_eq!(upserts, 2);
    assert!(backend.is_registered("uid-1"));
    assert!(sync.session().is_authenticated());
}

#[tokio::test]
async fn test_invalid_credentials_leave_session_untouched() {
    let (_, backend, sync) = setup(MockIdentityProvider::new(), MockSessionBackend::new());

    let err = sync.login(&LoginForm::new("nobody@x.com", "secret1")).await.unwrap_err();

    assert_eq!(
        err,
        AuthError::LoginFailed(FlowFailure::Identity(IdentityError::InvalidCredentials))
    );
    assert_eq!(err.user_message(), "Login failed: invalid email or password.");
    assert_eq!(sync.session().phase(), AuthPhase::Uninitialized);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_backend_login_rejection_rolls_back_identity_sign_in() {
    let (identity, backend, sync) = setup(
        MockIdentityProvider::new().with_account("a@x.com", "secret1", None),
        MockSessionBackend::new(),
    );
    sync.handle_notification(AuthNotification { revision: 1, principal: None }).await;
    let backend_err = BridgeError::Login("token revoked".to_string());
    backend.fail_login(backend_err.clone());

    let err = sync.login(&LoginForm::new("a@x.com", "secret1")).await.unwrap_err();

    assert_eq!(err, AuthError::LoginFailed(FlowFailure::Backend(backend_err)));
    assert_eq!(sync.session().phase(), AuthPhase::Anonymous);
    assert!(!identity.is_signed_in());
    assert_eq!(identity.sign_out_calls(), 1);
}

#[tokio::test]
async fn test_failed_login_as_another_user_signs_out_the_previous_one() {
    let (identity, backend, sync) = setup(
        MockIdentityProvider::new()
            .with_account("a@x.com", "secret1", None)
            .with_account("b@x.com", "secret2", None),
        MockSessionBackend::new(),
    );
    sync.login(&LoginForm::new("a@x.com", "secret1")).await.unwrap();
    assert_eq!(sync.session().phase(), AuthPhase::Authenticated(Role::User));

    backend.fail_login(BridgeError::Login("token revoked".to_string()));
    sync.login(&LoginForm::new("b@x.com", "secret2")).await.unwrap_err();

    // The provider no longer holds a, so the session must not claim it does
    assert!(identity.current_principal().is_none());
    assert_eq!(sync.session().phase(), AuthPhase::Anonymous);
    assert!(sync.session().user().is_none());
}

#[tokio::test]
async fn test_register_merges_backend_profile_fields() {
    let (_, backend, sync) = setup(MockIdentityProvider::new(), MockSessionBackend::new());
    let form = RegistrationForm {
        email: "a@x.com".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
        name: "A".to_string(),
        address: "X".to_string(),
        ..RegistrationForm::default()
    };

    let authenticated = sync.register(&form).await.unwrap();

    assert_eq!(authenticated.role, Role::User);
    assert_eq!(authenticated.user.email, "a@x.com");
    assert_eq!(authenticated.user.name.as_deref(), Some("A"));
    assert_eq!(authenticated.user.address.as_deref(), Some("X"));
    assert_eq!(sync.session().phase(), AuthPhase::Authenticated(Role::User));
    assert!(backend
        .calls()
        .iter()
        .any(|call| matches!(call, BackendCall::Register { uid } if uid == "uid-1")));
}

#[tokio::test]
async fn test_register_uses_requested_role() {
    let (_, backend, sync) = setup(MockIdentityProvider::new(), MockSessionBackend::new());
    let form = RegistrationForm {
        email: "chef@x.com".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
        name: "Chef".to_string(),
        address: "Market St".to_string(),
        role: Some(Role::Chef),
        ..RegistrationForm::default()
    };

    let authenticated = sync.register(&form).await.unwrap();

    assert_eq!(authenticated.role, Role::Chef);
    assert_eq!(sync.session().phase(), AuthPhase::Authenticated(Role::Chef));
    assert!(backend.calls().iter().any(|call| matches!(
        call,
        BackendCall::EnsureRegistered { role: Role::Chef, .. }
    )));
}

#[tokio::test]
async fn test_register_survives_backend_registration_failure() {
    let (_, backend, sync) = setup(MockIdentityProvider::new(), MockSessionBackend::new());
    backend.fail_register(BridgeError::Registration("db down".to_string()));
    let form = RegistrationForm {
        email: "b@x.com".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
        name: "B".to_string(),
        address: "Y".to_string(),
        ..RegistrationForm::default()
    };

    let authenticated = sync.register(&form).await.unwrap();

    assert!(!authenticated.user.has_backend_profile);
    assert_eq!(authenticated.user.name.as_deref(), Some("B"));
    assert!(backend.is_registered("uid-1"));
}

#[tokio::test]
async fn test_register_rejected_by_identity_provider() {
    let (identity, backend, sync) = setup(MockIdentityProvider::new(), MockSessionBackend::new());
    identity.fail_sign_up(IdentityError::WeakPassword("too weak".to_string()));
    let form = RegistrationForm {
        email: "c@x.com".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
        name: "C".to_string(),
        address: "Z".to_string(),
        ..RegistrationForm::default()
    };

    let err = sync.register(&form).await.unwrap_err();

    assert_eq!(err.user_message(), "Registration failed: choose a stronger password.");
    assert_eq!(sync.session().phase(), AuthPhase::Uninitialized);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_register_form_errors_block_the_flow() {
    let (_, backend, sync) = setup(MockIdentityProvider::new(), MockSessionBackend::new());
    let form = RegistrationForm {
        email: "c@x.com".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret2".to_string(),
        ..RegistrationForm::default()
    };

    assert!(matches!(sync.register(&form).await, Err(AuthError::InvalidForm(_))));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_logout_ends_anonymous_even_when_backend_fails() {
    let (identity, backend, sync) = setup(
        MockIdentityProvider::new().with_account("a@x.com", "secret1", None),
        MockSessionBackend::new(),
    );
    sync.login(&LoginForm::new("a@x.com", "secret1")).await.unwrap();
    backend.fail_logout(BridgeError::Network("connection refused".to_string()));

    sync.logout().await;

    assert_eq!(sync.session().phase(), AuthPhase::Anonymous);
    assert_eq!(sync.session().user(), None);
    assert!(!identity.is_signed_in());
    assert!(backend.calls().contains(&BackendCall::Logout));
}

#[tokio::test]
async fn test_restored_session_hydrates_with_identity_data_when_profile_fails() {
    let (identity, backend, sync) = setup(
        MockIdentityProvider::new().with_account("a@x.com", "secret1", Some("chef")),
        MockSessionBackend::new(),
    );
    backend.fail_fetch(server_error());
    identity.restore_session("a@x.com");
    let mut receiver = sync.watch_session();

    let handle = sync.start();
    let session = wait_for_phase(&mut receiver, AuthPhase::Authenticated(Role::Chef)).await;

    let user = session.user().unwrap();
    assert_eq!(user.uid, "uid-1");
    assert_eq!(user.email, "a@x.com");
    assert!(!user.has_backend_profile);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_hydration_refresh_does_not_trigger_second_hydration() {
    let (identity, _, sync) = setup(
        MockIdentityProvider::new().with_account("a@x.com", "secret1", None),
        MockSessionBackend::new(),
    );
    identity.restore_session("a@x.com");
    let mut receiver = sync.watch_session();

    let handle = sync.start();
    wait_for_phase(&mut receiver, AuthPhase::Authenticated(Role::User)).await;
    settle().await;

    assert_eq!(identity.refresh_calls(), 1);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_start_without_session_goes_anonymous() {
    let (identity, _, sync) = setup(MockIdentityProvider::new(), MockSessionBackend::new());
    let mut receiver = sync.watch_session();

    let handle = sync.start();
    assert_eq!(sync.session().phase(), AuthPhase::Hydrating);

    identity.initialize_signed_out();
    wait_for_phase(&mut receiver, AuthPhase::Anonymous).await;
    handle.shutdown().await;
}

#[tokio::test]
async fn test_notifications_during_login_leave_state_unchanged() {
    let (identity, backend, sync) = setup(
        MockIdentityProvider::new().with_account("chef@x.com", "secret1", Some("chef")),
        MockSessionBackend::new(),
    );
    let mut receiver = sync.watch_session();
    let handle = sync.start();
    identity.initialize_signed_out();
    wait_for_phase(&mut receiver, AuthPhase::Anonymous).await;

    let gate = backend.hold_next_login();
    let login = tokio::spawn({
        let sync = Arc::clone(&sync);
        async move { sync.login(&LoginForm::new("chef@x.com", "secret1")).await }
    });
    gate.entered().await;

    // The sign-in notification itself was published while the flow held the guard
    settle().await;
    assert_eq!(sync.session().phase(), AuthPhase::Anonymous);
    assert_eq!(sync.guard().in_flight(), Some(FlowKind::Login));

    let outcome = sync
        .handle_notification(AuthNotification { revision: u64::MAX, principal: None })
        .await;
    assert_eq!(
        outcome,
        NotificationOutcome::Suppressed(Suppression::FlowInFlight(FlowKind::Login))
    );
    assert_eq!(sync.session().phase(), AuthPhase::Anonymous);

    gate.release();
    let authenticated = login.await.unwrap().unwrap();
    assert_eq!(authenticated.role, Role::Chef);

    settle().await;
    assert_eq!(sync.session().phase(), AuthPhase::Authenticated(Role::Chef));
    assert_eq!(sync.guard().in_flight(), None);
    assert_eq!(identity.refresh_calls(), 0);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_later_provider_change_rehydrates() {
    let (identity, _, sync) = setup(
        MockIdentityProvider::new().with_account("a@x.com", "secret1", None),
        MockSessionBackend::new(),
    );
    let mut receiver = sync.watch_session();
    let handle = sync.start();

    sync.login(&LoginForm::new("a@x.com", "secret1")).await.unwrap();
    // Role granted elsewhere; the provider signals a changed principal
    identity.set_role("a@x.com", Some("admin"));
    identity.emit(identity.current_principal());

    wait_for_phase(&mut receiver, AuthPhase::Authenticated(Role::Admin)).await;
    handle.shutdown().await;
}

#[tokio::test]
async fn test_anonymous_visitor_is_sent_to_login_with_return_path() {
    let (_, _, sync) = setup(MockIdentityProvider::new(), MockSessionBackend::new());
    sync.handle_notification(AuthNotification { revision: 1, principal: None }).await;

    let session = sync.session();
    let decision =
        RouteTable::standard().evaluate(&session, "/dashboard/orders", &RouteGuards::default());

    assert_eq!(
        decision,
        GuardDecision::Redirect(Redirect {
            to: "/login".to_string(),
            from: Some("/dashboard/orders".to_string()),
            replace: true,
        })
    );
}

#[tokio::test]
async fn test_standard_user_never_renders_admin_pages() {
    let (_, _, sync) = setup(
        MockIdentityProvider::new().with_account("a@x.com", "secret1", None),
        MockSessionBackend::new(),
    );
    sync.login(&LoginForm::new("a@x.com", "secret1")).await.unwrap();
    let table = RouteTable::standard();
    let guards = RouteGuards::default();

    for path in ["/dashboard/manage-users", "/dashboard/manage-requests", "/dashboard/statistics"] {
        let decision = table.evaluate(&sync.session(), path, &guards);
        assert_eq!(decision.redirect_target(), Some("/dashboard/profile"), "{path}");
    }
    assert!(table.evaluate(&sync.session(), "/dashboard/orders", &guards).is_render());
}
