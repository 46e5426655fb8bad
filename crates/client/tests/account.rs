use vendorportal_auth::AccountRole;
use vendorportal_client::account::{IdentityCheck, PasswordReset, Registration};
use vendorportal_client::{ApiClient, AuthError, ClientConfig, RequestError, SessionManager, SessionStore};
use vendorportal_core::DomainError;
use vendorportal_testkit::StubApi;

fn session_for(api: &StubApi) -> SessionManager {
    let config = ClientConfig::default().with_api_url(&api.base_url);
    SessionManager::new(ApiClient::new(&config).expect("http client"), SessionStore::in_memory())
}

fn registration(username: &str, email: &str) -> Registration {
    Registration {
        username: username.to_string(),
        first_name: "Rosa".to_string(),
        last_name: "Reyes".to_string(),
        email: email.to_string(),
        password: "gutfeel42".to_string(),
        role: AccountRole::from("patient"),
        status: None,
        age: Some(34),
        gender: None,
        phone: None,
        professional_data: None,
    }
}

#[tokio::test]
async fn registered_account_can_sign_in() {
    let api = StubApi::spawn().await;
    let session = session_for(&api);

    let registered = session.register(&registration("rosa_r", "rosa@example.test")).await.unwrap();
    assert_eq!(registered.username, "rosa_r");
    assert_eq!(registered.status, "active");
    assert_eq!(registered.role, AccountRole::Patient);
    assert!(!session.is_authenticated());

    let profile = session.login("rosa_r", "gutfeel42").await.unwrap();
    assert_eq!(profile.user_id, registered.user_id);
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn duplicate_username_is_refused() {
    let api = StubApi::spawn().await;
    let session = session_for(&api);

    let err = session.register(&registration("ed_eli", "eli.other@example.test")).await.unwrap_err();
    assert!(
        matches!(&err, RequestError::Status { status: 400, detail } if detail == "Username already taken"),
        "got {err:?}"
    );

    let err = session.register(&registration("eli_two", "ed_eli@acme.test")).await.unwrap_err();
    assert!(
        matches!(&err, RequestError::Status { status: 400, detail } if detail == "Email already registered"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn invalid_registration_never_reaches_the_api() {
    let api = StubApi::spawn().await;
    let session = session_for(&api);

    let err = session.register(&registration("rosa_r", "not-an-email")).await.unwrap_err();
    assert!(matches!(err, RequestError::Invalid(DomainError::Validation(_))), "got {err:?}");
    assert_eq!(api.hits("/register"), 0);
}

#[tokio::test]
async fn identity_must_match_the_account() {
    let api = StubApi::spawn().await;
    let session = session_for(&api);
    let recovery = session.recovery();

    let verified = recovery
        .verify_identity(&IdentityCheck::new("acme_admin", "acme_admin@acme.test"))
        .await
        .unwrap();
    assert!(verified.verified);

    let err = recovery
        .verify_identity(&IdentityCheck::new("acme_admin", "ed_eli@acme.test"))
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn reset_password_replaces_the_old_one() {
    let api = StubApi::spawn().await;
    let session = session_for(&api);

    session
        .recovery()
        .reset_password(&PasswordReset {
            identity: IdentityCheck::new("vic_viewer", "vic_viewer@acme.test"),
            new_password: "fresh-start".to_string(),
        })
        .await
        .unwrap();

    let err = session.login("vic_viewer", "viewer1").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials), "got {err:?}");
    session.login("vic_viewer", "fresh-start").await.unwrap();
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn over_long_new_password_is_rejected_locally() {
    let api = StubApi::spawn().await;
    let session = session_for(&api);

    let err = session
        .recovery()
        .reset_password(&PasswordReset {
            identity: IdentityCheck::new("vic_viewer", "vic_viewer@acme.test"),
            new_password: "p".repeat(73),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RequestError::Invalid(DomainError::Validation(_))), "got {err:?}");
    assert_eq!(api.hits("/reset-password"), 0);
    session.login("vic_viewer", "viewer1").await.unwrap();
}
