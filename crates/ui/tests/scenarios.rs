use std::sync::Arc;

use chrono::Duration;

use vendorportal_auth::{AccountRole, Permission};
use vendorportal_client::{ApiClient, ClientConfig, SessionManager, SessionStore};
use vendorportal_testkit::{StubApi, mint_token};
use vendorportal_ui::{
    Action, Guard, GuardDecision, PermissionState, ProtectedRoute, RouteAction, RouteState, Section,
    SessionContext, visible_sections,
};

fn context(api_url: &str) -> (ClientConfig, SessionContext) {
    let config = ClientConfig::default().with_api_url(api_url);
    let session = SessionManager::new(ApiClient::new(&config).expect("http client"), SessionStore::in_memory());
    (config, SessionContext::new(Arc::new(session)))
}

#[tokio::test]
async fn vendor_login_renders_vendor_route() {
    let api = StubApi::spawn().await;
    let (config, ctx) = context(&api.base_url);
    ctx.session().login("acme_admin", "admin123").await.unwrap();

    let unrestricted = ProtectedRoute::new(&config);
    assert_eq!(unrestricted.visit("/profile", ctx.session()), Some(RouteAction::Render));

    let route = ProtectedRoute::vendor_portal(&config);
    let action = route.visit_validated("/dashboard", ctx.session()).await.unwrap();

    assert_eq!(action, RouteAction::Render);
    assert_eq!(route.state(), RouteState::Authenticated);
    assert_eq!(visible_sections(&ctx.permission_state()), Section::ALL.to_vec());
}

#[tokio::test]
async fn patient_is_sent_to_unauthorized() {
    let api = StubApi::spawn().await;
    let (config, ctx) = context(&api.base_url);
    ctx.session().login("pat01", "patient1").await.unwrap();

    let route = ProtectedRoute::new(&config).allow(AccountRole::Vendor);
    let action = route.visit("/products", ctx.session()).unwrap();

    assert_eq!(route.state(), RouteState::Forbidden);
    assert_eq!(action.target().as_deref(), Some("/unauthorized"));
    // Forbidden is not a logout.
    assert!(ctx.is_authenticated());
}

#[tokio::test]
async fn no_token_redirects_to_login_with_return_location() {
    let (config, ctx) = context("http://127.0.0.1:9");

    let route = ProtectedRoute::vendor_portal(&config);
    let action = route.visit("/patients/42", ctx.session()).unwrap();

    assert_eq!(route.state(), RouteState::Unauthenticated);
    assert_eq!(
        action,
        RouteAction::Redirect {
            to: "/login".into(),
            return_to: Some("/patients/42".into())
        }
    );
    assert_eq!(action.target().unwrap(), "/login?redirect=%2Fpatients%2F42");
}

#[tokio::test]
async fn expired_token_redirects_and_clears_storage() {
    let (config, ctx) = context("http://127.0.0.1:9");
    ctx.session()
        .store()
        .save_token(&mint_token("acme_admin", "vendor", Some(100), Duration::minutes(-5)))
        .unwrap();

    let route = ProtectedRoute::vendor_portal(&config);
    let action = route.visit("/billing", ctx.session()).unwrap();

    assert_eq!(route.state(), RouteState::Unauthenticated);
    assert!(matches!(action, RouteAction::Redirect { .. }));
    assert!(ctx.session().token().is_none());
}

#[tokio::test]
async fn editor_can_edit_but_not_delete_employees() {
    let api = StubApi::spawn().await;
    let (_, ctx) = context(&api.base_url);
    ctx.session().login("ed_eli", "editor1").await.unwrap();

    let state = ctx.permission_state();
    let caps = ctx.capabilities();
    assert!(caps.can_edit_content());
    assert!(!caps.has_permission(Permission::CanDeleteEmployees));

    assert_eq!(Guard::edit().decide(&state), GuardDecision::Children);
    assert_eq!(Guard::hide_from_viewers().decide(&state), GuardDecision::Children);
    assert_eq!(
        Guard::permission(Permission::CanDeleteEmployees).with_fallback().decide(&state),
        GuardDecision::Fallback
    );
    assert!(Action::EditProduct.is_allowed(&state));
    assert!(!Action::DeleteEmployee.is_allowed(&state));
    assert!(!visible_sections(&state).contains(&Section::Employees));
}

#[tokio::test]
async fn editor_does_not_see_patients() {
    let api = StubApi::spawn().await;
    let (_, ctx) = context(&api.base_url);
    ctx.session().login("ed_eli", "editor1").await.unwrap();

    let state = ctx.permission_state();
    assert_eq!(visible_sections(&state), vec![Section::Dashboard, Section::Products]);
    assert!(!Action::CreatePatient.is_allowed(&state));
    // The API agrees with the hidden section.
    assert!(ctx.session().patients().list(&Default::default()).await.is_err());
    assert!(ctx.is_authenticated());
}

#[tokio::test]
async fn admin_guard_falls_back_for_employees_and_patients() {
    let api = StubApi::spawn().await;
    for (username, password) in [("mgr_mia", "manager1"), ("vic_viewer", "viewer1"), ("pat01", "patient1")] {
        let (_, ctx) = context(&api.base_url);
        ctx.session().login(username, password).await.unwrap();
        assert_eq!(
            Guard::admin().with_fallback().decide(&ctx.permission_state()),
            GuardDecision::Fallback,
            "{username}"
        );
    }
}

#[tokio::test]
async fn revoked_session_moves_rendered_route_to_login() {
    let api = StubApi::spawn().await;
    let (config, ctx) = context(&api.base_url);
    ctx.session().login("mgr_mia", "manager1").await.unwrap();
    let mut events = ctx.events();

    let route = ProtectedRoute::vendor_portal(&config);
    assert_eq!(route.visit("/employees", ctx.session()), Some(RouteAction::Render));

    api.revoke_all_tokens();
    assert!(ctx.session().employees().list(&Default::default()).await.is_err());

    let event = events.recv().await.unwrap();
    let action = route.on_session_event(&event).unwrap();
    assert_eq!(action.target().unwrap(), "/login?redirect=%2Femployees");
    assert_eq!(route.state(), RouteState::Unauthenticated);
    assert_eq!(ctx.permission_state(), PermissionState::Ready(Default::default()));
}

#[tokio::test]
async fn server_rejection_during_route_check_redirects_to_login() {
    let api = StubApi::spawn().await;
    let (config, ctx) = context(&api.base_url);
    ctx.session().login("acme_admin", "admin123").await.unwrap();
    api.revoke_all_tokens();

    let route = ProtectedRoute::vendor_portal(&config);
    let action = route.visit_validated("/clinical-trials", ctx.session()).await.unwrap();

    assert_eq!(route.state(), RouteState::Unauthenticated);
    assert_eq!(action.target().unwrap(), "/login?redirect=%2Fclinical-trials");
}
