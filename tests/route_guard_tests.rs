mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use common::{MockRepoControl, signed_in_state, state_with, user};
use rbac_portal::{
    MockDirectory, MockSessionProvider, create_router,
    middleware::authorize,
    models::{EmployeeDashboard, UserRole},
    policy::{AccessDecision, RedirectTarget},
    session::SessionTokens,
};
use axum_extra::extract::CookieJar;
use tower::ServiceExt;
use uuid::Uuid;

async fn get(state: rbac_portal::AppState, path: &str) -> Response {
    create_router(state)
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

fn rotated_tokens() -> SessionTokens {
    SessionTokens {
        access_token: "rotated-access".to_string(),
        refresh_token: "rotated-refresh".to_string(),
        expires_in: Some(3600),
    }
}

// --- Redirects ---

#[tokio::test]
async fn test_root_redirects_to_role_home() {
    let admin = user(UserRole::Admin, Some(Uuid::new_v4()));
    let (state, _) = signed_in_state(&admin);

    let response = get(state, "/").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/dashboard/admin"));
}

#[tokio::test]
async fn test_anonymous_dashboard_redirects_to_login() {
    let state = state_with(
        MockRepoControl::default(),
        MockDirectory::default(),
        Some(MockSessionProvider::anonymous()),
    );

    let response = get(state, "/dashboard/super").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/auth/login"));
}

#[tokio::test]
async fn test_anonymous_login_page_is_served() {
    let state = state_with(
        MockRepoControl::default(),
        MockDirectory::default(),
        Some(MockSessionProvider::anonymous()),
    );

    let response = get(state, "/auth/login").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signed_in_login_page_redirects_home() {
    let employee = user(UserRole::Employee, Some(Uuid::new_v4()));
    let (state, _) = signed_in_state(&employee);

    let response = get(state, "/auth/login").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/dashboard/employee"));
}

#[tokio::test]
async fn test_employee_in_super_namespace_is_unauthorized() {
    let employee = user(UserRole::Employee, Some(Uuid::new_v4()));
    let (state, _) = signed_in_state(&employee);

    let response = get(state, "/dashboard/super/organizations").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/dashboard/unauthorized"));
}

#[tokio::test]
async fn test_bare_dashboard_redirects_home() {
    let super_user = user(UserRole::SuperUser, None);
    let (state, _) = signed_in_state(&super_user);

    let response = get(state, "/dashboard").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/dashboard/super"));
}

// --- Continue ---

#[tokio::test]
async fn test_own_namespace_reaches_handler() {
    let admin = user(UserRole::Admin, Some(Uuid::new_v4()));
    let (state, _) = signed_in_state(&admin);

    let response = get(state, "/dashboard/admin").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(location(&response).is_none());
}

#[tokio::test]
async fn test_super_user_enters_admin_namespace() {
    // Allowed by the guard; without an organization the page itself is 404.
    let super_user = user(UserRole::SuperUser, None);
    let (state, _) = signed_in_state(&super_user);

    let response = get(state, "/dashboard/admin").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(location(&response).is_none());
}

#[tokio::test]
async fn test_unauthorized_page_is_served_to_any_role() {
    let employee = user(UserRole::Employee, None);
    let (state, _) = signed_in_state(&employee);

    let response = get(state, "/dashboard/unauthorized").await;
    assert_eq!(response.status(), StatusCode::OK);
}

// --- Exemptions & Degraded Modes ---

#[tokio::test]
async fn test_exempt_path_skips_session_refresh() {
    let session = MockSessionProvider::anonymous();
    let state = state_with(
        MockRepoControl::default(),
        MockDirectory::default(),
        Some(session.clone()),
    );

    let response = get(state, "/api/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session.refresh_calls(), 0);
}

#[tokio::test]
async fn test_guarded_path_refreshes_once() {
    let employee = user(UserRole::Employee, None);
    let (state, session) = signed_in_state(&employee);

    get(state, "/dashboard/employee").await;

    assert_eq!(session.refresh_calls(), 1);
}

#[tokio::test]
async fn test_no_session_provider_passes_through() {
    let state = state_with(MockRepoControl::default(), MockDirectory::default(), None);

    // The guard does nothing; the handler finds no user and rejects.
    let response = get(state, "/dashboard/super").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(location(&response).is_none());
}

#[tokio::test]
async fn test_session_failure_redirects_protected_paths() {
    let state = state_with(
        MockRepoControl::default(),
        MockDirectory::default(),
        Some(MockSessionProvider::new_failing()),
    );

    let response = get(state, "/dashboard/admin").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/auth/login"));
}

#[tokio::test]
async fn test_session_failure_passes_auth_pages() {
    let state = state_with(
        MockRepoControl::default(),
        MockDirectory::default(),
        Some(MockSessionProvider::new_failing()),
    );

    let response = get(state, "/auth/login").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_directory_failure_allows_employee_namespace_only() {
    let id = Uuid::new_v4();

    let employee_path = state_with(
        MockRepoControl::default(),
        MockDirectory::new_failing(),
        Some(MockSessionProvider::signed_in(id)),
    );
    let response = get(employee_path, "/dashboard/employee").await;
    // Served as an employee without an organization.
    assert!(location(&response).is_none());
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let dashboard: EmployeeDashboard = serde_json::from_slice(&body).unwrap();
    assert!(dashboard.granted_modules.is_empty());
    assert!(dashboard.organization.is_none());

    let admin_path = state_with(
        MockRepoControl::default(),
        MockDirectory::new_failing(),
        Some(MockSessionProvider::signed_in(id)),
    );
    let response = get(admin_path, "/dashboard/admin").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/auth/login"));
}

#[tokio::test]
async fn test_identity_without_users_row_is_degraded() {
    // Signed in, but the directory has no row for this id.
    let state = state_with(
        MockRepoControl::default(),
        MockDirectory::default(),
        Some(MockSessionProvider::signed_in(Uuid::new_v4())),
    );

    let response = get(state, "/").await;

    assert_eq!(location(&response), Some("/auth/login"));
}

// --- Cookie Propagation ---

#[tokio::test]
async fn test_refreshed_cookies_attached_on_continue() {
    let admin = user(UserRole::Admin, Some(Uuid::new_v4()));
    let mut session = MockSessionProvider::signed_in(admin.id);
    session.rotate_to = Some(rotated_tokens());
    let state = state_with(
        MockRepoControl::default(),
        MockDirectory::with_user(admin),
        Some(session),
    );

    let response = get(state, "/dashboard/admin").await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("sb-access-token=rotated-access")));
    assert!(cookies.iter().any(|c| c.starts_with("sb-refresh-token=rotated-refresh")));
}

#[tokio::test]
async fn test_refreshed_cookies_attached_on_redirect() {
    let admin = user(UserRole::Admin, Some(Uuid::new_v4()));
    let mut session = MockSessionProvider::signed_in(admin.id);
    session.rotate_to = Some(rotated_tokens());
    let state = state_with(
        MockRepoControl::default(),
        MockDirectory::with_user(admin),
        Some(session),
    );

    let response = get(state, "/").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("sb-access-token=rotated-access")));
    assert!(cookies.iter().any(|c| c.contains("HttpOnly")));
}

#[tokio::test]
async fn test_unchanged_session_sets_no_cookies() {
    let admin = user(UserRole::Admin, Some(Uuid::new_v4()));
    let (state, _) = signed_in_state(&admin);

    let response = get(state, "/dashboard/admin").await;
    assert!(set_cookies(&response).is_empty());
}

// --- authorize() directly ---

#[tokio::test]
async fn test_authorize_returns_resolved_user() {
    let employee = user(UserRole::Employee, Some(Uuid::new_v4()));
    let session = MockSessionProvider::signed_in(employee.id);
    let directory = MockDirectory::with_user(employee.clone());

    let outcome = authorize("/dashboard/employee", CookieJar::new(), &session, &directory).await;

    assert_eq!(outcome.decision, AccessDecision::Continue);
    assert_eq!(outcome.user, Some(employee));
}

#[tokio::test]
async fn test_authorize_session_failure_returns_fallback() {
    let session = MockSessionProvider::new_failing();
    let directory = MockDirectory::default();

    let outcome = authorize("/", CookieJar::new(), &session, &directory).await;

    assert_eq!(
        outcome.decision,
        AccessDecision::Redirect(RedirectTarget::Login)
    );
    assert!(outcome.user.is_none());
}

#[tokio::test]
async fn test_authorize_degraded_user_on_employee_namespace() {
    let id = Uuid::new_v4();
    let session = MockSessionProvider::signed_in(id);
    let directory = MockDirectory::new_failing();

    let outcome = authorize("/dashboard/employee/modules", CookieJar::new(), &session, &directory).await;

    assert_eq!(outcome.decision, AccessDecision::Continue);
    let user = outcome.user.expect("degraded employee expected");
    assert_eq!(user.id, id);
    assert_eq!(user.role, UserRole::Employee);
    assert!(user.organization_id.is_none());

    // Auth pages continue too, but without a user record.
    let outcome = authorize("/auth/login", CookieJar::new(), &session, &directory).await;
    assert_eq!(outcome.decision, AccessDecision::Continue);
    assert!(outcome.user.is_none());
}

#[tokio::test]
async fn test_degraded_employee_modules_page_is_empty() {
    let state = state_with(
        MockRepoControl::default(),
        MockDirectory::new_failing(),
        Some(MockSessionProvider::signed_in(Uuid::new_v4())),
    );

    let response = get(state, "/dashboard/employee/modules").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let modules: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert!(modules.is_empty());
}

#[tokio::test]
async fn test_guard_redirect_is_temporary() {
    let state = state_with(
        MockRepoControl::default(),
        MockDirectory::default(),
        Some(MockSessionProvider::anonymous()),
    );

    let response = create_router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/dashboard/admin/modules")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/auth/login"));
}
