use axum::{
    body::{Body, to_bytes},
    extract::FromRequestParts,
    http::{HeaderValue, Method, Request, StatusCode, Uri, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use macropilot_portal::{
    AppState, CheckoutState, HealthState, IdentityState, MockCheckoutService, MockHealthService,
    MockIdentityProvider,
    access::Role,
    auth::{Claims, SESSION_COOKIE, Viewer, issue_session_token},
    config::AppConfig,
    create_router,
    identity::Account,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;
use uuid::Uuid;

// --- Test Constants and Helpers ---

const TEST_JWT_SECRET: &str = "test-session-secret-for-integration";

fn create_app_state() -> AppState {
    let config = AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };

    AppState {
        identity: Arc::new(MockIdentityProvider::new()) as IdentityState,
        health: Arc::new(MockHealthService::healthy()) as HealthState,
        checkout: Arc::new(MockCheckoutService::new()) as CheckoutState,
        config,
    }
}

fn create_token(role: Role, expires_in: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let claims = Claims {
        sub: Uuid::new_v4(),
        email: "viewer@example.com".to_string(),
        role,
        iat: now as usize,
        exp: (now + expires_in) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

async fn extract_viewer(parts: &mut Parts, state: &AppState) -> Viewer {
    match Viewer::from_request_parts(parts, state).await {
        Ok(viewer) => viewer,
        Err(never) => match never {},
    }
}

// --- Viewer Extractor ---

#[tokio::test]
async fn test_viewer_from_bearer_token() {
    let app_state = create_app_state();
    let token = create_token(Role::Elevated, 3600);

    let mut parts = get_request_parts(Method::GET, Uri::from_static("/api/me"));
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let viewer = extract_viewer(&mut parts, &app_state).await;
    assert!(viewer.state.is_authenticated);
    assert_eq!(viewer.state.role, Role::Elevated);
    assert_eq!(viewer.claims.unwrap().email, "viewer@example.com");
}

#[tokio::test]
async fn test_viewer_from_session_cookie() {
    let app_state = create_app_state();
    let account = Account {
        id: Uuid::new_v4(),
        email: "member@example.com".to_string(),
        is_superuser: false,
    };
    let token = issue_session_token(&account, &app_state.config).unwrap();

    let mut parts = get_request_parts(Method::GET, Uri::from_static("/documents"));
    parts.headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("lang=en; {}={}", SESSION_COOKIE, token)).unwrap(),
    );

    let viewer = extract_viewer(&mut parts, &app_state).await;
    assert!(viewer.state.is_authenticated);
    assert_eq!(viewer.state.role, Role::Standard);
    assert_eq!(viewer.claims.map(|c| c.sub), Some(account.id));
}

#[tokio::test]
async fn test_bearer_token_takes_precedence_over_cookie() {
    let app_state = create_app_state();
    let bearer = create_token(Role::Elevated, 3600);
    let cookie = create_token(Role::Standard, 3600);

    let mut parts = get_request_parts(Method::GET, Uri::from_static("/"));
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", bearer)).unwrap(),
    );
    parts.headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, cookie)).unwrap(),
    );

    let viewer = extract_viewer(&mut parts, &app_state).await;
    assert_eq!(viewer.state.role, Role::Elevated);
}

#[tokio::test]
async fn test_missing_header_is_anonymous() {
    let app_state = create_app_state();
    let mut parts = get_request_parts(Method::GET, Uri::from_static("/"));

    let viewer = extract_viewer(&mut parts, &app_state).await;
    assert!(!viewer.state.is_authenticated);
    assert!(viewer.claims.is_none());
}

#[tokio::test]
async fn test_expired_or_forged_token_is_anonymous() {
    let app_state = create_app_state();

    let mut expired = get_request_parts(Method::GET, Uri::from_static("/"));
    expired.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", create_token(Role::Elevated, -3600))).unwrap(),
    );
    assert!(!extract_viewer(&mut expired, &app_state).await.state.is_authenticated);

    let mut forged = get_request_parts(Method::GET, Uri::from_static("/"));
    forged.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Bearer not.a.token"),
    );
    assert!(!extract_viewer(&mut forged, &app_state).await.state.is_authenticated);
}

// --- Access Gate Middleware ---

async fn get_page(path: &str, token: Option<String>) -> (StatusCode, Option<String>, String) {
    let router = create_router(create_app_state());

    let mut builder = Request::builder().method(Method::GET).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let response = router
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|value| value.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, location, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_gate_lets_anonymous_viewers_see_public_pages() {
    let (status, location, body) = get_page("/auth/signup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(location, None);
    assert!(body.contains("signup-form"));
}

#[tokio::test]
async fn test_gate_sends_anonymous_viewers_to_login() {
    let (status, location, _) = get_page("/success?session_id=cs_test_1", None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/auth/login"));
}

#[tokio::test]
async fn test_gate_keeps_standard_viewers_in_scope() {
    let token = create_token(Role::Standard, 3600);
    let (status, location, _) = get_page("/success", Some(token)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/documents"));
}

#[tokio::test]
async fn test_gate_lets_elevated_viewers_anywhere() {
    let token = create_token(Role::Elevated, 3600);
    let (status, location, body) = get_page("/success?session_id=cs_test_1", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(location, None);
    assert!(body.contains("Session ID: cs_test_1"));
}

#[tokio::test]
async fn test_gate_does_not_touch_the_json_api() {
    let (status, location, body) = get_page("/api/me", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(location, None);
    assert!(body.contains("\"is_authenticated\":false"));
}
