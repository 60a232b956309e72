use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Decision logic.
pub mod access;
pub mod debounce;
pub mod endpoint;

// External collaborators and the flows built on them.
pub mod checkout;
pub mod health;
pub mod identity;
pub mod login;

// HTTP surface.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pages;
pub mod routes;

use access::{AccessDecision, evaluate};
use auth::Viewer;
use routes::{pages as page_router, public};

// --- Public Re-exports ---

pub use checkout::{CheckoutState, MockCheckoutService, StripeCheckoutClient};
pub use config::AppConfig;
pub use error::PortalError;
pub use health::{HealthState, HttpHealthChecker, MockHealthService};
pub use identity::{IdentityState, MockIdentityProvider, R2rIdentityClient};

/// ApiDoc
///
/// OpenAPI document for the JSON API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_runtime_config, handlers::get_me, handlers::check_access,
        handlers::sanitize_endpoint, handlers::login_user, handlers::exchange_token,
        handlers::register_user, handlers::get_plans, handlers::create_checkout_session
    ),
    components(
        schemas(
            models::LoginRequest, models::TokenLoginRequest, models::SignupRequest,
            models::SanitizeRequest, models::CheckoutRequest, models::ViewerProfile,
            models::SessionResponse, models::LoginErrorResponse, models::AccessResponse,
            models::SanitizeResponse, models::RuntimeConfigResponse, models::PlanResponse,
            models::CheckoutResponse, error::ErrorBody, access::Role,
        )
    ),
    tags(
        (name = "macropilot-portal", description = "MacroPilot portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, immutable container shared by every request: the external
/// collaborators behind trait objects, plus the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    /// Auth collaborator (the R2R deployment's user API).
    pub identity: IdentityState,
    /// Health probe used after failed logins.
    pub health: HealthState,
    /// Payment collaborator used by the pricing page.
    pub checkout: CheckoutState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for HealthState {
    fn from_ref(app_state: &AppState) -> HealthState {
        app_state.health.clone()
    }
}

impl FromRef<AppState> for CheckoutState {
    fn from_ref(app_state: &AppState) -> CheckoutState {
        app_state.checkout.clone()
    }
}

/// access_gate
///
/// Middleware in front of every page. Resolves the viewer, evaluates the
/// requested path, and either lets the request through or answers with a
/// `303 See Other` to the path the gate chose.
async fn access_gate(viewer: Viewer, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    match evaluate(&viewer.state, &path) {
        AccessDecision::Allow => next.run(request).await,
        AccessDecision::RedirectTo(target) => {
            tracing::debug!(%path, %target, authenticated = viewer.state.is_authenticated, "page access redirected");
            Redirect::to(&target).into_response()
        }
    }
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // JSON API: no gate.
        .merge(public::public_routes())
        // Pages: every route and the fallback run through the access gate.
        .merge(
            page_router::page_routes().layer(middleware::from_fn_with_state(
                state.clone(),
                access_gate,
            )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span with method, uri and the `x-request-id` set
/// by `SetRequestIdLayer`, so every log line of a request is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
