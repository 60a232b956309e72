use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public API Router
///
/// JSON endpoints open to any client, anonymous or signed in. Nothing here is
/// gated: the endpoints that depend on who is asking (`/api/me`,
/// `/api/access`) resolve the viewer themselves and answer for anonymous
/// callers too.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers. Does not touch the R2R deployment.
        .route("/health", get(handlers::health))
        // GET /api/runtime-config
        // Runtime overrides for the login form, with placeholders resolved to null.
        .route("/api/runtime-config", get(handlers::get_runtime_config))
        // GET /api/me
        // The current viewer state, derived from the portal session token.
        .route("/api/me", get(handlers::get_me))
        // GET /api/access?path=...
        // Access-gate decision for client-side navigation.
        .route("/api/access", get(handlers::check_access))
        // POST /api/endpoint/sanitize
        // Canonical form of a user-typed deployment URL.
        .route("/api/endpoint/sanitize", post(handlers::sanitize_endpoint))
        // --- Account Entry ---
        .route("/api/auth/login", post(handlers::login_user))
        .route("/api/auth/token", post(handlers::exchange_token))
        .route("/api/auth/signup", post(handlers::register_user))
        // --- Pricing & Checkout ---
        .route("/api/plans", get(handlers::get_plans))
        // POST /api/checkout_sessions
        // Opens a hosted checkout with the payment provider.
        .route(
            "/api/checkout_sessions",
            post(handlers::create_checkout_session),
        )
}
