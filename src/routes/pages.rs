use crate::{AppState, pages};
use axum::{Router, routing::get};

/// Page Router
///
/// The HTML pages of the portal. The whole router, fallback included, sits
/// behind the access-gate middleware installed in `create_router`, so every
/// page request is evaluated against the viewer before it reaches a handler.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::landing))
        .route("/landing", get(pages::landing))
        .route("/pricing", get(pages::pricing))
        .route("/auth/login", get(pages::login))
        .route("/auth/signup", get(pages::signup))
        // GET /success?session_id=...
        // Post-payment confirmation. Not a public path, so the gate applies.
        .route("/success", get(pages::success))
        // Anything else is gated first, then answered with a 404 page.
        .fallback(pages::not_found)
}
