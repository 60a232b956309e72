use axum::{
    Form, Json,
    extract::{FromRequest, Query, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    AppState,
    access::evaluate,
    auth::{Viewer, issue_session_token, session_cookie},
    checkout::{BillingPeriod, CheckoutParams, PLANS, find_plan},
    config::AppConfig,
    endpoint::sanitize,
    error::{ErrorBody, PortalError},
    identity::Session,
    login::{self, Credentials},
    models::{
        AccessResponse, CheckoutRequest, CheckoutResponse, LoginErrorResponse, LoginRequest,
        PlanResponse, RuntimeConfigResponse, SanitizeRequest, SanitizeResponse, SessionResponse,
        SignupRequest, TokenLoginRequest, ViewerProfile,
    },
};

// --- Query Structs ---

/// AccessQuery
///
/// The path the client router is about to show.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct AccessQuery {
    pub path: String,
}

/// PlansQuery
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PlansQuery {
    /// Show prices for annual billing.
    #[serde(default)]
    pub yearly: bool,
}

// --- Extractors ---

/// Submission
///
/// A body posted either by the JSON client or by a plain HTML form
/// (`application/x-www-form-urlencoded`). The variant decides how a
/// successful sign-in is answered.
#[derive(Debug)]
pub enum Submission<T> {
    Json(T),
    Form(T),
}

impl<T> Submission<T> {
    fn into_parts(self) -> (T, bool) {
        match self {
            Self::Json(payload) => (payload, false),
            Self::Form(payload) => (payload, true),
        }
    }
}

impl<S, T> FromRequest<S> for Submission<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| {
                content_type.starts_with("application/x-www-form-urlencoded")
            });

        if is_form {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(payload)| Self::Form(payload))
                .map_err(IntoResponse::into_response)
        } else {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(payload)| Self::Json(payload))
                .map_err(IntoResponse::into_response)
        }
    }
}

// --- Helpers ---

/// Signs a portal session for `session` and sets it as a cookie. JSON callers
/// get the session body; form posts are sent on to the landing page.
fn session_response(
    config: &AppConfig,
    session: Session,
    deployment_url: String,
    from_form: bool,
) -> Result<Response, PortalError> {
    let token = issue_session_token(&session.account, config)?;
    let cookie = HeaderValue::from_str(&session_cookie(&token, config))
        .map_err(|e| PortalError::ConfigMissing(format!("invalid session cookie: {e}")))?;
    if from_form {
        return Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response());
    }
    let body = SessionResponse::new(session, token, deployment_url);
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

// --- Handlers ---

/// get_runtime_config
///
/// [Public Route] The runtime overrides the login form uses to pre-fill itself.
#[utoipa::path(
    get,
    path = "/api/runtime-config",
    responses((status = 200, description = "Resolved overrides", body = RuntimeConfigResponse))
)]
pub async fn get_runtime_config(State(config): State<AppConfig>) -> Json<RuntimeConfigResponse> {
    Json(RuntimeConfigResponse::from(&config.runtime))
}

/// get_me
///
/// [Public Route] The current viewer state. Anonymous viewers get
/// `is_authenticated: false` rather than an error.
#[utoipa::path(
    get,
    path = "/api/me",
    responses((status = 200, description = "Viewer", body = ViewerProfile))
)]
pub async fn get_me(viewer: Viewer) -> Json<ViewerProfile> {
    Json(ViewerProfile::from_claims(viewer.claims.as_ref(), viewer.state))
}

/// check_access
///
/// [Public Route] Runs the access gate for the current viewer against the
/// path the client router is navigating to. The client performs the redirect.
#[utoipa::path(
    get,
    path = "/api/access",
    params(AccessQuery),
    responses((status = 200, description = "Gate decision", body = AccessResponse))
)]
pub async fn check_access(viewer: Viewer, Query(query): Query<AccessQuery>) -> Json<AccessResponse> {
    let decision = evaluate(&viewer.state, &query.path);
    Json(AccessResponse::new(query.path, decision))
}

/// sanitize_endpoint
///
/// [Public Route] Canonicalizes a deployment URL the same way the login flow
/// does, with the runtime default as fallback. Clients call it once the
/// input has settled.
#[utoipa::path(
    post,
    path = "/api/endpoint/sanitize",
    request_body = SanitizeRequest,
    responses((status = 200, description = "Sanitized endpoint", body = SanitizeResponse))
)]
pub async fn sanitize_endpoint(
    State(config): State<AppConfig>,
    Json(payload): Json<SanitizeRequest>,
) -> Json<SanitizeResponse> {
    let sanitized = sanitize(&payload.raw, config.runtime.deployment_url_or_empty());
    Json(SanitizeResponse { sanitized })
}

/// login_user
///
/// [Public Route] Signs in against the deployment named in the request.
/// Accepts JSON or a login-page form post; the latter is answered with
/// `303 See Other` to `/` once signed in.
///
/// *Failure*: the deployment's health is probed exactly once and folded into
/// the message; the attempt is not retried.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 303, description = "Signed in from the login page form"),
        (status = 401, description = "Rejected credentials", body = LoginErrorResponse),
        (status = 502, description = "Deployment unreachable", body = LoginErrorResponse)
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    submission: Submission<LoginRequest>,
) -> Response {
    let (payload, from_form) = submission.into_parts();
    let endpoint = sanitize(
        &payload.deployment_url,
        state.config.runtime.deployment_url_or_empty(),
    );
    let credentials = Credentials {
        email: payload.email,
        password: payload.password,
    };

    match login::login(
        state.identity.as_ref(),
        state.health.as_ref(),
        &credentials,
        &endpoint,
    )
    .await
    {
        Ok(session) => session_response(&state.config, session, endpoint, from_form)
            .unwrap_or_else(|e| e.into_response()),
        Err(failure) => {
            let body = LoginErrorResponse {
                error: failure.cause.kind().to_string(),
                message: failure.user_message(),
                server_healthy: failure.server_healthy,
            };
            (failure.cause.status_code(), Json(body)).into_response()
        }
    }
}

/// exchange_token
///
/// [Public Route] Exchanges an access token obtained elsewhere (OAuth) for a
/// portal session.
#[utoipa::path(
    post,
    path = "/api/auth/token",
    request_body = TokenLoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Rejected token", body = ErrorBody)
    )
)]
pub async fn exchange_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenLoginRequest>,
) -> Result<Response, PortalError> {
    let endpoint = sanitize(
        &payload.deployment_url,
        state.config.runtime.deployment_url_or_empty(),
    );
    let session =
        login::login_with_token(state.identity.as_ref(), &payload.access_token, &endpoint)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "token sign-in failed"))?;
    session_response(&state.config, session, endpoint, false)
}

/// register_user
///
/// [Public Route] Registers a new account on the deployment and signs it in.
/// Form posts from the signup page are redirected to `/` on success.
#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Registered and signed in", body = SessionResponse),
        (status = 303, description = "Registered from the signup page form"),
        (status = 400, description = "Passwords do not match", body = ErrorBody),
        (status = 401, description = "Registration rejected", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    submission: Submission<SignupRequest>,
) -> Result<Response, PortalError> {
    let (payload, from_form) = submission.into_parts();
    let endpoint = sanitize(
        payload.deployment_url.as_deref().unwrap_or(""),
        state.config.signup_deployment_url(),
    );
    let credentials = Credentials {
        email: payload.email,
        password: payload.password,
    };
    let session = login::signup(
        state.identity.as_ref(),
        &credentials,
        &payload.confirm_password,
        &endpoint,
    )
    .await?;
    session_response(&state.config, session, endpoint, from_form)
}

/// get_plans
///
/// [Public Route] The pricing catalog with prices for the requested period.
#[utoipa::path(
    get,
    path = "/api/plans",
    params(PlansQuery),
    responses((status = 200, description = "Plans", body = [PlanResponse]))
)]
pub async fn get_plans(Query(query): Query<PlansQuery>) -> Json<Vec<PlanResponse>> {
    let period = BillingPeriod::from_yearly(query.yearly);
    Json(
        PLANS
            .iter()
            .map(|plan| PlanResponse::new(plan, period))
            .collect(),
    )
}

/// create_checkout_session
///
/// [Public Route] Opens a subscription checkout with the payment provider and
/// returns the hosted page URL. Return URLs are rooted at the caller's
/// `Origin`, falling back to the configured public origin.
#[utoipa::path(
    post,
    path = "/api/checkout_sessions",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Checkout opened", body = CheckoutResponse),
        (status = 400, description = "Invalid plan selected", body = ErrorBody),
        (status = 500, description = "Payment provider not configured", body = ErrorBody)
    )
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, PortalError> {
    tracing::info!(
        plan = %payload.plan_name,
        price = ?payload.price,
        yearly = payload.is_yearly,
        "starting checkout"
    );

    let plan = find_plan(&payload.plan_name)
        .ok_or_else(|| PortalError::InvalidInput("Invalid plan selected".to_string()))?;

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .filter(|origin| !origin.is_empty())
        .unwrap_or(state.config.public_origin.as_str());

    let params = CheckoutParams::for_plan(plan, BillingPeriod::from_yearly(payload.is_yearly), origin);
    let session = state.checkout.create_session(&params).await?;

    tracing::info!(session = %session.id, plan = plan.name, "checkout session created");
    Ok(Json(CheckoutResponse { url: session.url }))
}

/// health
///
/// [Public Route] Liveness probe for the portal itself.
pub async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
