use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    access::{AccessDecision, Role, ViewerState},
    auth::Claims,
    checkout::{BillingPeriod, PRICE_PERIOD_LABEL, Plan},
    config::RuntimeConfig,
    identity::Session,
};

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Input payload for `POST /api/auth/login`. `deployment_url` is the raw text
/// of the endpoint field; it is sanitized server-side before use.
/// The password is only passed through to the auth backend and never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub deployment_url: String,
}

/// TokenLoginRequest
///
/// Input payload for `POST /api/auth/token` (OAuth hand-off).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenLoginRequest {
    pub access_token: String,
    #[serde(default)]
    pub deployment_url: String,
}

/// SignupRequest
///
/// Input payload for `POST /api/auth/signup`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
}

/// SanitizeRequest
///
/// Input payload for `POST /api/endpoint/sanitize`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SanitizeRequest {
    pub raw: String,
}

/// CheckoutRequest
///
/// Input payload for `POST /api/checkout_sessions`. `price` is the display
/// price the page showed; it is logged but the billed price always comes
/// from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CheckoutRequest {
    pub plan_name: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub is_yearly: bool,
}

// --- Output Schemas ---

/// ViewerProfile
///
/// The signed-in viewer as the front-end sees it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct ViewerProfile {
    pub id: Option<Uuid>,
    pub email: Option<String>,
    pub is_authenticated: bool,
    pub role: Role,
}

impl ViewerProfile {
    pub fn from_claims(claims: Option<&Claims>, state: ViewerState) -> Self {
        Self {
            id: claims.map(|c| c.sub),
            email: claims.map(|c| c.email.clone()),
            is_authenticated: state.is_authenticated,
            role: state.role,
        }
    }
}

/// SessionResponse
///
/// Output of a successful login or signup. `session_token` is the portal's
/// own token (also set as a cookie); `access_token` authorizes direct calls
/// to the deployment at `deployment_url`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionResponse {
    pub session_token: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub deployment_url: String,
    pub viewer: ViewerProfile,
}

impl SessionResponse {
    pub fn new(session: Session, session_token: String, deployment_url: String) -> Self {
        let state = session.account.viewer_state();
        Self {
            session_token,
            viewer: ViewerProfile {
                id: Some(session.account.id),
                email: Some(session.account.email),
                is_authenticated: state.is_authenticated,
                role: state.role,
            },
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            deployment_url,
        }
    }
}

/// LoginErrorResponse
///
/// Output of a failed login: the combined user-visible message plus the
/// health verdict taken after the failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginErrorResponse {
    pub error: String,
    pub message: String,
    pub server_healthy: Option<bool>,
}

/// AccessResponse
///
/// Gate decision for `GET /api/access`. `redirect_to` is set iff `allowed` is false.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct AccessResponse {
    pub path: String,
    pub allowed: bool,
    pub redirect_to: Option<String>,
}

impl AccessResponse {
    pub fn new(path: String, decision: AccessDecision) -> Self {
        match decision {
            AccessDecision::Allow => Self {
                path,
                allowed: true,
                redirect_to: None,
            },
            AccessDecision::RedirectTo(target) => Self {
                path,
                allowed: false,
                redirect_to: Some(target),
            },
        }
    }
}

/// SanitizeResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SanitizeResponse {
    pub sanitized: String,
}

/// RuntimeConfigResponse
///
/// The resolved runtime overrides; placeholder entries come back as `null`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct RuntimeConfigResponse {
    pub deployment_url: Option<String>,
    pub default_email: Option<String>,
    pub default_password: Option<String>,
}

impl From<&RuntimeConfig> for RuntimeConfigResponse {
    fn from(runtime: &RuntimeConfig) -> Self {
        Self {
            deployment_url: runtime.deployment_url.clone(),
            default_email: runtime.default_email.clone(),
            default_password: runtime.default_password.clone(),
        }
    }
}

/// PlanResponse
///
/// One pricing tier with the price for the requested billing period.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PlanResponse {
    pub name: String,
    pub price: String,
    pub period: String,
    pub description: String,
    pub features: Vec<String>,
    pub popular: bool,
}

impl PlanResponse {
    pub fn new(plan: &Plan, period: BillingPeriod) -> Self {
        Self {
            name: plan.name.to_string(),
            price: plan.display_price(period).to_string(),
            period: PRICE_PERIOD_LABEL.to_string(),
            description: plan.description.to_string(),
            features: plan.features.iter().map(|f| f.to_string()).collect(),
            popular: plan.popular,
        }
    }
}

/// CheckoutResponse
///
/// The hosted checkout URL the browser should navigate to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CheckoutResponse {
    pub url: String,
}
