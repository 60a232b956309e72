use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// PortalError
///
/// The error taxonomy shared by every account-entry and checkout flow.
/// Errors coming back from the external collaborators (the R2R deployment and
/// the payment provider) are classified into these variants at the call site,
/// so handlers never see raw `reqwest` errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortalError {
    /// The auth backend answered, but rejected the credentials or token.
    #[error("{0}")]
    InvalidCredentials(String),
    /// The outbound request never produced a response (DNS, refused, timeout).
    #[error("{0}")]
    NetworkUnreachable(String),
    /// The backend responded with a server error or an unreadable body.
    #[error("{0}")]
    ServerUnhealthy(String),
    /// A required setting (deployment endpoint, signing secret, payment key) is absent.
    #[error("{0}")]
    ConfigMissing(String),
    /// The request itself was malformed (unknown plan, mismatched passwords).
    #[error("{0}")]
    InvalidInput(String),
    /// The payment provider refused the request; its status is preserved.
    #[error("{message}")]
    PaymentProvider { status: u16, message: String },
}

impl PortalError {
    /// kind
    ///
    /// Stable, machine-readable identifier used in the JSON error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidCredentials(_) => "invalid_credentials",
            Self::NetworkUnreachable(_) => "network_unreachable",
            Self::ServerUnhealthy(_) => "server_unhealthy",
            Self::ConfigMissing(_) => "config_missing",
            Self::InvalidInput(_) => "invalid_input",
            Self::PaymentProvider { .. } => "payment_provider",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            Self::NetworkUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::ServerUnhealthy(_) => StatusCode::BAD_GATEWAY,
            Self::ConfigMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::PaymentProvider { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// ErrorBody
///
/// JSON shape of every error response: `{ "error": kind, "message": text }`.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
