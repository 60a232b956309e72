use crate::{
    error::PortalError,
    health::HealthService,
    identity::{IdentityProvider, Session},
};

pub const HEALTHY_SERVER_HINT: &str =
    "The server appears to be running correctly. Please check your credentials and try again.";

pub const UNREACHABLE_SERVER_HINT: &str =
    "Unable to communicate with the server. Please verify the server is running at the specified URL.";

pub const SIGNUP_FAILURE_MESSAGE: &str = "Registration or login failed. Ensure that your server is running at the specified URL or check your credentials and try again.";

/// Credentials
///
/// What the user typed into the login form.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// LoginFailure
///
/// A failed login attempt together with the health verdict taken right after
/// it. `server_healthy` is `None` when no health check ran (nothing to probe).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFailure {
    pub cause: PortalError,
    pub server_healthy: Option<bool>,
}

impl LoginFailure {
    /// user_message
    ///
    /// The single message shown to the user: a health-based hint followed by
    /// the raw error text.
    pub fn user_message(&self) -> String {
        let hint = match self.server_healthy {
            Some(true) => HEALTHY_SERVER_HINT,
            Some(false) => UNREACHABLE_SERVER_HINT,
            None => return format!("Login failed. {}", self.cause),
        };
        format!("Login failed. {}\n\nError: {}", hint, self.cause)
    }
}

/// login
///
/// Forwards the credentials to the auth backend at `endpoint`. On failure the
/// deployment's health is checked exactly once to explain the failure; the
/// attempt is never retried.
pub async fn login(
    identity: &dyn IdentityProvider,
    health: &dyn HealthService,
    credentials: &Credentials,
    endpoint: &str,
) -> Result<Session, LoginFailure> {
    if endpoint.is_empty() {
        return Err(LoginFailure {
            cause: missing_endpoint(),
            server_healthy: None,
        });
    }

    match identity
        .login(&credentials.email, &credentials.password, endpoint)
        .await
    {
        Ok(session) => {
            tracing::info!(account = %session.account.id, %endpoint, "login succeeded");
            Ok(session)
        }
        Err(cause) => {
            tracing::warn!(error = %cause, kind = cause.kind(), %endpoint, "login failed");
            let server_healthy = health.check_health(endpoint).await;
            Err(LoginFailure {
                cause,
                server_healthy: Some(server_healthy),
            })
        }
    }
}

/// login_with_token
///
/// OAuth hand-off: the token was issued elsewhere, the deployment only confirms it.
pub async fn login_with_token(
    identity: &dyn IdentityProvider,
    token: &str,
    endpoint: &str,
) -> Result<Session, PortalError> {
    if endpoint.is_empty() {
        return Err(missing_endpoint());
    }
    if token.trim().is_empty() {
        return Err(PortalError::InvalidInput("No access token provided".to_string()));
    }
    identity.login_with_token(token, endpoint).await
}

/// signup
///
/// Registers the account and immediately signs it in. Any failure after the
/// password check is reported with one fixed message; nothing is retried.
pub async fn signup(
    identity: &dyn IdentityProvider,
    credentials: &Credentials,
    confirm_password: &str,
    endpoint: &str,
) -> Result<Session, PortalError> {
    if credentials.password != confirm_password {
        return Err(PortalError::InvalidInput("Passwords do not match".to_string()));
    }

    let result = match identity
        .register(&credentials.email, &credentials.password, endpoint)
        .await
    {
        Ok(account) => {
            tracing::info!(account = %account.id, %endpoint, "account registered");
            identity
                .login(&credentials.email, &credentials.password, endpoint)
                .await
        }
        Err(cause) => Err(cause),
    };

    result.map_err(|cause| {
        tracing::warn!(error = %cause, %endpoint, "registration or login failed");
        match cause {
            PortalError::InvalidCredentials(_) => {
                PortalError::InvalidCredentials(SIGNUP_FAILURE_MESSAGE.to_string())
            }
            _ => PortalError::ServerUnhealthy(SIGNUP_FAILURE_MESSAGE.to_string()),
        }
    })
}

fn missing_endpoint() -> PortalError {
    PortalError::ConfigMissing("No deployment URL configured".to_string())
}
