use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    access::{Role, ViewerState},
    error::PortalError,
};

/// Upper bound for any single call to the auth backend.
pub const IDENTITY_TIMEOUT: Duration = Duration::from_secs(15);

/// Account
///
/// The user record as reported by the R2R deployment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub is_superuser: bool,
}

impl Account {
    /// Superusers bypass route scoping; everyone else is a standard viewer.
    pub fn viewer_state(&self) -> ViewerState {
        let role = if self.is_superuser {
            Role::Elevated
        } else {
            Role::Standard
        };
        ViewerState::authenticated(role)
    }
}

/// Session
///
/// A signed-in account together with the backend tokens that authorize
/// further calls to the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub account: Account,
}

// 1. IdentityProvider Contract
/// IdentityProvider
///
/// The external authentication collaborator. The portal never validates
/// credentials itself; it forwards them to the deployment named by `endpoint`
/// and classifies whatever comes back into a `PortalError`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn login(&self, email: &str, password: &str, endpoint: &str)
    -> Result<Session, PortalError>;

    /// Exchanges an already-issued access token (e.g. from an OAuth hand-off)
    /// for a session, after confirming the token with the deployment.
    async fn login_with_token(&self, token: &str, endpoint: &str) -> Result<Session, PortalError>;

    async fn register(&self, email: &str, password: &str, endpoint: &str)
    -> Result<Account, PortalError>;
}

#[derive(Deserialize)]
struct Envelope<T> {
    results: T,
}

#[derive(Deserialize)]
struct TokenPair {
    access_token: Token,
    refresh_token: Option<Token>,
}

#[derive(Deserialize)]
struct Token {
    token: String,
}

// 2. The Real Implementation (R2R deployment)
/// R2rIdentityClient
///
/// Talks to the `/v3/users` API of an R2R deployment.
#[derive(Clone)]
pub struct R2rIdentityClient {
    client: reqwest::Client,
}

impl R2rIdentityClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(IDENTITY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn current_account(&self, token: &str, endpoint: &str) -> Result<Account, PortalError> {
        let response = self
            .client
            .get(format!("{}/v3/users/me", endpoint))
            .bearer_auth(token)
            .send()
            .await
            .map_err(unreachable_error)?;
        decode_results(response).await
    }
}

impl Default for R2rIdentityClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for R2rIdentityClient {
    async fn login(
        &self,
        email: &str,
        password: &str,
        endpoint: &str,
    ) -> Result<Session, PortalError> {
        let response = self
            .client
            .post(format!("{}/v3/users/login", endpoint))
            .form(&[("username", email), ("password", password)])
            .send()
            .await
            .map_err(unreachable_error)?;
        let tokens: TokenPair = decode_results(response).await?;

        let account = self
            .current_account(&tokens.access_token.token, endpoint)
            .await?;

        Ok(Session {
            access_token: tokens.access_token.token,
            refresh_token: tokens.refresh_token.map(|t| t.token),
            account,
        })
    }

    async fn login_with_token(&self, token: &str, endpoint: &str) -> Result<Session, PortalError> {
        let account = self.current_account(token, endpoint).await?;
        Ok(Session {
            access_token: token.to_string(),
            refresh_token: None,
            account,
        })
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        endpoint: &str,
    ) -> Result<Account, PortalError> {
        let response = self
            .client
            .post(format!("{}/v3/users", endpoint))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(unreachable_error)?;
        decode_results(response).await
    }
}

fn unreachable_error(err: reqwest::Error) -> PortalError {
    tracing::warn!(error = %err, "auth backend unreachable");
    PortalError::NetworkUnreachable(err.to_string())
}

/// decode_results
///
/// Unwraps the `{ "results": ... }` envelope of a successful response, and
/// classifies failures: client errors are credential problems, server errors
/// and unreadable bodies mean the deployment is unhealthy.
async fn decode_results<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PortalError> {
    let status = response.status();
    let body = response.text().await.map_err(unreachable_error)?;

    if !status.is_success() {
        let message = error_message(&body).unwrap_or_else(|| status.to_string());
        return Err(classify_status(status, message));
    }

    serde_json::from_str::<Envelope<T>>(&body)
        .map(|envelope| envelope.results)
        .map_err(|e| {
            tracing::warn!(error = %e, "auth backend returned an unexpected body");
            PortalError::ServerUnhealthy(format!("unexpected response from auth backend: {e}"))
        })
}

fn classify_status(status: StatusCode, message: String) -> PortalError {
    if status.is_client_error() {
        PortalError::InvalidCredentials(message)
    } else {
        PortalError::ServerUnhealthy(message)
    }
}

/// Pulls a human-readable message out of an error body (`detail` or `message`).
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "message"]
        .iter()
        .find_map(|field| value.get(*field).and_then(|v| v.as_str()))
        .map(str::to_string)
}

// 3. The Mock Implementation (For Unit Tests)
/// MockIdentityProvider
///
/// In-memory accounts keyed by email. `failure` forces every call to fail
/// with the given error, which lets tests drive each branch of the login flow.
#[derive(Default)]
pub struct MockIdentityProvider {
    accounts: Mutex<HashMap<String, (String, Account)>>,
    pub failure: Option<PortalError>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: PortalError) -> Self {
        Self {
            failure: Some(error),
            ..Default::default()
        }
    }

    /// Adds an account that `login` will accept.
    pub fn with_account(self, email: &str, password: &str, is_superuser: bool) -> Self {
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            is_superuser,
        };
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.insert(email.to_string(), (password.to_string(), account));
        }
        self
    }

    fn fail_if_configured(&self) -> Result<(), PortalError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn poisoned() -> PortalError {
        PortalError::ServerUnhealthy("mock identity store poisoned".to_string())
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn login(
        &self,
        email: &str,
        password: &str,
        _endpoint: &str,
    ) -> Result<Session, PortalError> {
        self.fail_if_configured()?;
        let accounts = self.accounts.lock().map_err(|_| Self::poisoned())?;
        match accounts.get(email) {
            Some((stored, account)) if stored == password => Ok(Session {
                access_token: format!("mock-token-{}", account.id),
                refresh_token: None,
                account: account.clone(),
            }),
            _ => Err(PortalError::InvalidCredentials(
                "Incorrect email or password".to_string(),
            )),
        }
    }

    async fn login_with_token(&self, token: &str, _endpoint: &str) -> Result<Session, PortalError> {
        self.fail_if_configured()?;
        let accounts = self.accounts.lock().map_err(|_| Self::poisoned())?;
        accounts
            .values()
            .find(|(_, account)| token == format!("mock-token-{}", account.id))
            .map(|(_, account)| Session {
                access_token: token.to_string(),
                refresh_token: None,
                account: account.clone(),
            })
            .ok_or_else(|| PortalError::InvalidCredentials("Invalid token".to_string()))
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        _endpoint: &str,
    ) -> Result<Account, PortalError> {
        self.fail_if_configured()?;
        let mut accounts = self.accounts.lock().map_err(|_| Self::poisoned())?;
        if accounts.contains_key(email) {
            return Err(PortalError::InvalidCredentials(
                "User with this email already exists".to_string(),
            ));
        }
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            is_superuser: false,
        };
        accounts.insert(email.to_string(), (password.to_string(), account.clone()));
        Ok(account)
    }
}

/// IdentityState
///
/// The shared handle to the auth collaborator stored in the application state.
pub type IdentityState = Arc<dyn IdentityProvider>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superuser_maps_to_elevated() {
        let account = Account {
            id: Uuid::new_v4(),
            email: "root@example.com".to_string(),
            is_superuser: true,
        };
        assert_eq!(account.viewer_state(), ViewerState::authenticated(Role::Elevated));
    }

    #[test]
    fn error_message_prefers_detail() {
        assert_eq!(
            error_message(r#"{"detail":"Incorrect email or password"}"#).as_deref(),
            Some("Incorrect email or password")
        );
        assert_eq!(error_message(r#"{"message":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(error_message("<html>"), None);
    }

    #[test]
    fn client_errors_are_credential_problems() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "x".into()),
            PortalError::InvalidCredentials(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "x".into()),
            PortalError::ServerUnhealthy(_)
        ));
    }

    #[tokio::test]
    async fn mock_rejects_wrong_password() {
        let mock = MockIdentityProvider::new().with_account("a@b.c", "pw", false);
        assert!(mock.login("a@b.c", "pw", "").await.is_ok());
        assert!(matches!(
            mock.login("a@b.c", "nope", "").await,
            Err(PortalError::InvalidCredentials(_))
        ));
    }
}
