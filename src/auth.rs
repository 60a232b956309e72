use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::{
    access::{Role, ViewerState},
    config::{AppConfig, Env},
    error::PortalError,
    identity::Account,
};

/// Name of the cookie carrying the portal session token.
pub const SESSION_COOKIE: &str = "portal_session";

/// Claims
///
/// Payload of the portal's own session token. It captures the viewer state
/// the auth backend reported at sign-in, so page requests can be gated
/// without another round trip to the deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the account id on the R2R deployment.
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

fn now_secs() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as usize)
        .unwrap_or_default()
}

/// issue_session_token
///
/// Signs an HS256 token for `account` that expires after the configured TTL.
pub fn issue_session_token(account: &Account, config: &AppConfig) -> Result<String, PortalError> {
    let iat = now_secs();
    let claims = Claims {
        sub: account.id,
        email: account.email.clone(),
        role: account.viewer_state().role,
        iat,
        exp: iat + config.session_ttl_secs as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| PortalError::ConfigMissing(format!("could not sign session token: {e}")))
}

/// decode_session_token
///
/// Returns the claims of a valid, unexpired token signed with `secret`.
pub fn decode_session_token(token: &str, secret: &str) -> Option<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring invalid session token");
            None
        }
    }
}

/// session_cookie
///
/// `Set-Cookie` value for a freshly issued token. Production adds `Secure`.
pub fn session_cookie(token: &str, config: &AppConfig) -> String {
    let secure = if config.env == Env::Production {
        "; Secure"
    } else {
        ""
    };
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{secure}",
        config.session_ttl_secs
    )
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token)
        .filter(|token| !token.is_empty())
}

/// Viewer
///
/// The resolved viewer of a request. A bearer token takes precedence over the
/// session cookie. Missing, expired or forged tokens all resolve to the
/// anonymous viewer; this extractor never rejects, the access gate decides.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub state: ViewerState,
    pub claims: Option<Claims>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self {
            state: ViewerState::anonymous(),
            claims: None,
        }
    }

    pub fn from_claims(claims: Claims) -> Self {
        Self {
            state: ViewerState::authenticated(claims.role),
            claims: Some(claims),
        }
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let viewer = bearer_token(&parts.headers)
            .or_else(|| cookie_token(&parts.headers))
            .and_then(|token| decode_session_token(token, &config.jwt_secret))
            .map(Viewer::from_claims)
            .unwrap_or_else(Viewer::anonymous);

        Ok(viewer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn account(is_superuser: bool) -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "viewer@example.com".to_string(),
            is_superuser,
        }
    }

    #[test]
    fn issued_token_carries_the_role() {
        let config = AppConfig::default();
        let token = issue_session_token(&account(true), &config).unwrap();
        let claims = decode_session_token(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.role, Role::Elevated);
        assert_eq!(claims.email, "viewer@example.com");
    }

    #[test]
    fn token_signed_with_another_secret_is_ignored() {
        let config = AppConfig::default();
        let token = issue_session_token(&account(false), &config).unwrap();
        assert!(decode_session_token(&token, "some-other-secret").is_none());
    }

    #[test]
    fn expired_token_is_ignored() {
        let config = AppConfig::default();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "old@example.com".to_string(),
            role: Role::Standard,
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(decode_session_token(&token, &config.jwt_secret).is_none());
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; portal_session=abc.def.ghi; other=1"),
        );
        assert_eq!(cookie_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn production_cookie_is_secure() {
        let config = AppConfig {
            env: Env::Production,
            ..AppConfig::default()
        };
        assert!(session_cookie("t", &config).ends_with("; Secure"));
        assert!(!session_cookie("t", &AppConfig::default()).contains("Secure"));
    }
}
