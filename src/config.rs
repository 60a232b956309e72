use regex::Regex;
use std::env;
use std::sync::LazyLock;

use crate::error::PortalError;

/// Runtime override keys. A deployment that has not substituted them leaves
/// the literal `__KEY__` placeholder in place.
pub const DEPLOYMENT_URL_KEY: &str = "R2R_DEPLOYMENT_URL";
pub const DEFAULT_EMAIL_KEY: &str = "R2R_DEFAULT_EMAIL";
pub const DEFAULT_PASSWORD_KEY: &str = "R2R_DEFAULT_PASSWORD";

/// Deployment used by signup when neither the form nor the runtime config names one.
pub const LOCAL_DEPLOYMENT_URL: &str = "http://localhost:7272";

const LOCAL_JWT_SECRET: &str = "portal-local-session-secret";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^__[A-Z0-9_]+__$").expect("placeholder pattern is valid"));

/// AppConfig
///
/// Holds the portal's entire configuration. Loaded once at startup, then
/// shared immutably through the application state via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and cookie hardening.
    pub env: Env,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Origin used to build checkout return URLs when the request has no Origin header.
    pub public_origin: String,
    // HS256 secret used to sign portal session tokens.
    pub jwt_secret: String,
    // Lifetime of a portal session token, in seconds.
    pub session_ttl_secs: u64,
    // Payment provider secret. `None` disables checkout with a config error.
    pub stripe_secret_key: Option<String>,
    // Base URL of the payment provider API.
    pub stripe_api_base: String,
    // Values injected at load time for the login form.
    pub runtime: RuntimeConfig,
}

/// Env
///
/// Defines the runtime context.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// RuntimeConfig
///
/// The key/value overrides a deployment injects at load time. Each entry is
/// `None` when the key is unset, blank, or still holds its placeholder token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub deployment_url: Option<String>,
    pub default_email: Option<String>,
    pub default_password: Option<String>,
}

impl RuntimeConfig {
    /// from_source
    ///
    /// Resolves every override through `lookup`, which makes the placeholder
    /// rules testable without touching the process environment.
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolve = |key: &str| resolve_override(key, lookup(key));
        Self {
            deployment_url: resolve(DEPLOYMENT_URL_KEY),
            default_email: resolve(DEFAULT_EMAIL_KEY),
            default_password: resolve(DEFAULT_PASSWORD_KEY),
        }
    }

    pub fn from_env() -> Self {
        Self::from_source(|key| env::var(key).ok())
    }

    /// The default deployment endpoint, or `""` when none was injected.
    pub fn deployment_url_or_empty(&self) -> &str {
        self.deployment_url.as_deref().unwrap_or("")
    }
}

/// resolve_override
///
/// Treats a value as absent when it is blank, contains its own `__KEY__`
/// placeholder, or is any bare `__SOME_KEY__` token.
pub fn resolve_override(key: &str, value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.contains(&format!("__{}__", key))
        || PLACEHOLDER.is_match(trimmed)
    {
        return None;
    }
    Some(trimmed.to_string())
}

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for tests: local mode, no payment key, no
    /// runtime overrides.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:3000".to_string(),
            public_origin: "http://localhost:3000".to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            session_ttl_secs: 86_400,
            stripe_secret_key: None,
            stripe_api_base: "https://api.stripe.com".to_string(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. Production refuses
    /// to start without an explicit signing secret; local mode falls back to a
    /// fixed development secret.
    ///
    /// # Errors
    /// `PortalError::ConfigMissing` when a production-only requirement is unset,
    /// or when a numeric setting does not parse.
    pub fn load() -> Result<Self, PortalError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match (env, non_empty_var("PORTAL_JWT_SECRET")) {
            (_, Some(secret)) => secret,
            (Env::Local, None) => LOCAL_JWT_SECRET.to_string(),
            (Env::Production, None) => {
                return Err(PortalError::ConfigMissing(
                    "PORTAL_JWT_SECRET must be set in production".to_string(),
                ));
            }
        };

        let session_ttl_secs = match non_empty_var("PORTAL_SESSION_TTL_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                PortalError::ConfigMissing(format!(
                    "PORTAL_SESSION_TTL_SECS must be a number of seconds, got {raw:?}"
                ))
            })?,
            None => 86_400,
        };

        let defaults = Self::default();
        Ok(Self {
            env,
            bind_addr: non_empty_var("PORTAL_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            public_origin: non_empty_var("PORTAL_PUBLIC_ORIGIN")
                .map(|origin| origin.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_origin),
            jwt_secret,
            session_ttl_secs,
            stripe_secret_key: non_empty_var("STRIPE_SECRET_KEY"),
            stripe_api_base: non_empty_var("STRIPE_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.stripe_api_base),
            runtime: RuntimeConfig::from_env(),
        })
    }

    /// Deployment endpoint for signup: runtime default, else the local R2R port.
    pub fn signup_deployment_url(&self) -> &str {
        self.runtime
            .deployment_url
            .as_deref()
            .unwrap_or(LOCAL_DEPLOYMENT_URL)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
