use macropilot_portal::{AppConfig, PortalError, config::Env};
use serial_test::serial;
use std::{env, panic};

// --- Setup/Teardown Utilities ---

const PORTAL_VARS: [&str; 10] = [
    "APP_ENV",
    "PORTAL_BIND_ADDR",
    "PORTAL_JWT_SECRET",
    "PORTAL_SESSION_TTL_SECS",
    "PORTAL_PUBLIC_ORIGIN",
    "STRIPE_SECRET_KEY",
    "STRIPE_API_BASE",
    "R2R_DEPLOYMENT_URL",
    "R2R_DEFAULT_EMAIL",
    "R2R_DEFAULT_PASSWORD",
];

/// Runs `test` with only `vars` set among the portal variables, then restores
/// the original environment even if the test panics.
fn run_with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = PORTAL_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in PORTAL_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_production_requires_jwt_secret() {
    let result = run_with_env(&[("APP_ENV", "production")], AppConfig::load);

    assert!(matches!(result, Err(PortalError::ConfigMissing(_))));
}

#[test]
#[serial]
fn test_local_env_defaults() {
    let config = run_with_env(&[("APP_ENV", "local")], AppConfig::load).unwrap();

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert_eq!(config.public_origin, "http://localhost:3000");
    assert_eq!(config.session_ttl_secs, 86_400);
    assert_eq!(config.stripe_secret_key, None);
    assert_eq!(config.stripe_api_base, "https://api.stripe.com");
    assert!(!config.jwt_secret.is_empty());
}

#[test]
#[serial]
fn test_production_with_secret_and_overrides() {
    let config = run_with_env(
        &[
            ("APP_ENV", "production"),
            ("PORTAL_JWT_SECRET", "prod-secret"),
            ("PORTAL_PUBLIC_ORIGIN", "https://macropilot.example/"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("R2R_DEPLOYMENT_URL", "https://r2r.example"),
            ("R2R_DEFAULT_EMAIL", "__R2R_DEFAULT_EMAIL__"),
        ],
        AppConfig::load,
    )
    .unwrap();

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "prod-secret");
    assert_eq!(config.public_origin, "https://macropilot.example");
    assert_eq!(config.stripe_secret_key.as_deref(), Some("sk_test_123"));
    assert_eq!(config.runtime.deployment_url.as_deref(), Some("https://r2r.example"));
    assert_eq!(config.runtime.default_email, None);
    assert_eq!(config.signup_deployment_url(), "https://r2r.example");
}

#[test]
#[serial]
fn test_bad_session_ttl_is_rejected() {
    let result = run_with_env(&[("PORTAL_SESSION_TTL_SECS", "one day")], AppConfig::load);

    assert!(matches!(result, Err(PortalError::ConfigMissing(_))));
}
