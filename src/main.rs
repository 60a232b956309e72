use macropilot_portal::{
    AppState, CheckoutState, HealthState, HttpHealthChecker, IdentityState, R2rIdentityClient,
    StripeCheckoutClient,
    config::{AppConfig, Env},
    create_router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, wires the external collaborators
/// into the shared state and serves the portal.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: invalid portal configuration");

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "macropilot_portal=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Portal starting in {:?} mode", config.env);
    match config.runtime.deployment_url.as_deref() {
        Some(url) => tracing::info!(deployment_url = %url, "default deployment endpoint configured"),
        None => tracing::warn!("no default deployment endpoint; users must enter one at login"),
    }
    if config.stripe_secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY is not set; checkout requests will fail");
    }

    // 4. External Collaborators
    let identity = Arc::new(R2rIdentityClient::new()) as IdentityState;
    let health = Arc::new(HttpHealthChecker::new()) as HealthState;
    let checkout = Arc::new(StripeCheckoutClient::new(
        &config.stripe_api_base,
        config.stripe_secret_key.clone(),
    )) as CheckoutState;

    // 5. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        identity,
        health,
        checkout,
        config,
    };

    // 6. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: could not bind the portal listener");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: portal server stopped unexpectedly");
}
