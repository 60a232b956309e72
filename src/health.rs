use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Upper bound for a single health probe.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

// 1. HealthService Contract
/// HealthService
///
/// Classifies an R2R deployment as healthy or not. The login flow calls this
/// exactly once after a failed attempt and never proactively, so a slow-starting
/// backend is not reported as down before the user has even tried it.
#[async_trait]
pub trait HealthService: Send + Sync {
    /// Returns `true` only when the deployment answers its health endpoint
    /// with `{ "results": { "message": "ok" } }`. Every failure is `false`.
    async fn check_health(&self, endpoint: &str) -> bool;
}

#[derive(Deserialize)]
struct HealthEnvelope {
    results: Option<HealthResults>,
}

#[derive(Deserialize)]
struct HealthResults {
    message: Option<String>,
}

/// is_healthy_body
///
/// Reads `results.message`, trims it and compares it case-insensitively to
/// `ok`. Malformed JSON, a missing field, or a non-string message all count
/// as unhealthy.
pub fn is_healthy_body(body: &str) -> bool {
    serde_json::from_str::<HealthEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.results)
        .and_then(|results| results.message)
        .is_some_and(|message| message.trim().eq_ignore_ascii_case("ok"))
}

// 2. The Real Implementation
/// HttpHealthChecker
///
/// Issues a single `GET {endpoint}/v3/health`. No retry, no backoff.
#[derive(Clone)]
pub struct HttpHealthChecker {
    client: reqwest::Client,
}

impl HttpHealthChecker {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(HEALTH_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpHealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthService for HttpHealthChecker {
    async fn check_health(&self, endpoint: &str) -> bool {
        let url = format!("{}/v3/health", endpoint);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%url, error = %e, "health check could not reach deployment");
                return false;
            }
        };

        if response.status() != StatusCode::OK {
            tracing::warn!(%url, status = %response.status(), "health check returned non-200");
            return false;
        }

        match response.text().await {
            Ok(body) => {
                let healthy = is_healthy_body(&body);
                tracing::info!(%url, healthy, "health check completed");
                healthy
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "health check body could not be read");
                false
            }
        }
    }
}

// 3. The Mock Implementation (For Unit Tests)
/// MockHealthService
///
/// Returns a fixed verdict and counts how often it was asked, so tests can
/// assert the "exactly once per failed login" rule.
#[derive(Default)]
pub struct MockHealthService {
    pub healthy: bool,
    calls: AtomicUsize,
}

impl MockHealthService {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            ..Default::default()
        }
    }

    pub fn unhealthy() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthService for MockHealthService {
    async fn check_health(&self, _endpoint: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.healthy
    }
}

/// HealthState
///
/// The shared handle to the health service stored in the application state.
pub type HealthState = Arc<dyn HealthService>;
