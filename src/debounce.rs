use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};

use crate::endpoint::sanitize;

/// How long the raw endpoint input must stay unchanged before it is sanitized.
pub const SETTLE_WINDOW: Duration = Duration::from_millis(500);

/// Debouncer
///
/// A cancellable scheduled task. Each call to `schedule` aborts whatever is
/// still pending and arms a fresh timer, so only a task that survives the
/// whole delay uncancelled ever runs. Dropping the debouncer cancels the
/// pending task, which keeps a stale timer from firing after its owner is gone.
///
/// Must be used from inside a Tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// schedule
    ///
    /// Runs `task` once `delay` has elapsed with no further `schedule` or
    /// `cancel` call in between.
    pub fn schedule<F>(&mut self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// EndpointField
///
/// Holds the deployment-endpoint input of the login form. The raw value tracks
/// every keystroke; the sanitized value (the base URL for outbound calls) only
/// moves once the raw value has settled for `SETTLE_WINDOW`.
///
/// Subscribers get the sanitized value through a `watch` channel, so a burst
/// of keystrokes produces exactly one update.
///
/// The server never holds one: it sanitizes each submitted form value once.
/// This type is the library entry point for interactive callers (a UI or
/// TUI login form) that own the field and call `set_raw` per keystroke.
#[derive(Debug)]
pub struct EndpointField {
    raw: String,
    fallback: String,
    sanitized: Arc<watch::Sender<String>>,
    debouncer: Debouncer,
}

impl EndpointField {
    /// new
    ///
    /// `default_endpoint` is the runtime-injected deployment URL (empty when
    /// absent). It seeds both values and is the fallback for blank input.
    pub fn new(default_endpoint: &str) -> Self {
        Self::with_settle_window(default_endpoint, SETTLE_WINDOW)
    }

    pub fn with_settle_window(default_endpoint: &str, window: Duration) -> Self {
        let initial = sanitize(default_endpoint, "");
        let (sender, _) = watch::channel(initial);
        Self {
            raw: default_endpoint.to_string(),
            fallback: default_endpoint.to_string(),
            sanitized: Arc::new(sender),
            debouncer: Debouncer::new(window),
        }
    }

    /// set_raw
    ///
    /// Records a keystroke and (re)arms the settle timer.
    pub fn set_raw(&mut self, raw: impl Into<String>) {
        self.raw = raw.into();
        let raw = self.raw.clone();
        let fallback = self.fallback.clone();
        let sanitized = Arc::clone(&self.sanitized);
        self.debouncer.schedule(move || {
            let next = sanitize(&raw, &fallback);
            tracing::debug!(endpoint = %next, "deployment endpoint settled");
            sanitized.send_replace(next);
        });
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn sanitized(&self) -> String {
        self.sanitized.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.sanitized.subscribe()
    }

    /// Whether a keystroke is still waiting out the settle window.
    pub fn is_settling(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// close
    ///
    /// Drops any pending sanitization; called when the form goes away.
    pub fn close(&mut self) {
        self.debouncer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn only_the_last_of_a_burst_runs() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut debouncer = Debouncer::new(SETTLE_WINDOW);

        for value in ["h", "ht", "htt", "http"] {
            let seen = Arc::clone(&seen);
            debouncer.schedule(move || seen.lock().unwrap().push(value));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(SETTLE_WINDOW).await;

        assert_eq!(*seen.lock().unwrap(), vec!["http"]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_the_pending_task() {
        let seen = Arc::new(Mutex::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(50));
        let counter = Arc::clone(&seen);
        debouncer.schedule(move || *counter.lock().unwrap() += 1);
        assert!(debouncer.is_pending());

        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_field_cancels_pending_sanitization() {
        let mut field = EndpointField::new("");
        let updates = field.subscribe();
        field.set_raw("example.com");
        drop(field);

        tokio::time::sleep(SETTLE_WINDOW * 2).await;
        assert_eq!(*updates.borrow(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn sanitized_value_moves_only_after_settling() {
        let mut field = EndpointField::new("http://default:7272/");
        assert_eq!(field.sanitized(), "http://default:7272");

        field.set_raw("api.example.com/");
        assert_eq!(field.raw(), "api.example.com/");
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(field.sanitized(), "http://default:7272");
        assert!(field.is_settling());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(field.sanitized(), "http://api.example.com");
        assert!(!field.is_settling());
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_the_field_falls_back_to_the_default() {
        let mut field = EndpointField::new("https://r2r.internal");
        field.set_raw("https://");
        tokio::time::sleep(SETTLE_WINDOW + Duration::from_millis(1)).await;
        assert_eq!(field.sanitized(), "https://r2r.internal");
    }
}
