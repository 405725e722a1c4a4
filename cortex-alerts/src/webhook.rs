//! Webhook delivery: a single pending-alert queue behind a mutex, a
//! debounced batch timer, and at-most-one retry on 5xx.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{json, Value};

use cortex_core::config::defaults::CORTEX_VERSION;
use cortex_core::config::WebhookConfig;
use cortex_core::model::Alert;

/// Outcome of a single HTTP attempt, coarse enough for the retry-once rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Success,
    RetryableError,
    Dropped,
}

/// Abstracts the actual HTTP call so the batching/retry logic can be tested
/// without a network.
pub trait WebhookTransport: Send + Sync + 'static {
    fn post(&self, url: &str, headers: &[(String, String)], body: &str) -> WebhookOutcome;
}

/// `reqwest::blocking`-backed transport used outside tests.
pub struct ReqwestWebhookTransport {
    client: reqwest::blocking::Client,
}

impl Default for ReqwestWebhookTransport {
    fn default() -> Self {
        Self {
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::blocking::Client::new()),
        }
    }
}

impl WebhookTransport for ReqwestWebhookTransport {
    fn post(&self, url: &str, headers: &[(String, String)], body: &str) -> WebhookOutcome {
        let mut req = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("Cortex/{CORTEX_VERSION}"))
            .body(body.to_string());
        for (k, v) in headers {
            req = req.header(k.as_str(), v.as_str());
        }

        match req.send() {
            Ok(resp) if resp.status().is_success() => WebhookOutcome::Success,
            Ok(resp) if resp.status().is_server_error() => {
                tracing::warn!(status = %resp.status(), "webhook delivery failed, will retry once");
                WebhookOutcome::RetryableError
            }
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "webhook delivery rejected, dropping");
                WebhookOutcome::Dropped
            }
            Err(e) => {
                tracing::warn!(error = %e, "webhook delivery error, will retry once");
                WebhookOutcome::RetryableError
            }
        }
    }
}

/// Builds the single-alert JSON payload described by the wire contract.
pub fn alert_payload(alert: &Alert) -> Value {
    let mut payload = json!({
        "type": alert.alert_type.as_str(),
        "severity": alert.severity.as_str(),
        "message": alert.message,
        "created_at": alert.created_at.to_rfc3339(),
        "cortex_version": CORTEX_VERSION,
    });
    let obj = payload.as_object_mut().expect("payload is always an object");
    if let Some(fact_id) = alert.fact_id {
        obj.insert("fact_id".to_string(), json!(fact_id));
    }
    if let Some(related) = alert.related_fact_id {
        obj.insert("related_fact_id".to_string(), json!(related));
    }
    if let Some(agent_id) = &alert.agent_id {
        obj.insert("agent_id".to_string(), json!(agent_id));
    }
    if let Some(details) = detail_value(&alert.detail) {
        obj.insert("details".to_string(), details);
    }
    payload
}

fn detail_value(detail: &str) -> Option<Value> {
    if detail.trim().is_empty() || detail == "{}" {
        return None;
    }
    serde_json::from_str(detail).ok()
}

/// Wraps single payloads when batched; an unbatched (size-1) delivery sends
/// the bare alert payload.
pub fn batch_payload(payloads: &[Value]) -> Value {
    match payloads {
        [single] => single.clone(),
        many => json!({ "alerts": many, "count": many.len() }),
    }
}

struct NotifierState {
    pending: VecDeque<Value>,
    deadline: Instant,
    shutdown: bool,
}

/// Non-blocking batching notifier: `notify` enqueues and (re)starts the
/// batch timer; a background thread flushes once the timer settles.
pub struct WebhookNotifier<T: WebhookTransport = ReqwestWebhookTransport> {
    config: WebhookConfig,
    transport: Arc<T>,
    state: Arc<Mutex<NotifierState>>,
    cond: Arc<Condvar>,
    started: AtomicBool,
}

impl<T: WebhookTransport> WebhookNotifier<T> {
    pub fn new(config: WebhookConfig, transport: T) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            state: Arc::new(Mutex::new(NotifierState {
                pending: VecDeque::new(),
                deadline: Instant::now(),
                shutdown: false,
            })),
            cond: Arc::new(Condvar::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    /// Enqueues `alert` for delivery. No-op when the notifier has no
    /// configured URL. Spawns the background flush thread lazily on first
    /// use.
    pub fn notify(&self, alert: &Alert) {
        if !self.is_enabled() {
            return;
        }
        self.ensure_started();

        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        guard.pending.push_back(alert_payload(alert));
        guard.deadline = Instant::now() + self.config.batch_window();
        self.cond.notify_one();
    }

    fn ensure_started(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let state = Arc::clone(&self.state);
        let cond = Arc::clone(&self.cond);
        let transport = Arc::clone(&self.transport);
        let config = self.config.clone();
        std::thread::spawn(move || run_flush_loop(state, cond, transport, config));
    }

    /// Stops the background thread after its next wake; any already-pending
    /// batch is flushed first.
    pub fn shutdown(&self) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        guard.shutdown = true;
        self.cond.notify_all();
    }
}

impl<T: WebhookTransport> Drop for WebhookNotifier<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_flush_loop<T: WebhookTransport>(state: Arc<Mutex<NotifierState>>, cond: Arc<Condvar>, transport: Arc<T>, config: WebhookConfig) {
    loop {
        let guard = state.lock().unwrap_or_else(|e| e.into_inner());
        let (mut guard, _timeout) = cond
            .wait_timeout_while(guard, Duration::from_secs(60), |s| s.pending.is_empty() && !s.shutdown)
            .unwrap_or_else(|e| e.into_inner());

        if guard.shutdown && guard.pending.is_empty() {
            return;
        }
        if guard.pending.is_empty() {
            continue;
        }

        let deadline = guard.deadline;
        drop(guard);

        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }

        let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
        if Instant::now() < guard.deadline {
            // A newer alert pushed the deadline out while we slept; wait again.
            continue;
        }
        let batch: Vec<Value> = guard.pending.drain(..).collect();
        let shutdown = guard.shutdown;
        drop(guard);

        if !batch.is_empty() {
            deliver(&transport, &config, &batch);
        }
        if shutdown {
            return;
        }
    }
}

fn deliver<T: WebhookTransport>(transport: &T, config: &WebhookConfig, batch: &[Value]) {
    let body = batch_payload(batch).to_string();
    let headers: Vec<(String, String)> = config.extra_headers.clone();

    match transport.post(&config.url, &headers, &body) {
        WebhookOutcome::Success => {
            tracing::debug!(count = batch.len(), "webhook batch delivered");
        }
        WebhookOutcome::RetryableError => {
            std::thread::sleep(config.retry_delay());
            match transport.post(&config.url, &headers, &body) {
                WebhookOutcome::Success => tracing::debug!(count = batch.len(), "webhook batch delivered on retry"),
                other => tracing::warn!(?other, count = batch.len(), "webhook batch dropped after retry"),
            }
        }
        WebhookOutcome::Dropped => {
            tracing::warn!(count = batch.len(), "webhook batch dropped");
        }
    }
}

/// Resolves the effective webhook URL: the configured value, falling back
/// to `CORTEX_ALERT_WEBHOOK_URL` when unset.
pub fn resolve_url(config: &WebhookConfig) -> String {
    if !config.url.is_empty() {
        return config.url.clone();
    }
    std::env::var("CORTEX_ALERT_WEBHOOK_URL").unwrap_or_default()
}
