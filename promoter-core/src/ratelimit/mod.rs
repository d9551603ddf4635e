//! Request counter / rate monitor (component F): sliding counters per
//! window, a background scheduler that logs usage and breaches, and a
//! persistent non-resetting total.
//!
//! Injection-friendly by construction — `Clock` and the log sink are both
//! swappable, the same spirit as the teacher's `CredentialStore`/`Client`
//! construction-time injection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;


/// A source of "now", abstracted so tests can control elapsed time instead
/// of sleeping real wall-clock seconds. Yields a wall-clock timestamp
/// (rather than `std::time::Instant`'s opaque monotonic tick) so the
/// scheduler can report real window boundaries in its summary log
/// (§4.F: "From `<T0>` to `<T1>` ... there have been `<N>` requests").
pub trait Clock: Send + Sync {
    fn now(&self) -> chrono::DateTime<chrono::Utc>;
}

/// The default clock, backed by `chrono::Utc::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}

/// Where the background scheduler's periodic summary lines go. The default
/// emits `tracing` events; tests substitute a `Vec`-backed sink to assert on
/// the exact lines without parsing log output.
pub trait LogSink: Send + Sync {
    fn log_summary(&self, window_label: &str, from: &str, to: &str, minutes: u64, count: u64);
    fn log_breach(&self, window_label: &str, count: u64, threshold: u64);
}

/// The default sink: structured `tracing` events at `info` (summary) and
/// `warn` (breach).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log_summary(&self, window_label: &str, from: &str, to: &str, minutes: u64, count: u64) {
        tracing::info!(
            window = window_label,
            from,
            to,
            minutes,
            count,
            "From {} to {} [{} min] there have been {} requests",
            from,
            to,
            minutes,
            count
        );
    }

    fn log_breach(&self, window_label: &str, count: u64, threshold: u64) {
        tracing::warn!(
            window = window_label,
            count,
            threshold,
            "request count {} exceeded threshold {} for window '{}'",
            count,
            threshold,
            window_label
        );
    }
}

/// One sliding, resetting window: a label, its period, its alert threshold,
/// and the live count since the last reset.
struct Window {
    label: String,
    period: Duration,
    threshold: u64,
    count: AtomicU64,
    window_start: Mutex<chrono::DateTime<chrono::Utc>>,
}

/// The set of sliding counters a run maintains: the two default
/// reset-on-log windows (10 min / 50k, 24h / 1M) plus one persistent,
/// never-reset counter for total accounting.
///
/// The persistent counter is given its own window (default 10 min, matching
/// the resetting counter's cadence for log cadence purposes) rather than
/// literally sharing the 10-minute window object — it never resets the
/// count, only restamps when it logs, which is what distinguishes it.
pub struct RequestCounter {
    windows: Vec<Window>,
    persistent_count: AtomicU64,
    persistent_window_start: Mutex<chrono::DateTime<chrono::Utc>>,
    persistent_period: Duration,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn LogSink>,
}

/// Configuration for one resetting window.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub label: String,
    pub period: Duration,
    pub threshold: u64,
}

impl RequestCounter {
    /// Builds the default counter set: a 10-minute / 50,000 window, a
    /// 24-hour / 1,000,000 window, and a persistent total with a 10-minute
    /// log cadence.
    pub fn with_defaults() -> Arc<Self> {
        Self::new(
            vec![
                WindowConfig {
                    label: "10m".to_string(),
                    period: Duration::from_secs(10 * 60),
                    threshold: 50_000,
                },
                WindowConfig {
                    label: "24h".to_string(),
                    period: Duration::from_secs(24 * 60 * 60),
                    threshold: 1_000_000,
                },
            ],
            Duration::from_secs(10 * 60),
            Arc::new(SystemClock),
            Arc::new(TracingLogSink),
        )
    }

    pub fn new(
        window_configs: Vec<WindowConfig>,
        persistent_period: Duration,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn LogSink>,
    ) -> Arc<Self> {
        let now = clock.now();
        let windows = window_configs
            .into_iter()
            .map(|c| Window {
                label: c.label,
                period: c.period,
                threshold: c.threshold,
                count: AtomicU64::new(0),
                window_start: Mutex::new(now),
            })
            .collect();

        Arc::new(Self {
            windows,
            persistent_count: AtomicU64::new(0),
            persistent_window_start: Mutex::new(now),
            persistent_period,
            clock,
            sink,
        })
    }

    /// Increments every counter atomically. Called once per outbound
    /// registry HTTP request.
    pub fn increment(&self) {
        for window in &self.windows {
            window.count.fetch_add(1, Ordering::SeqCst);
        }
        self.persistent_count.fetch_add(1, Ordering::SeqCst);
    }

    /// The current persistent total (never reset).
    pub fn total(&self) -> u64 {
        self.persistent_count.load(Ordering::SeqCst)
    }

    /// The current count of one named resetting window, for tests/introspection.
    pub fn current_count(&self, label: &str) -> Option<u64> {
        self.windows
            .iter()
            .find(|w| w.label == label)
            .map(|w| w.count.load(Ordering::SeqCst))
    }

    /// Runs one scheduler tick per window: if `period` has elapsed since the
    /// window's last reset, logs the summary (and a breach warning if over
    /// threshold), then resets the resetting windows. The persistent window
    /// logs on its own cadence but never resets its count.
    ///
    /// Intended to be driven by a loop that sleeps between calls (the
    /// background scheduler in `context::RunContext::spawn_rate_logger`);
    /// exposed standalone so tests can call it without sleeping.
    pub fn tick(&self) {
        let now = self.clock.now();
        for window in &self.windows {
            let mut start = window.window_start.lock().expect("window mutex poisoned");
            let period = chrono::Duration::from_std(window.period).expect("window period fits in chrono::Duration");
            if now.signed_duration_since(*start) >= period {
                let count = window.count.swap(0, Ordering::SeqCst);
                let minutes = window.period.as_secs() / 60;
                self.sink
                    .log_summary(&window.label, &start.to_rfc3339(), &now.to_rfc3339(), minutes, count);
                if count > window.threshold {
                    self.sink.log_breach(&window.label, count, window.threshold);
                }
                *start = now;
            }
        }

        let mut start = self
            .persistent_window_start
            .lock()
            .expect("persistent window mutex poisoned");
        let period =
            chrono::Duration::from_std(self.persistent_period).expect("persistent period fits in chrono::Duration");
        if now.signed_duration_since(*start) >= period {
            let count = self.persistent_count.load(Ordering::SeqCst);
            let minutes = self.persistent_period.as_secs() / 60;
            self.sink
                .log_summary("persistent", &start.to_rfc3339(), &now.to_rfc3339(), minutes, count);
            *start = now;
        }
    }

    /// Spawns the background scheduler task: wakes every `poll_interval` and
    /// calls `tick`. Returns the `JoinHandle` so callers can abort it on
    /// cancellation.
    pub fn spawn_scheduler(self: &Arc<Self>, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
        let counter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                interval.tick().await;
                counter.tick();
            }
        })
    }
}
