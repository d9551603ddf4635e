//! `RunContext`: the single object threaded into the reader and executor in
//! place of the process-level singletons (request counter, global clock)
//! the design notes flag for redesign.

use crate::config::RunConfig;
use crate::ratelimit::RequestCounter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;


/// Bundles a run's configuration, its shared request counter, and its
/// cancellation token. Constructed once per run and passed by reference (or
/// cloned — every field is cheaply `Clone`) to the inventory reader and the
/// executor.
#[derive(Clone)]
pub struct RunContext {
    pub config: Arc<RunConfig>,
    pub counter: Arc<RequestCounter>,
    pub cancellation: CancellationToken,
}

impl RunContext {
    /// Builds a `RunContext` from a `RunConfig`, wiring a fresh request
    /// counter (using the config's window thresholds) and cancellation
    /// token.
    pub fn new(config: RunConfig) -> Self {
        let counter = RequestCounter::new(
            vec![
                crate::ratelimit::WindowConfig {
                    label: "10m".to_string(),
                    period: std::time::Duration::from_secs(10 * 60),
                    threshold: config.rate.short_window_threshold,
                },
                crate::ratelimit::WindowConfig {
                    label: "24h".to_string(),
                    period: std::time::Duration::from_secs(24 * 60 * 60),
                    threshold: config.rate.long_window_threshold,
                },
            ],
            std::time::Duration::from_secs(10 * 60),
            Arc::new(crate::ratelimit::SystemClock),
            Arc::new(crate::ratelimit::TracingLogSink),
        );

        Self {
            config: Arc::new(config),
            counter,
            cancellation: CancellationToken::new(),
        }
    }

    /// Spawns the request counter's background scheduler, returning its
    /// handle so the caller can abort it when the run finishes.
    pub fn spawn_rate_logger(&self) -> tokio::task::JoinHandle<()> {
        self.counter.spawn_scheduler(std::time::Duration::from_secs(30))
    }

    /// Signals every in-flight worker to abandon its current request at the
    /// next suspension point (§5 "Suspension points").
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
