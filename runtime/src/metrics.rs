//! Prometheus metrics for observability and monitoring.
//!
//! The store records every dispatch step through [`StoreMetrics`]:
//! - Actions reduced and reducer latency
//! - Middleware effects spawned, in flight, and panicked
//! - Follow-ups re-dispatched, dropped by cancellation or by the depth limit
//! - Shutdown progress
//!
//! Nothing is exported until a recorder is installed. [`MetricsServer`]
//! installs a Prometheus recorder; without one the calls are no-ops.
//!
//! # Example
//!
//! ```rust,no_run
//! use flowstore_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics exporter.
///
/// Installs the global recorder and renders the scrape payload on demand.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address the scrape endpoint is advertised on (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the bucket configuration is rejected,
    /// or [`MetricsError::Install`] if the recorder cannot be installed for a
    /// reason other than one being installed already.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics recorder installed - scrape at http://{}/metrics",
                    self.addr
                );
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    // Several stores or tests in one process share the global recorder
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "store.actions.total",
        "Total number of actions reduced by the store"
    );
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time taken by the reducer for one action"
    );

    describe_histogram!(
        "store.middleware.effects",
        "Number of non-empty effects returned by middleware for one action"
    );
    describe_gauge!(
        "store.effects.pending",
        "Middleware effects currently in flight"
    );
    describe_counter!(
        "store.middleware.panicked",
        "Total number of middleware tasks that panicked"
    );

    describe_counter!(
        "store.follow_ups.total",
        "Total number of follow-up actions re-dispatched"
    );
    describe_counter!(
        "store.dispatch.cancelled",
        "Total number of dispatches or follow-ups dropped because their tree was cancelled"
    );
    describe_counter!(
        "store.dispatch.depth_exceeded",
        "Total number of follow-ups dropped by the dispatch depth limit"
    );

    describe_counter!(
        "store.shutdown.initiated",
        "Total number of shutdowns started"
    );
    describe_counter!(
        "store.shutdown.completed",
        "Total number of shutdowns that drained all effects"
    );
    describe_counter!(
        "store.shutdown.timeout",
        "Total number of shutdowns that timed out"
    );
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Total number of actions rejected after shutdown"
    );
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record one reduction.
    pub fn record_reduce(duration: Duration) {
        counter!("store.actions.total").increment(1);
        histogram!("store.reducer.duration_seconds").record(duration.as_secs_f64());
    }

    /// Record the effects spawned for one action.
    pub fn record_effects(count: usize) {
        // Precision loss acceptable for metrics (effect counts < 2^52)
        #[allow(clippy::cast_precision_loss)]
        histogram!("store.middleware.effects").record(count as f64);
    }

    /// Record the number of effects in flight.
    pub fn record_pending(count: usize) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("store.effects.pending").set(count as f64);
    }

    /// Record a middleware task that panicked.
    pub fn record_panic() {
        counter!("store.middleware.panicked").increment(1);
    }

    /// Record a follow-up entering dispatch.
    pub fn record_follow_up() {
        counter!("store.follow_ups.total").increment(1);
    }

    /// Record work dropped because the dispatch tree was cancelled.
    pub fn record_cancelled() {
        counter!("store.dispatch.cancelled").increment(1);
    }

    /// Record a follow-up dropped by the depth limit.
    pub fn record_depth_exceeded() {
        counter!("store.dispatch.depth_exceeded").increment(1);
    }

    /// Record the start of a shutdown.
    pub fn record_shutdown_initiated() {
        counter!("store.shutdown.initiated").increment(1);
    }

    /// Record a shutdown that drained every effect.
    pub fn record_shutdown_completed() {
        counter!("store.shutdown.completed").increment(1);
    }

    /// Record a shutdown that gave up waiting.
    pub fn record_shutdown_timeout() {
        counter!("store.shutdown.timeout").increment(1);
    }

    /// Record an action refused because the store is shut down.
    pub fn record_rejected() {
        counter!("store.shutdown.rejected_actions").increment(1);
    }
}
