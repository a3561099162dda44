//! Prometheus metrics infrastructure
//!
//! Counters and histograms for the on-chain flows (settle, split, join,
//! claim). Without [`init_metrics`] no recorder is installed and every
//! update is a no-op.

use metrics::{counter, histogram, Counter, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Initialize the Prometheus metrics exporter
///
/// This starts an HTTP server on the specified port that exposes metrics
/// at the `/metrics` endpoint. It must be called from within a tokio runtime.
///
/// # Example
///
/// ```ignore
/// observability::metrics::init_metrics(9090)?;
/// // Metrics available at http://localhost:9090/metrics
/// ```
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Metrics for one kind of on-chain flow
///
/// # Metrics
///
/// * `flow_attempts_total` - Invocations, labelled by flow
/// * `flow_outcomes_total` - Completions, labelled by flow and outcome
/// * `flow_duration_seconds` - Wall time per invocation
///
/// # Example
///
/// ```ignore
/// let metrics = FlowMetrics::new("settle");
/// let mut guard = metrics.start();
/// // ... approve, wait, settleToken, wait ...
/// guard.set_outcome("ok");
/// ```
#[derive(Clone)]
pub struct FlowMetrics {
    attempts: Counter,
    duration: Histogram,
    flow: &'static str,
}

impl FlowMetrics {
    /// Create metrics for a named flow
    pub fn new(flow: &'static str) -> Self {
        Self {
            attempts: counter!("flow_attempts_total", "flow" => flow),
            duration: histogram!("flow_duration_seconds", "flow" => flow),
            flow,
        }
    }

    /// Record one finished invocation
    pub fn record(&self, duration: Duration, outcome: &'static str) {
        counter!("flow_outcomes_total", "flow" => self.flow, "outcome" => outcome).increment(1);
        self.duration.record(duration.as_secs_f64());
    }

    /// Count an attempt and return a guard that records the outcome on drop
    pub fn start(&self) -> FlowGuard<'_> {
        self.attempts.increment(1);
        FlowGuard {
            metrics: self,
            start: Instant::now(),
            outcome: "aborted",
        }
    }

    /// Flow name
    pub fn flow(&self) -> &'static str {
        self.flow
    }
}

/// Records duration and outcome of a flow when dropped
///
/// The outcome defaults to `aborted` so early returns are still counted.
pub struct FlowGuard<'a> {
    metrics: &'a FlowMetrics,
    start: Instant,
    outcome: &'static str,
}

impl FlowGuard<'_> {
    /// Set the outcome label (call before drop)
    pub fn set_outcome(&mut self, outcome: &'static str) {
        self.outcome = outcome;
    }
}

impl Drop for FlowGuard<'_> {
    fn drop(&mut self) {
        self.metrics.record(self.start.elapsed(), self.outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_metrics_without_recorder() {
        let metrics = FlowMetrics::new("settle");
        assert_eq!(metrics.flow(), "settle");
        let mut guard = metrics.start();
        guard.set_outcome("ok");
    }
}
