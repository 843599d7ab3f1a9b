//! Prometheus Metrics Module
//!
//! Exposes fulfillment loop metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Orders**: fetched, dispatched, acknowledged
//! - **Errors**: fetch failures, malformed records, dispatch faults,
//!   acknowledgment failures
//! - **Latency**: poll cycle duration
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Calling this more than once returns the handle installed by the first
/// call.
///
/// # Errors
///
/// Returns `BuildError` if the global recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "order_fulfillment_orders_fetched_total",
        "Total pending orders returned by the store"
    );
    describe_counter!(
        "order_fulfillment_orders_dispatched_total",
        "Total orders handed to the host for execution"
    );
    describe_counter!(
        "order_fulfillment_orders_acknowledged_total",
        "Total orders marked delivered in the store"
    );

    describe_counter!(
        "order_fulfillment_fetch_failures_total",
        "Total poll cycles skipped because the store could not be read"
    );
    describe_counter!(
        "order_fulfillment_parse_errors_total",
        "Total malformed order records dropped"
    );
    describe_counter!(
        "order_fulfillment_dispatch_outcomes_total",
        "Host answers by outcome (success, failure, fault)"
    );
    describe_counter!(
        "order_fulfillment_ack_failures_total",
        "Total delivered acknowledgments the store rejected"
    );

    describe_gauge!(
        "order_fulfillment_tracked_orders",
        "Order identifiers remembered as dispatched"
    );

    describe_histogram!(
        "order_fulfillment_cycle_seconds",
        "Time to fetch and hand off one poll cycle"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Host answer for a dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Host ran the command.
    Success,
    /// Host reported the command failed.
    Failure,
    /// No host answer (executor closed or host unavailable).
    Fault,
}

impl DispatchOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Fault => "fault",
        }
    }
}

/// Record orders returned by one fetch.
pub fn record_orders_fetched(count: usize) {
    counter!("order_fulfillment_orders_fetched_total").increment(count as u64);
}

/// Record an order handed to the host.
pub fn record_order_dispatched() {
    counter!("order_fulfillment_orders_dispatched_total").increment(1);
}

/// Record an order acknowledged in the store.
pub fn record_order_acknowledged() {
    counter!("order_fulfillment_orders_acknowledged_total").increment(1);
}

/// Record a failed fetch.
pub fn record_fetch_failure(kind: &str) {
    counter!(
        "order_fulfillment_fetch_failures_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record dropped malformed records.
pub fn record_parse_errors(count: usize) {
    counter!("order_fulfillment_parse_errors_total").increment(count as u64);
}

/// Record the host's answer for a dispatch.
pub fn record_dispatch_outcome(outcome: DispatchOutcome) {
    counter!(
        "order_fulfillment_dispatch_outcomes_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a rejected acknowledgment.
pub fn record_ack_failure() {
    counter!("order_fulfillment_ack_failures_total").increment(1);
}

/// Update the number of tracked order identifiers.
#[allow(clippy::cast_precision_loss)]
pub fn set_tracked_orders(count: usize) {
    gauge!("order_fulfillment_tracked_orders").set(count as f64);
}

/// Record poll cycle duration.
pub fn record_cycle_duration(duration: Duration) {
    histogram!("order_fulfillment_cycle_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
