//! Remote call and mutation metrics.
//!
//! Provides standardized metrics for monitoring store operations:
//! - Remote call counters by operation and outcome
//! - Remote call latency histograms
//! - Mutation counters by kind and outcome

use std::future::Future;
use std::time::Instant;

use metrics::{counter, histogram};

use crate::remote::RemoteResult;

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Total remote store calls by operation and outcome.
    pub const REMOTE_CALLS_TOTAL: &str = "assetkey_remote_calls_total";

    /// Remote call latency in seconds by operation.
    pub const REMOTE_LATENCY_SECONDS: &str = "assetkey_remote_latency_seconds";

    /// Total identity mutations by kind and outcome.
    pub const MUTATIONS_TOTAL: &str = "assetkey_mutations_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record metrics for a completed remote call.
pub fn record_remote_call(operation: &'static str, outcome: &'static str, latency_ms: f64) {
    counter!(
        names::REMOTE_CALLS_TOTAL,
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        names::REMOTE_LATENCY_SECONDS,
        "operation" => operation
    )
    .record(latency_ms / 1000.0);
}

/// Record the outcome of a rename, relocate or prefix change.
pub fn record_mutation(kind: &'static str, outcome: &'static str) {
    counter!(
        names::MUTATIONS_TOTAL,
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);
}

/// Await a remote call and record its outcome and latency.
pub async fn observe_call<T, Fut>(operation: &'static str, call: Fut) -> RemoteResult<T>
where
    Fut: Future<Output = RemoteResult<T>>,
{
    let start = Instant::now();
    let result = call.await;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    record_remote_call(operation, outcome, latency_ms);
    result
}

// =============================================================================
// Tests
// =============================================================================
