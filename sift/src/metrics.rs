//! Dispatch-layer metrics
//!
//! Exposed in Prometheus format at `GET /metrics` when enabled.

use std::time::Duration;

/// Record a request that reached its handler
pub fn record_dispatch(action: &str, dialect: &str, status: u16, duration: Duration) {
    metrics::counter!(
        "sift_dispatch_total",
        "action" => action.to_string(),
        "dialect" => dialect.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);

    metrics::histogram!(
        "sift_dispatch_duration_seconds",
        "action" => action.to_string(),
        "dialect" => dialect.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a request stopped by authorization
pub fn record_auth_denied(operation: &str, reason: &str) {
    metrics::counter!(
        "sift_auth_denied_total",
        "operation" => operation.to_string(),
        "reason" => reason.to_string(),
    )
    .increment(1);
}

/// Record the outcome of alias resolution ("resolved", "empty", "rejected")
pub fn record_alias_resolution(policy: &str, outcome: &str) {
    metrics::counter!(
        "sift_alias_resolution_total",
        "policy" => policy.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
}

/// Record a compatibility request rejected before dispatch
pub fn record_compat_rejected(error_type: &str) {
    metrics::counter!(
        "sift_compat_rejected_total",
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Register metric descriptions; call once after installing the recorder
pub fn describe() {
    metrics::describe_counter!(
        "sift_dispatch_total",
        "Requests that reached an operation handler"
    );
    metrics::describe_histogram!(
        "sift_dispatch_duration_seconds",
        "Handler latency as seen by the dispatch layer"
    );
    metrics::describe_counter!(
        "sift_auth_denied_total",
        "Requests rejected by authorization"
    );
    metrics::describe_counter!(
        "sift_alias_resolution_total",
        "Target expressions resolved on compatibility routes"
    );
    metrics::describe_counter!(
        "sift_compat_rejected_total",
        "Compatibility requests rejected before dispatch"
    );
    metrics::describe_counter!("sift_unmatched_total", "Requests no route matched");
}
