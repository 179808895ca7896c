//! Store metrics helpers.

use metrics::counter;

/// Metric names.
pub mod names {
    pub const STORE_REQUESTS: &str = "vmatch_store_requests_total";
    pub const STORE_FAILURES: &str = "vmatch_store_request_failures_total";
    pub const STORE_RETRIES: &str = "vmatch_store_retries_total";
}

/// Record one store request outcome.
pub fn record_request(operation: &str, success: bool) {
    counter!(names::STORE_REQUESTS, "operation" => operation.to_string()).increment(1);
    if !success {
        counter!(names::STORE_FAILURES, "operation" => operation.to_string()).increment(1);
    }
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(names::STORE_RETRIES, "operation" => operation.to_string()).increment(1);
}
