//! # System Constants
//!
//! Channel names, message key prefixes, remote API paths and operational
//! defaults shared by the workers, the client and the configuration layer.

/// Channel (queue) names
pub mod queues {
    pub const CHANGE_REQUESTS: &str = "change_requests";
    pub const CHANGE_PENDING: &str = "change_pending";
    pub const CHANGE_RESULTS: &str = "change_results";
    pub const DEFAULT_CONSUMER_GROUP: &str = "changeflow";
}

/// Message key prefixes used when publishing to the internal channels
pub mod keys {
    pub const PENDING_PREFIX: &str = "Pending:";
    pub const RESULT_PREFIX: &str = "Result:";

    pub fn pending_key(correlation_id: &str) -> String {
        format!("{PENDING_PREFIX}{correlation_id}")
    }

    pub fn result_key(correlation_id: &str) -> String {
        format!("{RESULT_PREFIX}{correlation_id}")
    }
}

/// Remote change API paths and headers
pub mod remote {
    /// Initiation path; also the signed path for POST requests
    pub const RECOMMENDATION_PATH: &str = "/recommendation";
    pub const DEFAULT_APP_ID_HEADER: &str = "x-colt-app-id";
    pub const DEFAULT_SIGNATURE_HEADER: &str = "x-colt-app-sig";
    /// UTC hour granularity: the signature window is the current hour
    pub const SIGNATURE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H";
}

/// States reported by the remote status API
pub mod remote_states {
    pub const PENDING: &str = "PENDING";
    pub const COMPLETED: &str = "COMPLETED";
    pub const FAILED: &str = "FAILED";
}

/// Operational defaults
pub mod defaults {
    pub const POLL_INTERVAL_MS: u64 = 10_000;
    pub const MAX_POLL_ATTEMPTS: u32 = 5;
    pub const REQUEST_TIMEOUT_MS: u64 = 30_000;
    pub const MAX_IDLE_CONNECTIONS: usize = 10;
    pub const IDLE_CONNECTION_TIMEOUT_MS: u64 = 30_000;
    pub const VISIBILITY_TIMEOUT_MS: u64 = 300_000;
    pub const IDLE_POLL_INTERVAL_MS: u64 = 1_000;
    pub const BATCH_SIZE: usize = 1;
    pub const BIND_ADDRESS: &str = "0.0.0.0:8080";
}
