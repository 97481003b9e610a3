//! Configuration and wait helpers shared by the integration tests.

use std::time::Duration;

use changeflow_core::config::{ChangeflowConfig, RemoteApiConfig};
use changeflow_core::messaging::{InMemoryMessagingService, TerminalResult};

pub const POLL_INTERVAL_MS: u64 = 1_000;

/// Valid configuration with short poll and idle intervals
pub fn test_config(max_attempts: u32) -> ChangeflowConfig {
    let mut config = ChangeflowConfig {
        remote: RemoteApiConfig::new("http://remote.test", "app-1", "s3cret"),
        ..ChangeflowConfig::default()
    };
    config.poller.poll_interval_ms = POLL_INTERVAL_MS;
    config.poller.max_attempts = max_attempts;
    config.channels.idle_poll_interval_ms = 50;
    config
}

/// Poll the result queue until `count` results exist or `deadline` elapses
pub async fn wait_for_results(
    messaging: &InMemoryMessagingService,
    queue: &str,
    count: usize,
    deadline: Duration,
) -> Vec<TerminalResult> {
    let started = tokio::time::Instant::now();
    loop {
        let published = messaging.peek_all(queue).await;
        if published.len() >= count {
            return published
                .iter()
                .map(|m| m.decode::<TerminalResult>().expect("result decodes"))
                .collect();
        }
        assert!(
            started.elapsed() < deadline,
            "expected {count} results on {queue}, found {}",
            published.len()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
