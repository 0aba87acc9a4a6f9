//! Unit tests for retry backoff.

use std::time::Duration;

use trio_monitor::config::PollerConfig;
use trio_monitor::poller::retry::RetryPolicy;

#[test]
fn delay_doubles_until_capped() {
    let policy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_millis(3000),
    };
    assert_eq!(policy.delay(1), Duration::from_millis(500));
    assert_eq!(policy.delay(2), Duration::from_millis(1000));
    assert_eq!(policy.delay(3), Duration::from_millis(2000));
    assert_eq!(policy.delay(4), Duration::from_millis(3000));
    assert_eq!(policy.delay(40), Duration::from_millis(3000));
}

#[test]
fn from_config_uses_poller_settings() {
    let policy = RetryPolicy::from_config(&PollerConfig::default());
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.base_delay, Duration::from_millis(500));
    assert_eq!(policy.max_delay, Duration::from_millis(4000));
}
