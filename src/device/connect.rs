//! Session establishment with bounded retries and linear backoff.

use std::time::Duration;

use colored::Colorize;
use tracing::debug;

use super::{Session, Transport};
use crate::clock::Clock;
use crate::error::RosupError;

/// Connection parameters shared by every attempt against one host.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based): 1s, 2s, 3s, ...
    pub fn backoff(retry: u32) -> Duration {
        Duration::from_secs(u64::from(retry))
    }
}

/// Open a session, making at most `max_retries + 1` attempts.
pub fn connect(
    transport: &dyn Transport,
    clock: &dyn Clock,
    host: &str,
    username: &str,
    policy: RetryPolicy,
) -> Result<Box<dyn Session>, RosupError> {
    let attempts = policy.max_retries.saturating_add(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        debug!(
            "Connecting to {}@{} (attempt {}/{})",
            username, host, attempt, attempts
        );

        match transport.open(host, username, policy.timeout) {
            Ok(session) => return Ok(session),
            Err(e) => {
                debug!("SSH connection to {} failed: {}", host, e);
                last_error = e.to_string();
            }
        }

        if attempt < attempts {
            println!(
                "{}",
                format!("SSH connection failed with '{}'. Retrying.", last_error).yellow()
            );
            clock.sleep(RetryPolicy::backoff(attempt));
        }
    }

    Err(RosupError::Connection {
        host: host.to_string(),
        attempts,
        reason: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClock, FakeDevice, FakeNetwork};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(10),
            max_retries,
        }
    }

    #[test]
    fn test_backoff_is_linear() {
        assert_eq!(RetryPolicy::backoff(1), Duration::from_secs(1));
        assert_eq!(RetryPolicy::backoff(2), Duration::from_secs(2));
        assert_eq!(RetryPolicy::backoff(5), Duration::from_secs(5));
    }

    #[test]
    fn test_connect_first_attempt() {
        let clock = FakeClock::new();
        let network = FakeNetwork::new(&clock).with_device("rb1", FakeDevice::default());

        let session = connect(&network, &clock, "rb1", "admin", policy(3));

        assert!(session.is_ok());
        assert_eq!(network.connect_attempts("rb1"), 1);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_connect_recovers_after_failures() {
        let clock = FakeClock::new();
        let network = FakeNetwork::new(&clock).with_device(
            "rb1",
            FakeDevice {
                failed_connects: 2,
                ..Default::default()
            },
        );

        let session = connect(&network, &clock, "rb1", "admin", policy(3));

        assert!(session.is_ok());
        assert_eq!(network.connect_attempts("rb1"), 3);
        // 1s + 2s of backoff
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_connect_exhausts_retries() {
        let clock = FakeClock::new();
        let network = FakeNetwork::new(&clock).with_device("rb1", FakeDevice::unreachable());

        let err = connect(&network, &clock, "rb1", "admin", policy(3))
            .err()
            .expect("connection should fail");

        assert_eq!(network.connect_attempts("rb1"), 4);
        assert_eq!(clock.sleeps(), vec![1, 2, 3]);
        match err {
            RosupError::Connection { host, attempts, .. } => {
                assert_eq!(host, "rb1");
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_connect_without_retries() {
        let clock = FakeClock::new();
        let network = FakeNetwork::new(&clock).with_device("rb1", FakeDevice::unreachable());

        assert!(connect(&network, &clock, "rb1", "admin", policy(0)).is_err());
        assert_eq!(network.connect_attempts("rb1"), 1);
        assert!(clock.sleeps().is_empty());
    }
}
