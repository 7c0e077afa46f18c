//! Waiting for a rebooted device to answer pings again.

use std::io;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::clock::Clock;
use crate::error::RosupError;
use crate::output::create_reboot_spinner;

const FPING: &str = "fping";

/// Exit status a shell reports for a command it couldn't find.
const COMMAND_NOT_FOUND: i32 = 127;

/// Time a device gets to actually go down before it is probed.
pub const REBOOT_GRACE: Duration = Duration::from_secs(10);

/// Delay between failed probes.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Checks whether a host answers.
pub trait Prober {
    fn probe(&self, host: &str) -> bool;
}

/// ICMP probe through the `fping` binary.
pub struct Fping;

impl Fping {
    /// Fail early when `fping` can't be run at all.
    pub fn ensure_available() -> Result<(), RosupError> {
        let status = Command::new(FPING)
            .args(["-q", "localhost"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.code() == Some(COMMAND_NOT_FOUND) => {
                Err(RosupError::Environment("command not found".to_string()))
            }
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(RosupError::Environment("command not found".to_string()))
            }
            Err(e) => Err(RosupError::Environment(e.to_string())),
        }
    }
}

impl Prober for Fping {
    fn probe(&self, host: &str) -> bool {
        match Command::new(FPING)
            .args(["-q", host])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => status.success(),
            Err(e) => {
                debug!("fping {} failed to run: {}", host, e);
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reachability {
    pub reachable: bool,
    /// Time since the reboot was issued.
    pub elapsed: Duration,
}

/// Poll `host` until it answers or `reboot_timeout` runs out.
///
/// The grace period is skipped in dry-run mode since nothing was rebooted.
pub fn wait_for_reachable(
    prober: &dyn Prober,
    clock: &dyn Clock,
    host: &str,
    reboot_timeout: Duration,
    dry_run: bool,
    rebooted_at: Instant,
) -> Reachability {
    if !dry_run {
        clock.sleep(REBOOT_GRACE);
    }

    // No deadline when the timeout is too large to represent.
    let deadline = clock.now().checked_add(reboot_timeout);
    let spinner = create_reboot_spinner();
    let mut reachable = false;

    while deadline.is_none_or(|deadline| clock.now() < deadline) {
        if prober.probe(host) {
            reachable = true;
            break;
        }

        let waited = clock.now().saturating_duration_since(rebooted_at);
        spinner.set_message(format!("{} seconds since reboot...", waited.as_secs()));
        spinner.tick();
        clock.sleep(POLL_INTERVAL);
    }
    spinner.finish_and_clear();

    let elapsed = clock.now().saturating_duration_since(rebooted_at);
    debug!("{} reachable={} after {:?}", host, reachable, elapsed);

    Reachability { reachable, elapsed }
}
