//! Upgrade orchestration: planning, image provisioning, the
//! transfer-reboot-poll-verify cycle, and the fleet loop.

pub mod cycle;
pub mod fleet;
pub mod image;
pub mod plan;
pub mod reachability;
pub mod transfer;
pub mod verify;

use crate::clock::Clock;
use crate::config::Config;
use crate::device::connect::{self, RetryPolicy};
use crate::device::{Session, Transport};
use crate::error::RosupError;

use image::Fetcher;
use reachability::Prober;

/// External collaborators used while upgrading.
pub struct Services<'a> {
    pub transport: &'a dyn Transport,
    pub prober: &'a dyn Prober,
    pub fetcher: &'a dyn Fetcher,
    pub clock: &'a dyn Clock,
}

/// Everything a flow needs to work on one host.
pub struct HostContext<'a> {
    pub host: &'a str,
    pub config: &'a Config,
    pub services: &'a Services<'a>,
}

impl HostContext<'_> {
    /// Open a session to the host, retrying per the run configuration.
    pub fn connect(&self) -> Result<Box<dyn Session>, RosupError> {
        connect::connect(
            self.services.transport,
            self.services.clock,
            self.host,
            &self.config.username,
            RetryPolicy {
                timeout: self.config.timeout,
                max_retries: self.config.ssh_retries,
            },
        )
    }
}
