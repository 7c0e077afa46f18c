//! RouterOS device access: sessions, fact collection and connection retries.

pub mod connect;
pub mod facts;
pub mod ssh;

use std::path::Path;
use std::time::Duration;

use crate::error::RosupError;

/// Read-only introspection of system resources.
pub const RESOURCE_PRINT: &str = "/system resource print";
/// Read-only introspection of RouterBOARD firmware.
pub const ROUTERBOARD_PRINT: &str = "/system routerboard print";
/// Reboots the device. The session dies shortly after.
pub const REBOOT: &str = "/system reboot";
/// Stages the bundled firmware for the next boot.
pub const ROUTERBOARD_UPGRADE: &str = "/system routerboard upgrade";

/// An authenticated administrative session to a single device.
pub trait Session {
    /// Run a command and return everything it wrote to stdout.
    fn exec(&mut self, command: &str) -> Result<String, RosupError>;

    /// Run a command without waiting for output.
    fn send(&mut self, command: &str) -> Result<(), RosupError>;

    /// Copy a local file into the device's root directory.
    fn upload(&mut self, path: &Path) -> Result<(), RosupError>;

    /// Close the session.
    fn close(self: Box<Self>);
}

/// Opens sessions to devices.
pub trait Transport {
    fn open(
        &self,
        host: &str,
        username: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Session>, RosupError>;
}
