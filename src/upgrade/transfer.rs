//! Mutating device operations: package upload, firmware staging and reboot.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::clock::Clock;
use crate::device::{REBOOT, ROUTERBOARD_UPGRADE, Session};
use crate::error::RosupError;
use crate::output::print_noop;

/// Delay between staging firmware and rebooting.
pub const FIRMWARE_SETTLE: Duration = Duration::from_secs(5);

/// A change that takes effect on the next boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Upload a RouterOS package.
    Package(PathBuf),
    /// Flash the firmware bundled with the running RouterOS.
    FirmwareUpgrade,
}

/// Apply the mutation and reboot. The session is closed either way.
///
/// In dry-run mode nothing is sent to the device.
pub fn apply(
    mut session: Box<dyn Session>,
    mutation: &Mutation,
    host: &str,
    clock: &dyn Clock,
    dry_run: bool,
) -> Result<(), RosupError> {
    let result = issue(session.as_mut(), mutation, host, clock, dry_run);
    session.close();
    result
}

fn issue(
    session: &mut dyn Session,
    mutation: &Mutation,
    host: &str,
    clock: &dyn Clock,
    dry_run: bool,
) -> Result<(), RosupError> {
    match mutation {
        Mutation::Package(path) => {
            if dry_run {
                print_noop(&format!("would upload {}", path.display()));
            } else {
                session.upload(path)?;
            }

            println!("Rebooting {}", host);
            if dry_run {
                print_noop("would reboot");
            } else {
                session.send(REBOOT)?;
            }
        }
        Mutation::FirmwareUpgrade => {
            if dry_run {
                print_noop("would upgrade routerboard and reboot");
                return Ok(());
            }

            session.send(ROUTERBOARD_UPGRADE)?;
            info!("rebooting in {} seconds.", FIRMWARE_SETTLE.as_secs());
            clock.sleep(FIRMWARE_SETTLE);

            println!("Rebooting {}", host);
            session.send(REBOOT)?;
        }
    }

    Ok(())
}
