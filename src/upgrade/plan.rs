//! RouterOS upgrade decision.

use std::cmp::Ordering;
use std::fmt;

use tracing::debug;

use super::image::artifact_name;
use crate::device::facts::{DeviceFacts, Fact};
use crate::error::RosupError;
use crate::version::VersionNumber;

/// Board name reported by Cloud Hosted Router instances.
pub const CHR_BOARD: &str = "CHR";

/// Architecture of CHR images regardless of what the device reports.
const CHR_ARCHITECTURE: &str = "x86";

/// The only bad-blocks value considered safe to flash over.
const HEALTHY_BAD_BLOCKS: &str = "0%";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Upgrade,
    Downgrade,
    NoAction,
}

impl Action {
    /// Past tense used once the change is confirmed.
    pub fn past_tense(&self) -> &'static str {
        match self {
            Action::Upgrade => "upgraded",
            Action::Downgrade => "downgraded",
            Action::NoAction => "unchanged",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Action::Upgrade => "Upgrading",
            Action::Downgrade => "Downgrading",
            Action::NoAction => "Keeping",
        };
        write!(f, "{}", verb)
    }
}

/// What to do with one device.
#[derive(Debug, Clone)]
pub struct UpgradePlan {
    pub current: VersionNumber,
    pub target: VersionNumber,
    pub action: Action,
    pub architecture: String,
    pub artifact: String,
}

/// Decide whether a device needs a new RouterOS package.
///
/// Fails when a fact required for a safe decision is missing, or when a
/// non-CHR device reports bad blocks.
pub fn decide(
    facts: &DeviceFacts,
    target: &VersionNumber,
    downgrade: bool,
) -> Result<UpgradePlan, RosupError> {
    let version = facts
        .get(Fact::Version)
        .ok_or_else(|| RosupError::FactsUnavailable("current RouterOS version".to_string()))?;

    let mut architecture = facts
        .get(Fact::ArchitectureName)
        .ok_or_else(|| RosupError::FactsUnavailable("RouterOS architecture-name".to_string()))?
        .to_string();

    if facts.get(Fact::BoardName) == Some(CHR_BOARD) {
        debug!("CHR board, using {} images", CHR_ARCHITECTURE);
        architecture = CHR_ARCHITECTURE.to_string();
    } else {
        match facts.get(Fact::BadBlocks) {
            None => {
                return Err(RosupError::FactsUnavailable(
                    "current bad-blocks".to_string(),
                ));
            }
            Some(HEALTHY_BAD_BLOCKS) => {}
            Some(bad_blocks) => {
                return Err(RosupError::PrecheckFailed(format!(
                    "bad-blocks of {} is not {}",
                    bad_blocks, HEALTHY_BAD_BLOCKS
                )));
            }
        }
    }

    let current = VersionNumber::parse(version);
    let action = match current.cmp(target) {
        Ordering::Less => Action::Upgrade,
        Ordering::Greater if downgrade => Action::Downgrade,
        _ => Action::NoAction,
    };

    Ok(UpgradePlan {
        artifact: artifact_name(&architecture, target.as_str()),
        current,
        target: target.clone(),
        action,
        architecture,
    })
}
