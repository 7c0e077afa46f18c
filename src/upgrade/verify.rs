//! Post-reboot confirmation that the expected version landed.

use std::time::Duration;

use tracing::debug;

use super::HostContext;
use crate::device::facts::{self, Fact, FactQuery};
use crate::error::RosupError;
use crate::version::VersionNumber;

/// Time a device gets to finish booting after it answers pings.
pub const SETTLE: Duration = Duration::from_secs(5);

/// Which side of the expected version counts as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn accepts(&self, observed: &VersionNumber, expected: &VersionNumber) -> bool {
        match self {
            Direction::Up => observed >= expected,
            Direction::Down => observed <= expected,
        }
    }
}

/// Reconnect, re-read `field` and check it against `expected`.
///
/// Returns the observed version on success.
pub fn verify(
    ctx: &HostContext<'_>,
    query: FactQuery,
    field: Fact,
    expected: &VersionNumber,
    direction: Direction,
) -> Result<String, RosupError> {
    ctx.services.clock.sleep(SETTLE);

    let mut session = ctx.connect()?;
    let collected = facts::collect(session.as_mut(), query);
    session.close();
    let facts = collected?;

    let observed = facts
        .get(field)
        .map(VersionNumber::parse)
        .ok_or_else(|| RosupError::VerificationFailed {
            host: ctx.host.to_string(),
            reason: format!("could not confirm {}", field.key()),
        })?;

    debug!(
        "{} {} is {}, expected {}",
        ctx.host,
        field.key(),
        observed,
        expected
    );

    if direction.accepts(&observed, expected) {
        Ok(observed.as_str().to_string())
    } else {
        Err(RosupError::VerificationFailed {
            host: ctx.host.to_string(),
            reason: format!(
                "change did not occur, {} is {} instead of {}",
                field.key(),
                observed,
                expected
            ),
        })
    }
}
