//! The transfer, reboot, poll and verify sequence shared by the RouterOS and
//! firmware flows.

use super::HostContext;
use super::reachability::wait_for_reachable;
use super::transfer::{self, Mutation};
use super::verify::{self, Direction};
use crate::device::Session;
use crate::device::facts::{Fact, FactQuery};
use crate::error::RosupError;
use crate::version::VersionNumber;

/// One mutation and how to confirm it after the reboot.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub mutation: Mutation,
    pub query: FactQuery,
    pub field: Fact,
    pub expected: VersionNumber,
    pub direction: Direction,
}

/// Run the cycle on an open session, returning the confirmed version.
pub fn run(
    ctx: &HostContext<'_>,
    session: Box<dyn Session>,
    cycle: &Cycle,
) -> Result<String, RosupError> {
    let clock = ctx.services.clock;
    let dry_run = ctx.config.dry_run;

    transfer::apply(session, &cycle.mutation, ctx.host, clock, dry_run)?;
    let rebooted_at = clock.now();

    let reachability = wait_for_reachable(
        ctx.services.prober,
        clock,
        ctx.host,
        ctx.config.reboot_timeout,
        dry_run,
        rebooted_at,
    );
    if !reachability.reachable {
        return Err(RosupError::RebootTimeout {
            host: ctx.host.to_string(),
            seconds: ctx.config.reboot_timeout.as_secs(),
        });
    }

    println!(
        "{} is back online after {} seconds. Checking status",
        ctx.host,
        reachability.elapsed.as_secs()
    );

    verify::verify(
        ctx,
        cycle.query,
        cycle.field,
        &cycle.expected,
        cycle.direction,
    )
}
