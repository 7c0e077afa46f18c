//! Sequential fleet processing and the cross-host cancellation policy.

use std::fmt;
use std::ops::ControlFlow;

use tracing::{debug, info};

use super::cycle::{self, Cycle};
use super::image;
use super::plan::{self, Action, CHR_BOARD};
use super::transfer::Mutation;
use super::verify::Direction;
use super::{HostContext, Services};
use crate::config::Config;
use crate::device::Session;
use crate::device::facts::{self, DeviceFacts, Fact, FactQuery};
use crate::error::RosupError;
use crate::output::{print_error, print_host_header, print_success, print_warning};
use crate::version::VersionNumber;

/// Result of one flow (RouterOS or firmware) on one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOutcome {
    Success,
    UpToDate,
    SkippedPrecheckFailed,
    SkippedArtifactMissing,
    SkippedConnectionFailed,
    Failed,
    FleetCancelled,
}

impl HostOutcome {
    /// Whether the firmware flow may follow a RouterOS flow with this outcome.
    fn allows_firmware(&self) -> bool {
        matches!(
            self,
            HostOutcome::Success
                | HostOutcome::UpToDate
                | HostOutcome::SkippedArtifactMissing
                | HostOutcome::Failed
        )
    }
}

impl fmt::Display for HostOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HostOutcome::Success => "upgraded",
            HostOutcome::UpToDate => "up to date",
            HostOutcome::SkippedPrecheckFailed => "skipped (precheck)",
            HostOutcome::SkippedArtifactMissing => "skipped (no image)",
            HostOutcome::SkippedConnectionFailed => "skipped (ssh)",
            HostOutcome::Failed => "failed",
            HostOutcome::FleetCancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReport {
    pub host: String,
    pub os: HostOutcome,
    /// `None` when the firmware flow didn't run.
    pub firmware: Option<HostOutcome>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetReport {
    pub hosts: Vec<HostReport>,
    /// Set when a failure stopped processing of the remaining hosts.
    pub cancelled: bool,
}

/// A failure that halts the fleet outside of dry-run mode.
struct Abort {
    outcome: HostOutcome,
    error: RosupError,
}

impl Abort {
    fn new(outcome: HostOutcome, error: RosupError) -> Self {
        Self { outcome, error }
    }
}

/// Upgrades hosts one at a time.
pub struct Fleet<'a> {
    config: &'a Config,
    services: Services<'a>,
}

impl<'a> Fleet<'a> {
    pub fn new(config: &'a Config, services: Services<'a>) -> Self {
        Self { config, services }
    }

    pub fn run(&self, hosts: &[String]) -> FleetReport {
        let target = VersionNumber::parse(&self.config.target_version);
        let mut report = FleetReport::default();
        let mut remaining = hosts.iter();

        for host in remaining.by_ref() {
            print_host_header(host);

            let ctx = HostContext {
                host,
                config: self.config,
                services: &self.services,
            };
            let (entry, flow) = self.process(&ctx, &target);
            report.hosts.push(entry);

            if flow.is_break() {
                report.cancelled = true;
                break;
            }
        }

        report.hosts.extend(remaining.map(|host| HostReport {
            host: host.clone(),
            os: HostOutcome::FleetCancelled,
            firmware: None,
        }));

        report
    }

    /// Run the RouterOS flow, then the firmware flow when it applies.
    fn process(
        &self,
        ctx: &HostContext<'_>,
        target: &VersionNumber,
    ) -> (HostReport, ControlFlow<()>) {
        let mut report = HostReport {
            host: ctx.host.to_string(),
            os: HostOutcome::Failed,
            firmware: None,
        };

        let (chr, result) = self.os_flow(ctx, target);
        report.os = match self.settle(result) {
            ControlFlow::Continue(outcome) => outcome,
            ControlFlow::Break(outcome) => {
                report.os = outcome;
                return (report, ControlFlow::Break(()));
            }
        };

        if !self.config.firmware || chr || !report.os.allows_firmware() {
            debug!("Skipping firmware flow for {}", ctx.host);
            return (report, ControlFlow::Continue(()));
        }

        match self.settle(self.firmware_flow(ctx)) {
            ControlFlow::Continue(outcome) => {
                report.firmware = Some(outcome);
                (report, ControlFlow::Continue(()))
            }
            ControlFlow::Break(outcome) => {
                report.firmware = Some(outcome);
                (report, ControlFlow::Break(()))
            }
        }
    }

    /// Apply the cancellation policy. Dry-run turns every abort into a warning.
    fn settle(&self, result: Result<HostOutcome, Abort>) -> ControlFlow<HostOutcome, HostOutcome> {
        let abort = match result {
            Ok(outcome) => return ControlFlow::Continue(outcome),
            Err(abort) => abort,
        };

        print_error(&format!(
            "ERROR: {}. Updates to ALL FURTHER devices cancelled!",
            abort.error
        ));
        if !self.config.dry_run {
            return ControlFlow::Break(abort.outcome);
        }

        if abort.outcome == HostOutcome::SkippedConnectionFailed {
            print_warning("NOOP: skipping to next host due to being a dry run");
        } else {
            print_warning("NOOP: continuing due to being a dry run");
        }
        ControlFlow::Continue(abort.outcome)
    }

    /// Connect and collect facts, then hand over to the upgrade itself.
    ///
    /// Also reports whether the device is a CHR, which has no firmware.
    fn os_flow(
        &self,
        ctx: &HostContext<'_>,
        target: &VersionNumber,
    ) -> (bool, Result<HostOutcome, Abort>) {
        info!("Checking RouterOS version");

        let mut session = match ctx.connect() {
            Ok(session) => session,
            Err(e) if self.config.ssh_stop => {
                return (
                    false,
                    Err(Abort::new(HostOutcome::SkippedConnectionFailed, e)),
                );
            }
            Err(e) => {
                print_error(&format!("ERROR: {}", e));
                return (false, Ok(HostOutcome::SkippedConnectionFailed));
            }
        };

        let facts = match facts::collect(session.as_mut(), FactQuery::Resource) {
            Ok(facts) => facts,
            Err(e) => {
                session.close();
                println!("{}. Skipping upgrade.", e);
                return (false, Ok(HostOutcome::SkippedPrecheckFailed));
            }
        };

        let chr = facts.get(Fact::BoardName) == Some(CHR_BOARD);
        (chr, self.upgrade_os(ctx, session, &facts, target))
    }

    fn upgrade_os(
        &self,
        ctx: &HostContext<'_>,
        session: Box<dyn Session>,
        facts: &DeviceFacts,
        target: &VersionNumber,
    ) -> Result<HostOutcome, Abort> {
        let plan = match plan::decide(facts, target, self.config.downgrade) {
            Ok(plan) => plan,
            Err(e) => {
                session.close();
                println!("{}. Skipping upgrade.", e);
                return Ok(HostOutcome::SkippedPrecheckFailed);
            }
        };

        let direction = match plan.action {
            Action::NoAction => {
                session.close();
                println!("RouterOS version already {}", plan.current);
                return Ok(HostOutcome::UpToDate);
            }
            Action::Upgrade => Direction::Up,
            Action::Downgrade => Direction::Down,
        };

        println!(
            "{} RouterOS version from {} to {}",
            plan.action, plan.current, plan.target
        );
        debug!(
            "{} architecture {}, package {}",
            ctx.host, plan.architecture, plan.artifact
        );

        let package = match image::ensure(
            self.services.fetcher,
            &self.config.image_dir,
            &plan.artifact,
            plan.target.as_str(),
            &self.config.base_url,
            self.config.download,
        ) {
            Ok(path) => path,
            Err(e) => {
                session.close();
                println!("{}. Skipping upgrade.", e);
                return Ok(HostOutcome::SkippedArtifactMissing);
            }
        };

        let cycle = Cycle {
            mutation: Mutation::Package(package),
            query: FactQuery::Resource,
            field: Fact::Version,
            expected: plan.target.clone(),
            direction,
        };

        let version = match cycle::run(ctx, session, &cycle) {
            Ok(version) => version,
            Err(e) => return Err(Abort::new(HostOutcome::Failed, e)),
        };
        print_success(&format!(
            "{} RouterOS successfully {}. Version now {}",
            ctx.host,
            plan.action.past_tense(),
            version
        ));

        Ok(HostOutcome::Success)
    }

    fn firmware_flow(&self, ctx: &HostContext<'_>) -> Result<HostOutcome, Abort> {
        info!("Checking firmware version");

        let mut session = ctx
            .connect()
            .map_err(|e| Abort::new(HostOutcome::SkippedConnectionFailed, e))?;

        let facts = match facts::collect(session.as_mut(), FactQuery::Routerboard) {
            Ok(facts) => facts,
            Err(e) => {
                session.close();
                println!("{}. Skipping firmware upgrade.", e);
                return Ok(HostOutcome::SkippedPrecheckFailed);
            }
        };

        let (Some(current), Some(upgrade)) = (
            facts.get(Fact::CurrentFirmware),
            facts.get(Fact::UpgradeFirmware),
        ) else {
            session.close();
            println!("Failed to get firmware versions. Skipping firmware upgrade.");
            return Ok(HostOutcome::SkippedPrecheckFailed);
        };

        let current = VersionNumber::parse(current);
        let upgrade = VersionNumber::parse(upgrade);
        if current >= upgrade {
            session.close();
            println!("firmware version already {}", current);
            return Ok(HostOutcome::UpToDate);
        }

        println!("Upgrading firmware from {} to {}", current, upgrade);

        let cycle = Cycle {
            mutation: Mutation::FirmwareUpgrade,
            query: FactQuery::Routerboard,
            field: Fact::CurrentFirmware,
            expected: upgrade,
            direction: Direction::Up,
        };

        let version = match cycle::run(ctx, session, &cycle) {
            Ok(version) => version,
            Err(e) => return Err(Abort::new(HostOutcome::Failed, e)),
        };
        print_success(&format!(
            "{} firmware successfully upgraded. Version now {}",
            ctx.host, version
        ));

        Ok(HostOutcome::Success)
    }
}
