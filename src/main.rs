//! rosup - RouterOS fleet upgrade CLI tool.
//!
//! Upgrades MikroTik devices one at a time over SSH:
//! - Device fact collection and pre-upgrade safety checks
//! - Package download, upload and reboot
//! - Reachability polling and post-reboot version verification
//! - Optional RouterBOARD firmware upgrades

mod clock;
mod config;
mod device;
mod error;
mod output;
mod upgrade;
mod version;

#[cfg(test)]
mod testing;

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use clock::SystemClock;
use config::{Args, Config};
use device::ssh::SshTransport;
use output::{print_fleet_summary, print_run_settings};
use upgrade::Services;
use upgrade::fleet::{Fleet, FleetReport};
use upgrade::image::HttpFetcher;
use upgrade::reachability::Fping;

/// Exit status when a failure cancelled the remaining hosts.
const EXIT_FLEET_CANCELLED: i32 = 2;

fn main() {
    let args = Args::parse();
    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    // Initialize logging
    if let Err(e) = init_tracing(&config.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    debug!("Starting rosup - RouterOS Upgrade Tool");

    match run(&config) {
        Ok(report) if report.cancelled => std::process::exit(EXIT_FLEET_CANCELLED),
        Ok(_) => {}
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Main application logic.
fn run(config: &Config) -> Result<FleetReport> {
    Fping::ensure_available()?;
    print_run_settings(config);

    let fetcher = HttpFetcher::new()?;
    let services = Services {
        transport: &SshTransport,
        prober: &Fping,
        fetcher: &fetcher,
        clock: &SystemClock,
    };

    let report = Fleet::new(config, services).run(&config.hosts);
    print_fleet_summary(&report);

    Ok(report)
}

/// Initialize tracing subscriber.
fn init_tracing(log_level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to initialize log filter: {}", e))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
