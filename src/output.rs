//! Console output: status lines, progress bars and the fleet summary.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::Config;
use crate::upgrade::fleet::{FleetReport, HostOutcome};

/// Print the `*** host ***` banner that opens each host's section.
pub fn print_host_header(host: &str) {
    println!();
    println!("{}", format!("*** {} ***", host).bold().underline());
}

pub fn print_error(message: &str) {
    println!("{}", message.red());
}

pub fn print_warning(message: &str) {
    println!("{}", message.yellow());
}

pub fn print_success(message: &str) {
    println!("{}", message.green());
}

/// Report an action skipped because of dry-run.
pub fn print_noop(message: &str) {
    println!("{}", format!("NOOP: {}", message).blue());
}

/// Echo the effective settings when running verbosely.
pub fn print_run_settings(config: &Config) {
    if config.verbosity == 0 {
        return;
    }

    println!("Verbose output enabled");
    println!("Verbose level {}", config.verbosity);
    println!("Username: '{}'", config.username);
    println!("Timeout: {} seconds", config.timeout.as_secs());
    println!("Upgrading to RouterOS {}", config.target_version);
    if config.downgrade {
        println!("Downgrades allowed");
    }
    if config.firmware {
        println!("Upgrading firmware if available");
    }
    if config.dry_run {
        println!("{}", "Dry run only. NOT performing any actions.".yellow());
    }
}

/// Byte progress bar for uploads and downloads.
pub fn create_transfer_bar(size: u64) -> ProgressBar {
    let pb = ProgressBar::new(size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{msg} [{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} ({percent}%)",
            )
            .unwrap()
            .progress_chars("=>-"),
    );
    pb
}

/// Spinner shown while waiting for a device to come back.
pub fn create_reboot_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "ROUTEROS")]
    os: String,
    #[tabled(rename = "FIRMWARE")]
    firmware: String,
}

fn colorize(outcome: HostOutcome) -> String {
    let label = outcome.to_string();
    match outcome {
        HostOutcome::Success => label.green().to_string(),
        HostOutcome::UpToDate => label,
        HostOutcome::Failed | HostOutcome::FleetCancelled => label.red().to_string(),
        _ => label.yellow().to_string(),
    }
}

/// Print one row per host with the outcome of each flow.
pub fn print_fleet_summary(report: &FleetReport) {
    if report.hosts.is_empty() {
        return;
    }

    let rows: Vec<SummaryRow> = report
        .hosts
        .iter()
        .map(|h| SummaryRow {
            host: h.host.clone(),
            os: colorize(h.os),
            firmware: h
                .firmware
                .map(colorize)
                .unwrap_or_else(|| "-".dimmed().to_string()),
        })
        .collect();

    println!();
    println!("{}", "Summary:".bold());
    let mut table = Table::new(&rows);
    table.with(Style::psql());
    println!("{}", table);

    if report.cancelled {
        print_error("Updates to ALL FURTHER devices were cancelled.");
    }
}
