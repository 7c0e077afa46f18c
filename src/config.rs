//! CLI configuration and argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::error::RosupError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_DATE: &str = env!("BUILD_DATE");

pub const DEFAULT_BASE_URL: &str = "https://download.mikrotik.com/routeros/";

const USERNAME_HINT: &str = "cannot determine local username, use --username";

/// Upper bound for the timeout flags (one day).
const MAX_SECONDS: u64 = 86_400;

/// Environment variables consulted for the local user name, in order.
const USERNAME_VARS: &[&str] = &["LOGNAME", "USER", "LNAME", "USERNAME"];

/// RouterOS fleet upgrade CLI.
///
/// Visits each host in order, upgrades (or downgrades) RouterOS to the
/// requested version, reboots, and verifies the device came back on the
/// expected version before moving on. Optionally upgrades RouterBOARD
/// firmware afterwards.
#[derive(Parser, Debug, Clone)]
#[command(name = "rosup")]
#[command(about = "Sequential RouterOS upgrade tool for MikroTik fleets")]
#[command(version = const_format::formatcp!(
    "{} (commit: {}, build date: {})",
    VERSION, COMMIT, BUILD_DATE
))]
pub struct Args {
    /// RouterOS version to install (e.g., 7.1.5)
    #[arg(short = 'T', long = "target", visible_alias = "target-version")]
    pub target_version: String,

    /// Allow downgrades
    #[arg(short, long, default_value = "false")]
    pub downgrade: bool,

    /// SSH timeout in seconds
    #[arg(
        short,
        long,
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SECONDS)
    )]
    pub timeout: u64,

    /// Stop upgrades of further devices if SSH fails on initial connection
    #[arg(short = 's', long, default_value = "false")]
    pub ssh_stop: bool,

    /// SSH connection retries
    #[arg(short = 'R', long, default_value_t = 10)]
    pub ssh_retries: u32,

    /// Seconds to wait for a device to come back after reboot before the upgrade is considered failed
    #[arg(
        short,
        long,
        default_value_t = 180,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SECONDS)
    )]
    pub reboot_timeout: u64,

    /// Username for access to RouterOS [default: local username]
    #[arg(short, long)]
    pub username: Option<String>,

    /// Base URL for retrieving RouterOS images
    #[arg(short, long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Download images that aren't found locally
    #[arg(short = 'D', long, default_value = "false")]
    pub download: bool,

    /// Directory holding RouterOS images
    #[arg(long, default_value = ".")]
    pub image_dir: PathBuf,

    /// Upgrade RouterBOARD firmware after the RouterOS upgrade
    #[arg(short, long, default_value = "false")]
    pub firmware: bool,

    /// Don't perform any actions, just report what would occur. Implies --verbose
    #[arg(short = 'n', long, default_value = "false")]
    pub dry_run: bool,

    /// Verbose output (-v info, -vv device facts, -vvv raw device output)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log level (trace, debug, info, warn, error), overrides --verbose
    #[arg(long, env = "ROSUP_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// RouterOS hosts to upgrade, processed in order
    #[arg(value_name = "HOST", required = true, num_args = 1..)]
    pub hosts: Vec<String>,
}

/// Immutable run configuration derived from CLI args.
#[derive(Debug, Clone)]
pub struct Config {
    pub target_version: String,
    pub downgrade: bool,
    pub timeout: Duration,
    pub ssh_stop: bool,
    pub ssh_retries: u32,
    pub reboot_timeout: Duration,
    pub username: String,
    pub base_url: String,
    pub download: bool,
    pub image_dir: PathBuf,
    pub firmware: bool,
    pub dry_run: bool,
    pub verbosity: u8,
    pub log_level: String,
    pub hosts: Vec<String>,
}

impl Config {
    /// Create config from CLI arguments, resolving the username from the environment.
    pub fn from_args(args: Args) -> Result<Self, RosupError> {
        Self::from_args_with_env(args, |name| std::env::var(name).ok())
    }

    fn from_args_with_env(
        args: Args,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RosupError> {
        let username = match args.username {
            Some(username) => username,
            None => USERNAME_VARS
                .iter()
                .find_map(|name| env(name).filter(|v| !v.is_empty()))
                .ok_or_else(|| RosupError::Config(USERNAME_HINT.to_string()))?,
        };

        if args.target_version.trim().is_empty() {
            return Err(RosupError::Config("--target must not be empty".to_string()));
        }

        let verbosity = if args.dry_run {
            args.verbose.max(1)
        } else {
            args.verbose
        };
        let log_level = args
            .log_level
            .unwrap_or_else(|| log_level_for(verbosity).to_string());

        Ok(Self {
            target_version: args.target_version.trim().to_string(),
            downgrade: args.downgrade,
            timeout: Duration::from_secs(args.timeout),
            ssh_stop: args.ssh_stop,
            ssh_retries: args.ssh_retries,
            reboot_timeout: Duration::from_secs(args.reboot_timeout),
            username,
            base_url: args.base_url,
            download: args.download,
            image_dir: args.image_dir,
            firmware: args.firmware,
            dry_run: args.dry_run,
            verbosity,
            log_level,
            hosts: args.hosts,
        })
    }
}

/// Map `-v` repetitions to a tracing filter.
fn log_level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(flags: &str) -> impl Iterator<Item = &str> {
        std::iter::once("rosup").chain(flags.split_whitespace())
    }

    fn parse(flags: &str) -> Args {
        Args::try_parse_from(argv(flags)).expect("arguments should parse")
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let args = parse("-T 7.1.5 -u admin rb1");
        let config = Config::from_args_with_env(args, no_env).unwrap();

        assert_eq!(config.target_version, "7.1.5");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.ssh_retries, 10);
        assert_eq!(config.reboot_timeout, Duration::from_secs(180));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.image_dir, PathBuf::from("."));
        assert_eq!(config.username, "admin");
        assert_eq!(config.hosts, vec!["rb1".to_string()]);
        assert!(!config.downgrade);
        assert!(!config.ssh_stop);
        assert!(!config.download);
        assert!(!config.firmware);
        assert!(!config.dry_run);
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_short_flags() {
        let args = parse("-T 6.49.0 -d -t 5 -s -R 2 -r 60 -u ops -D -f rb1 rb2");
        let config = Config::from_args_with_env(args, no_env).unwrap();

        assert!(config.downgrade);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.ssh_stop);
        assert_eq!(config.ssh_retries, 2);
        assert_eq!(config.reboot_timeout, Duration::from_secs(60));
        assert_eq!(config.username, "ops");
        assert!(config.download);
        assert!(config.firmware);
        assert_eq!(config.hosts, vec!["rb1".to_string(), "rb2".to_string()]);
    }

    #[test]
    fn test_hosts_are_required() {
        assert!(Args::try_parse_from(["rosup", "-T", "7.1.5"]).is_err());
    }

    #[test]
    fn test_target_version_is_required() {
        assert!(Args::try_parse_from(["rosup", "rb1"]).is_err());
    }

    #[test]
    fn test_dry_run_implies_verbose() {
        let args = parse("-T 7.1.5 -u admin -n rb1");
        let config = Config::from_args_with_env(args, no_env).unwrap();

        assert!(config.dry_run);
        assert_eq!(config.verbosity, 1);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_verbosity_levels() {
        let args = parse("-T 7.1.5 -u admin -vvv rb1");
        let config = Config::from_args_with_env(args, no_env).unwrap();
        assert_eq!(config.verbosity, 3);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_explicit_log_level_wins() {
        let args = parse("-T 7.1.5 -u admin -vv --log-level error rb1");
        let config = Config::from_args_with_env(args, no_env).unwrap();
        assert_eq!(config.log_level, "error");
    }

    #[test]
    fn test_username_from_environment() {
        let args = parse("-T 7.1.5 rb1");
        let config = Config::from_args_with_env(args, |name| match name {
            "USER" => Some("netops".to_string()),
            "USERNAME" => Some("other".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.username, "netops");
    }

    #[test]
    fn test_username_unresolvable() {
        let args = parse("-T 7.1.5 rb1");
        let err = Config::from_args_with_env(args, no_env).unwrap_err();
        assert!(matches!(err, RosupError::Config(_)));
    }

    #[test]
    fn test_empty_target_version_rejected() {
        let argv = ["rosup", "-T", " ", "-u", "admin", "rb1"];
        let args = Args::try_parse_from(argv).unwrap();
        assert!(Config::from_args_with_env(args, no_env).is_err());
    }

    #[test]
    fn test_timeouts_are_bounded() {
        for flags in [
            "-T 7.1.5 -r 0 rb1",
            "-T 7.1.5 -r 18446744073709551615 rb1",
            "-T 7.1.5 -r 86401 rb1",
            "-T 7.1.5 -t 0 rb1",
        ] {
            let result = Args::try_parse_from(argv(flags));
            assert!(result.is_err(), "{} should be rejected", flags);
        }

        let args = parse("-T 7.1.5 -u admin -r 86400 rb1");
        let config = Config::from_args_with_env(args, no_env).unwrap();
        assert_eq!(config.reboot_timeout, Duration::from_secs(86_400));
    }

    #[test]
    fn test_log_level_for() {
        assert_eq!(log_level_for(0), "warn");
        assert_eq!(log_level_for(1), "info");
        assert_eq!(log_level_for(2), "debug");
        assert_eq!(log_level_for(7), "trace");
    }
}
