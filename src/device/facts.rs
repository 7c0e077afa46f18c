//! Device fact collection.
//!
//! RouterOS `print` commands answer with one `key: value` pair per line,
//! right-aligned on the colon:
//!
//! ```text
//!                    uptime: 2w3d4h12m
//!                   version: 7.1.5 (stable)
//!         architecture-name: arm
//!                board-name: RB1100AHx4
//!                bad-blocks: 0%
//! ```
//!
//! Lines that don't have that shape are ignored.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::{RESOURCE_PRINT, ROUTERBOARD_PRINT, Session};
use crate::error::RosupError;

/// Placeholder shown for facts the device didn't report.
pub const UNKNOWN: &str = "unknown";

/// Facts recognized in device output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fact {
    Version,
    ArchitectureName,
    BoardName,
    BadBlocks,
    Uptime,
    CurrentFirmware,
    UpgradeFirmware,
}

impl Fact {
    /// Key as printed by the device.
    pub fn key(&self) -> &'static str {
        match self {
            Fact::Version => "version",
            Fact::ArchitectureName => "architecture-name",
            Fact::BoardName => "board-name",
            Fact::BadBlocks => "bad-blocks",
            Fact::Uptime => "uptime",
            Fact::CurrentFirmware => "current-firmware",
            Fact::UpgradeFirmware => "upgrade-firmware",
        }
    }
}

/// Introspection commands and the facts each one yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactQuery {
    Resource,
    Routerboard,
}

impl FactQuery {
    pub fn command(&self) -> &'static str {
        match self {
            FactQuery::Resource => RESOURCE_PRINT,
            FactQuery::Routerboard => ROUTERBOARD_PRINT,
        }
    }

    pub fn fields(&self) -> &'static [Fact] {
        match self {
            FactQuery::Resource => &[
                Fact::Version,
                Fact::ArchitectureName,
                Fact::BoardName,
                Fact::BadBlocks,
                Fact::Uptime,
            ],
            FactQuery::Routerboard => &[Fact::CurrentFirmware, Fact::UpgradeFirmware],
        }
    }
}

/// Facts reported by a device at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFacts {
    values: HashMap<Fact, String>,
}

impl DeviceFacts {
    /// Parse command output, keeping only the given fields.
    pub fn parse(output: &str, fields: &[Fact]) -> Self {
        let mut values = HashMap::new();

        for line in output.lines() {
            let line = line.trim_end_matches(['\r', '\n']);
            trace!("... {}", line);

            let Some((key, value)) = parse_line(line) else {
                continue;
            };
            if let Some(fact) = fields.iter().find(|f| f.key() == key) {
                values.insert(*fact, value.to_string());
            }
        }

        Self { values }
    }

    /// Reported value, or `None` when the fact is missing or empty.
    pub fn get(&self, fact: Fact) -> Option<&str> {
        self.values
            .get(&fact)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Reported value for display.
    pub fn display(&self, fact: Fact) -> &str {
        self.get(fact).unwrap_or(UNKNOWN)
    }
}

/// Split `<spaces><key>: <value>` into key and value.
///
/// The key runs up to the first colon, which must be followed by a space.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start_matches(' ');
    let colon = line.find(':')?;
    let value = line[colon + 1..].strip_prefix(' ')?;
    Some((&line[..colon], value))
}

/// Run an introspection query and parse its output.
pub fn collect(session: &mut dyn Session, query: FactQuery) -> Result<DeviceFacts, RosupError> {
    let output = session.exec(query.command())?;
    let facts = DeviceFacts::parse(&output, query.fields());

    for field in query.fields() {
        debug!("\t{}: {}", field.key(), facts.display(*field));
    }

    Ok(facts)
}
