//! RouterOS version parsing and ordering.
//!
//! Versions reported by devices look like `7.1.5 (stable)`, `6.49.10 (long-term)`
//! or `7.2rc1 (testing)`. Only the first whitespace-separated token is
//! significant. Ordering:
//!
//! - release segments compare numerically, trailing zero segments ignored
//!   (`7.1 == 7.1.0`)
//! - a string without any release segment sorts below every real version
//! - pre-release stages: other suffix < alpha < beta < rc < final release

use std::cmp::Ordering;
use std::fmt;

/// Release stage following the numeric part of a version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    /// Unrecognized suffix, ordered lexicographically.
    Other(String),
    Alpha(u64),
    Beta(u64),
    Rc(u64),
    Final,
}

impl Stage {
    fn parse(suffix: &str) -> Self {
        let suffix = suffix
            .trim_start_matches(['.', '-', '_'])
            .to_ascii_lowercase();
        if suffix.is_empty() {
            return Stage::Final;
        }

        // Longer names first so "beta3" isn't read as "b" + "eta3".
        let stages: [(&str, fn(u64) -> Stage); 6] = [
            ("alpha", Stage::Alpha),
            ("beta", Stage::Beta),
            ("rc", Stage::Rc),
            ("a", Stage::Alpha),
            ("b", Stage::Beta),
            ("c", Stage::Rc),
        ];
        for (name, stage) in stages {
            if let Some(number) = suffix.strip_prefix(name).and_then(stage_number) {
                return stage(number);
            }
        }

        Stage::Other(suffix)
    }
}

/// Parse the optional number after a stage name.
fn stage_number(rest: &str) -> Option<u64> {
    if rest.is_empty() {
        return Some(0);
    }
    if !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// A totally ordered version number.
#[derive(Debug, Clone)]
pub struct VersionNumber {
    raw: String,
    release: Vec<u64>,
    stage: Stage,
}

impl VersionNumber {
    /// Parse a version string. Never fails: any input maps to some version.
    pub fn parse(input: &str) -> Self {
        let raw = input.split_whitespace().next().unwrap_or("").to_string();
        let unprefixed = raw.strip_prefix(['v', 'V']).unwrap_or(&raw);

        let mut release = Vec::new();
        let mut rest = unprefixed;
        loop {
            let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits == 0 {
                break;
            }
            // Only overflow can fail here; such a segment outranks any real one.
            let segment = rest[..digits].parse::<u64>().unwrap_or(u64::MAX);
            release.push(segment);
            rest = &rest[digits..];

            match rest.strip_prefix('.') {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => rest = next,
                _ => break,
            }
        }

        while release.last() == Some(&0) {
            release.pop();
        }

        Self {
            stage: Stage::parse(rest),
            release,
            raw,
        }
    }

    /// Version text as reported, without release-name annotations.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        self.release
            .cmp(&other.release)
            .then_with(|| self.stage.cmp(&other.stage))
    }
}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionNumber {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionNumber {}
