//! Deliberate data-quality defects for pipeline-hardening datasets.
//!
//! A small fraction of serialized event lines is mangled before hitting the
//! output file. Every corruption is recorded in a clean side-channel file so
//! downstream tooling can score its own detection rate against ground truth.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;

use crate::config::SimulationConfig;
use crate::events::EventRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionKind {
    InvalidTimestamp,
    MissingComma,
    TruncatedLine,
    WrongType,
    NullInjection,
}

const ALL_KINDS: [CorruptionKind; 5] = [
    CorruptionKind::InvalidTimestamp,
    CorruptionKind::MissingComma,
    CorruptionKind::TruncatedLine,
    CorruptionKind::WrongType,
    CorruptionKind::NullInjection,
];

impl CorruptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CorruptionKind::InvalidTimestamp => "invalid_timestamp",
            CorruptionKind::MissingComma => "missing_comma",
            CorruptionKind::TruncatedLine => "truncated_line",
            CorruptionKind::WrongType => "wrong_type",
            CorruptionKind::NullInjection => "null_injection",
        }
    }
}

/// Ground-truth entry written to the side channel, one line per corrupted
/// primary line.
#[derive(Debug, Clone, Serialize)]
pub struct CorruptionRecord {
    pub timestamp: String,
    pub corrupted_event_type: &'static str,
    pub corruption_type: &'static str,
}

/// Replace the timestamp value with a string no parser should accept.
fn invalid_timestamp(line: &str) -> String {
    match line.split_once("\"timestamp\":\"") {
        Some((head, tail)) => match tail.split_once('"') {
            Some((_, rest)) => format!("{head}\"timestamp\":\"INVALID_TIMESTAMP\"{rest}"),
            None => line.to_string(),
        },
        None => line.to_string(),
    }
}

/// Drop the first comma, breaking the JSON structure.
fn missing_comma(line: &str) -> String {
    match line.find(',') {
        Some(pos) => format!("{}{}", &line[..pos], &line[pos + 1..]),
        None => line.to_string(),
    }
}

/// Keep only a random 30–80% prefix of the line.
fn truncated_line(line: &str, rng: &mut impl Rng) -> String {
    let keep = rng.random_range(0.3..0.8);
    let mut end = ((line.len() as f64) * keep) as usize;
    while end > 0 && !line.is_char_boundary(end) {
        end -= 1;
    }
    line[..end].to_string()
}

/// Replace the first bare numeric value with a string literal.
fn wrong_type(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        // A key-value colon, not one inside a string value.
        if bytes[i] == b':' && bytes[i - 1] == b'"' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start {
                return format!("{}\"N/A\"{}", &line[..start], &line[end..]);
            }
        }
        i += 1;
    }
    line.to_string()
}

/// Null out the first `*_id` field's value.
fn null_injection(line: &str) -> String {
    match line.find("_id\":") {
        Some(pos) => {
            let start = pos + "_id\":".len();
            let bytes = line.as_bytes();
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start {
                format!("{}null{}", &line[..start], &line[end..])
            } else {
                line.to_string()
            }
        }
        None => line.to_string(),
    }
}

fn apply(kind: CorruptionKind, line: &str, rng: &mut impl Rng) -> String {
    match kind {
        CorruptionKind::InvalidTimestamp => invalid_timestamp(line),
        CorruptionKind::MissingComma => missing_comma(line),
        CorruptionKind::TruncatedLine => truncated_line(line, rng),
        CorruptionKind::WrongType => wrong_type(line),
        CorruptionKind::NullInjection => null_injection(line),
    }
}

#[derive(Debug, Clone)]
pub struct Corruptor {
    enabled: bool,
    probability: f64,
}

impl Corruptor {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Corruptor {
            enabled: config.data_corruption_enabled,
            probability: config.data_corruption_probability,
        }
    }

    pub fn disabled() -> Self {
        Corruptor { enabled: false, probability: 0.0 }
    }

    /// Roll the corruption dice for one serialized line. On a hit, returns
    /// the mangled line plus the ground-truth record for the side channel.
    pub fn maybe_corrupt(
        &self,
        line: &str,
        record: &EventRecord,
        rng: &mut impl Rng,
    ) -> Option<(String, CorruptionRecord)> {
        if !self.enabled || rng.random::<f64>() >= self.probability {
            return None;
        }
        let kind = ALL_KINDS[rng.random_range(0..ALL_KINDS.len())];
        let mangled = apply(kind, line, rng);
        let truth = CorruptionRecord {
            timestamp: iso(record.timestamp),
            corrupted_event_type: record.event.type_name(),
            corruption_type: kind.as_str(),
        };
        Some((mangled, truth))
    }
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
