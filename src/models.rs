//! Domain types shared by the generators, the analyzer and the store.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lower clamp applied to every generated vibration value.
pub const MIN_VIBRATION: f64 = 0.1;

/// One sensor observation as produced by a generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    pub device_name: String,
    /// Starts at 1 and increases by exactly 1 per reading of the same device
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    /// Degrees Celsius
    pub temperature: f64,
    pub vibration: f64,
    /// Volts
    pub voltage: f64,
}

/// Severity assigned by the analyzer. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Good,
    Warning,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }

    /// Whether this severity is forwarded to the alert sink.
    #[must_use]
    pub fn is_alert(self) -> bool {
        self != Self::Good
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown severity: {0}")]
pub struct ParseSeverityError(String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Good" => Ok(Self::Good),
            "Warning" => Ok(Self::Warning),
            "Critical" => Ok(Self::Critical),
            other => Err(ParseSeverityError(other.to_string())),
        }
    }
}

/// Alert reason stored for readings that triggered no threshold.
pub const NO_ALERT: &str = "None";

/// A reading enriched with the analyzer's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedReading {
    #[serde(flatten)]
    pub reading: Reading,
    pub status: Severity,
    /// Comma-separated reasons in temperature, vibration, voltage order, or `"None"`
    pub alert_type: String,
}

/// Format a timestamp the way it is persisted: RFC 3339, UTC, microseconds.
///
/// The fixed width keeps lexicographic order identical to chronological order.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
