//! Core domain types shared by the berclean crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BerCleanError;

/// Current schema version for the run manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A raw batch of rows exactly as the I/O layer reads or writes them.
///
/// Every row is expected to have one cell per header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column names, in file order.
    pub headers: Vec<String>,
    /// Cell text, row-major.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// An empty table that keeps the given column set.
    pub fn empty(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

// ---------------------------------------------------------------------------
// EraBand
// ---------------------------------------------------------------------------

/// Construction-era bucket (A oldest .. K newest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EraBand {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
}

impl EraBand {
    /// All bands in chronological order.
    pub const ALL: [EraBand; 11] = [
        EraBand::A,
        EraBand::B,
        EraBand::C,
        EraBand::D,
        EraBand::E,
        EraBand::F,
        EraBand::G,
        EraBand::H,
        EraBand::I,
        EraBand::J,
        EraBand::K,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EraBand::A => "A",
            EraBand::B => "B",
            EraBand::C => "C",
            EraBand::D => "D",
            EraBand::E => "E",
            EraBand::F => "F",
            EraBand::G => "G",
            EraBand::H => "H",
            EraBand::I => "I",
            EraBand::J => "J",
            EraBand::K => "K",
        }
    }
}

impl std::fmt::Display for EraBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for EraBand {
    type Err = BerCleanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EraBand::ALL
            .into_iter()
            .find(|band| band.label() == s.trim())
            .ok_or_else(|| BerCleanError::validation(format!("unknown era band `{s}`")))
    }
}

impl TryFrom<String> for EraBand {
    type Error = BerCleanError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EraBand> for String {
    fn from(band: EraBand) -> Self {
        band.label().to_string()
    }
}

// ---------------------------------------------------------------------------
// ThermalEra / Location
// ---------------------------------------------------------------------------

/// Thermal-regulation era: built up to and including 1977, or after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThermalEra {
    Pre,
    Post,
}

impl std::fmt::Display for ThermalEra {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThermalEra::Pre => f.write_str("Pre"),
            ThermalEra::Post => f.write_str("Post"),
        }
    }
}

/// Urban/rural classification derived from the county text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Urban,
    Rural,
    Unknown,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Urban => f.write_str("urban"),
            Location::Rural => f.write_str("rural"),
            Location::Unknown => f.write_str("unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// UnknownTypologyPolicy
// ---------------------------------------------------------------------------

/// What the classifier does with a dwelling type that has no typology ranges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTypologyPolicy {
    /// Fail the typology check; the record is excluded.
    #[default]
    Exclude,
    /// Skip the typology check; other checks still apply.
    Pass,
}

impl std::str::FromStr for UnknownTypologyPolicy {
    type Err = BerCleanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclude" => Ok(Self::Exclude),
            "pass" => Ok(Self::Pass),
            other => Err(BerCleanError::validation(format!(
                "unknown typology policy `{other}`: expected `exclude` or `pass`"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// RunId / RunManifest
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one cleaning run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `<stem>_summary.json` written next to the cleaned output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    pub id: RunId,
    /// Tool version that produced the run.
    pub tool_version: String,
    pub input_path: String,
    /// SHA-256 of the input file, hex encoded.
    pub input_sha256: String,
    pub kept_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_path: Option<String>,
    /// Whether plausibility filtering ran.
    pub filter: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Row and check counts accumulated over all chunks.
    pub summary: serde_json::Value,
}
