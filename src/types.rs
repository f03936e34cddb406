use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// Metadata for a single commit as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub author: String,
    pub time: DateTime<Utc>,
    pub subject: String,
    /// Paths touched by the commit, in the order git lists them.
    pub files: Vec<String>,
}

impl Commit {
    /// Abbreviated identifier for display.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// First six characters of an identifier (or the whole thing if shorter).
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(6) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

// ---------------------------------------------------------------------------
// OperationKind
// ---------------------------------------------------------------------------

/// The closed set of operations the engine knows how to plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Transfer,
    Revert,
    Restore,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Revert => "revert",
            Self::Restore => "restore",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DuplicatePolicy
// ---------------------------------------------------------------------------

/// What to do when some of the selected commits already landed on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Ask,
    Skip,
    Apply,
}

impl FromStr for DuplicatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ask" => Ok(Self::Ask),
            "skip" => Ok(Self::Skip),
            "apply" => Ok(Self::Apply),
            other => Err(Error::invalid_config(format!(
                "invalid value for --on-duplicate: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ask => "ask",
            Self::Skip => "skip",
            Self::Apply => "apply",
        })
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Executor states. Plan steps are tagged with the stage that runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Checkout,
    ApplyRange,
    Commit,
    Success,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Checkout => "checkout",
            Self::ApplyRange => "apply-range",
            Self::Commit => "commit",
            Self::Success => "success",
        })
    }
}
