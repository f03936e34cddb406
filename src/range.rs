use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::gateway::Gateway;

// ---------------------------------------------------------------------------
// RangeSpec
// ---------------------------------------------------------------------------

/// A user-supplied `start..end` selection (both ends inclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: String,
    pub end: String,
}

impl RangeSpec {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Parse `a..b`, or a bare `a` when `allow_single` is set.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRangeSpec`] for an empty string, a missing
    /// endpoint on either side of `..`, or a bare reference when
    /// `allow_single` is false.
    pub fn parse(spec: &str, allow_single: bool) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(Error::invalid_range("range must be provided"));
        }

        if let Some((start, end)) = spec.split_once("..") {
            let (start, end) = (start.trim(), end.trim());
            if start.is_empty() || end.is_empty() {
                return Err(Error::invalid_range(spec));
            }
            // `a...b` and `a..b..c` would otherwise leave dots in `end`.
            if end.starts_with('.') || end.contains("..") {
                return Err(Error::invalid_range(format!(
                    "expected exactly one '..': {}",
                    spec
                )));
            }
            reject_option_like(start)?;
            reject_option_like(end)?;
            return Ok(Self::new(start, end));
        }

        if !allow_single {
            return Err(Error::invalid_range(format!(
                "range must include '..': {}",
                spec
            )));
        }
        reject_option_like(spec)?;
        Ok(Self::new(spec, spec))
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }

    /// `start^..end`, the form cherry-pick and revert need to include `start`.
    pub fn inclusive(&self) -> String {
        format!("{}^..{}", self.start, self.end)
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Endpoints reach git as positional arguments; a leading `-` would be read
/// as an option.
fn reject_option_like(endpoint: &str) -> Result<()> {
    if endpoint.starts_with('-') {
        return Err(Error::invalid_range(format!(
            "endpoint must not start with '-': {}",
            endpoint
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve `range` to commit identifiers from `start` through `end`, oldest
/// first, without duplicates.
///
/// Tries `start^..end` first. If that selects nothing (a root `start` has no
/// parent), falls back to `start..end` with `start` prepended. If neither
/// query yields anything, returns the literal endpoints so a dry-run can still
/// show a plan. Never fails on lookup errors.
pub fn resolve_range<G: Gateway + ?Sized>(gateway: &G, range: &RangeSpec) -> Vec<String> {
    let start = range.start.as_str();

    let inclusive = range.inclusive();
    match gateway.rev_list(&inclusive) {
        Ok(ids) if !ids.is_empty() => return dedup(ids),
        Ok(_) => log::debug!("rev-list {} selected nothing", inclusive),
        Err(e) => log::debug!("rev-list {} failed: {}", inclusive, e),
    }

    let exclusive = range.to_string();
    match gateway.rev_list(&exclusive) {
        Ok(mut ids) => {
            if ids.first().map(String::as_str) != Some(start) {
                ids.insert(0, start.to_string());
            }
            return dedup(ids);
        }
        Err(e) => log::debug!("rev-list {} failed: {}", exclusive, e),
    }

    log::warn!(
        "could not list commits for {}; using the endpoints as given",
        range
    );
    let mut ids = vec![range.start.clone()];
    if !range.is_single() {
        ids.push(range.end.clone());
    }
    ids
}

fn dedup(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
