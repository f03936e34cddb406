use serde::{Deserialize, Serialize};

use crate::types::DuplicatePolicy;

/// Template used for transfer commits when none is configured.
pub const DEFAULT_MESSAGE_TEMPLATE: &str =
    "[Transfer] Moved commits from {source} → {target}\nRange: {range}";

/// Resolved settings consumed by the engine.
///
/// The library never reads files or the environment itself; the CLI fills
/// this in from flags and `GITCHERRY_*` variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub on_duplicate: DuplicatePolicy,
    /// Print (and confirm on a terminal) the plan before applying it.
    pub preview: bool,
    /// Fetch with `--prune --tags` before operations.
    pub auto_refresh: bool,
    /// Branch used when `--to`/`--on` is omitted.
    pub default_branch: Option<String>,
    pub message_template: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            on_duplicate: DuplicatePolicy::Ask,
            preview: true,
            auto_refresh: false,
            default_branch: None,
            message_template: DEFAULT_MESSAGE_TEMPLATE.to_string(),
        }
    }
}

impl Config {
    /// Render the configured transfer message (falls back to the default
    /// template when the configured one is blank).
    pub fn transfer_message(&self, source: &str, target: &str, range: &str) -> String {
        let template = if self.message_template.trim().is_empty() {
            DEFAULT_MESSAGE_TEMPLATE
        } else {
            self.message_template.as_str()
        };
        render_template(template, source, target, range)
    }
}

/// Substitute `{source}`, `{target}` and `{range}` in `template`.
pub fn render_template(template: &str, source: &str, target: &str, range: &str) -> String {
    template
        .replace("{source}", source)
        .replace("{target}", target)
        .replace("{range}", range)
}
