//! Topic Filters
//!
//! Resolves a subscription mode into the set of routing-key patterns bound
//! to the private queue. Routing keys have eight dot-separated segments:
//! `<priority>.<pre>.<live>.<kind>.<sport>.<urn_type>.<event_id>.<node_id>`.

use std::fmt;
use std::str::FromStr;

/// Pattern for system messages (`alive`, `snapshot_complete`).
pub const SYSTEM_PATTERN: &str = "-.-.-.#";

/// Subscription mode selecting the content patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindMode {
    /// Every message; subsumes all other patterns.
    #[default]
    All,
    /// Virtual sports only.
    Virtuals,
    /// Pre-match and live sports.
    Sports,
    /// Pre-match only.
    Prematch,
    /// Live only.
    Live,
}

impl BindMode {
    /// Name used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Virtuals => "virtuals",
            Self::Sports => "sports",
            Self::Prematch => "prematch",
            Self::Live => "live",
        }
    }

    /// Content patterns for the mode, without the system pattern.
    const fn content_patterns(self) -> &'static [&'static str] {
        match self {
            Self::All => &["#"],
            Self::Virtuals => &["*.virt.#"],
            Self::Sports => &["*.pre.#", "*.*.live.#"],
            Self::Prematch => &["*.pre.#"],
            Self::Live => &["*.*.live.#"],
        }
    }
}

impl fmt::Display for BindMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BindMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "virtuals" | "virt" => Ok(Self::Virtuals),
            "sports" => Ok(Self::Sports),
            "prematch" | "pre" => Ok(Self::Prematch),
            "live" => Ok(Self::Live),
            other => Err(other.to_string()),
        }
    }
}

/// Pattern routing recovered messages back to one node.
#[must_use]
pub fn node_pattern(node_id: i32) -> String {
    format!("*.*.*.*.*.*.*.{node_id}")
}

/// Resolve the full set of binding patterns for a subscription.
///
/// Every mode except [`BindMode::All`] also binds [`SYSTEM_PATTERN`]. A
/// configured node id adds exactly one node pattern.
#[must_use]
pub fn resolve_bindings(mode: BindMode, node_id: Option<i32>) -> Vec<String> {
    let mut patterns: Vec<String> = mode
        .content_patterns()
        .iter()
        .map(|p| (*p).to_string())
        .collect();
    if mode != BindMode::All {
        patterns.push(SYSTEM_PATTERN.to_string());
    }
    if let Some(node_id) = node_id {
        patterns.push(node_pattern(node_id));
    }
    patterns
}
