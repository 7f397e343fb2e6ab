//! Entity Identifiers
//!
//! Feed entities are addressed by URNs of the form `<prefix>:<type>:<id>`,
//! for example `sr:match:12345` or `vf:player:77`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when a string is not a valid URN.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid URN: {0:?}")]
pub struct UrnError(pub String);

/// Structured entity identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Urn {
    prefix: String,
    kind: String,
    id: u64,
}

impl Urn {
    /// Create a URN from its parts.
    #[must_use]
    pub fn new(prefix: impl Into<String>, kind: impl Into<String>, id: u64) -> Self {
        Self {
            prefix: prefix.into(),
            kind: kind.into(),
            id,
        }
    }

    /// Namespace prefix (`sr`, `vf`, ...).
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Entity type (`match`, `stage`, `player`, ...).
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Numeric id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.prefix, self.kind, self.id)
    }
}

impl FromStr for Urn {
    type Err = UrnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(prefix), Some(kind), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(UrnError(s.to_string()));
        };
        if prefix.is_empty() || kind.is_empty() {
            return Err(UrnError(s.to_string()));
        }
        let id = id.parse().map_err(|_| UrnError(s.to_string()))?;
        Ok(Self::new(prefix, kind, id))
    }
}

impl Serialize for Urn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Urn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
