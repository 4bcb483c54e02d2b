//! Privilege tokens - opaque colon-delimited permission strings
//!
//! Format: `<part>:<part>:...`
//!
//! Examples:
//! - `chat.color`
//! - `node:sub:value`
//!
//! The grammar of the parts is owned by the permission layer; storage only
//! splits and joins on `:`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between token parts
pub const SEPARATOR: char = ':';

/// A privilege granted directly to a user or a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Privilege {
    parts: Vec<String>,
}

impl Privilege {
    /// Build a privilege from already-split parts
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a token on `:`. Returns `None` for an empty token.
    pub fn parse(token: &str) -> Option<Self> {
        if token.is_empty() {
            return None;
        }
        Some(Self::new(token.split(SEPARATOR)))
    }

    /// The split parts, in order
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Number of parts in the tuple
    pub fn arity(&self) -> usize {
        self.parts.len()
    }

    /// Join the parts back into the stored token
    pub fn to_token(&self) -> String {
        self.parts.join(":")
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_token())
    }
}

impl FromStr for Privilege {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s).ok_or_else(|| crate::Error::Document("empty privilege token".to_string()))
    }
}

impl Serialize for Privilege {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_token())
    }
}

impl<'de> Deserialize<'de> for Privilege {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Insert a privilege unless an equal one is already present.
///
/// Returns `true` when the list changed.
pub(crate) fn insert_unique(list: &mut Vec<Privilege>, privilege: Privilege) -> bool {
    if list.contains(&privilege) {
        return false;
    }
    list.push(privilege);
    true
}
