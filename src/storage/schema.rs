//! Database schema definitions
//!
//! Every table name carries a configurable prefix so several servers can
//! share one database.

use crate::{Error, Result};

/// Resolved table names for a given prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub users: String,
    pub groups: String,
    pub tracks: String,
}

impl TableNames {
    /// Build table names, rejecting prefixes that are unsafe to splice into SQL.
    pub fn with_prefix(prefix: &str) -> Result<Self> {
        if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::InvalidConfig(format!(
                "table prefix {:?} may only contain ASCII letters, digits and '_'",
                prefix
            )));
        }
        Ok(Self {
            users: format!("{}users", prefix),
            groups: format!("{}groups", prefix),
            tracks: format!("{}tracks", prefix),
        })
    }

    /// All schema creation statements
    pub fn schema_statements(&self) -> Vec<String> {
        vec![
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    uuid TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    data TEXT NOT NULL
                )",
                self.users
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    name TEXT PRIMARY KEY,
                    data TEXT NOT NULL
                )",
                self.groups
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    name TEXT PRIMARY KEY,
                    data TEXT NOT NULL
                )",
                self.tracks
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{0}_name ON {0}(name)",
                self.users
            ),
        ]
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.users, &self.groups, &self.tracks]
    }
}
