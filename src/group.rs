//! Permission groups
//!
//! A group is identified by its name, which is immutable once registered.
//! Inheritance is held as a list of [`GroupId`]s into the owning
//! [`GroupRegistry`](crate::registry::GroupRegistry), never as direct links.

use crate::privilege::{self, Privilege};
use crate::registry::GroupId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of a server instance a group is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(pub Uuid);

impl ServerId {
    pub fn parse(s: &str) -> Result<Self> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ServerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A permission group held by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    id: GroupId,
    name: String,
    /// Inheritance precedence; stubs created during reconciliation start at 0
    pub priority: i32,
    pub privileges: Vec<Privilege>,
    /// Directly inherited groups, in declaration order
    pub inheritance: Vec<GroupId>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    /// World names this group is scoped to
    pub worlds: Vec<String>,
    /// Server identities this group is scoped to
    pub servers: Vec<ServerId>,
}

impl Group {
    /// Only the registry hands out ids, so construction stays crate-private.
    pub(crate) fn new(id: GroupId, name: impl Into<String>, priority: i32) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
            privileges: Vec::new(),
            inheritance: Vec::new(),
            prefix: None,
            suffix: None,
            worlds: Vec::new(),
            servers: Vec::new(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grant a privilege. Returns `false` if it was already granted.
    pub fn grant(&mut self, privilege: Privilege) -> bool {
        privilege::insert_unique(&mut self.privileges, privilege)
    }

    /// Revoke a privilege. Returns `true` if it was present.
    pub fn revoke(&mut self, privilege: &Privilege) -> bool {
        let before = self.privileges.len();
        self.privileges.retain(|p| p != privilege);
        before != self.privileges.len()
    }

    /// Add a parent group. Duplicates are ignored; self-inheritance is rejected.
    pub fn inherit(&mut self, parent: GroupId) -> Result<bool> {
        if parent == self.id {
            return Err(Error::SelfInheritance(self.name.clone()));
        }
        if self.inheritance.contains(&parent) {
            return Ok(false);
        }
        self.inheritance.push(parent);
        Ok(true)
    }

    pub fn disinherit(&mut self, parent: GroupId) -> bool {
        let before = self.inheritance.len();
        self.inheritance.retain(|id| *id != parent);
        before != self.inheritance.len()
    }

    pub fn inherits(&self, parent: GroupId) -> bool {
        self.inheritance.contains(&parent)
    }

    /// Reset every mutable field to the defaults of a freshly created stub.
    pub(crate) fn reset(&mut self) {
        self.priority = 0;
        self.privileges.clear();
        self.inheritance.clear();
        self.prefix = None;
        self.suffix = None;
        self.worlds.clear();
        self.servers.clear();
    }
}
