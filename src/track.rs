//! Tracks - ordered promotion ladders of groups

use crate::registry::GroupId;

/// A promotion ladder. Lower index = lower rung.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    name: String,
    /// Whether this is a default track. Exclusivity across tracks is not enforced.
    pub default_track: bool,
    pub groups: Vec<GroupId>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_track: false,
            groups: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rung index of a group on this ladder
    pub fn position(&self, group: GroupId) -> Option<usize> {
        self.groups.iter().position(|g| *g == group)
    }

    pub fn contains(&self, group: GroupId) -> bool {
        self.position(group).is_some()
    }

    /// The group one rung above `group`, if any
    pub fn next(&self, group: GroupId) -> Option<GroupId> {
        let idx = self.position(group)?;
        self.groups.get(idx + 1).copied()
    }

    /// The group one rung below `group`, if any
    pub fn previous(&self, group: GroupId) -> Option<GroupId> {
        let idx = self.position(group)?;
        idx.checked_sub(1).and_then(|i| self.groups.get(i).copied())
    }
}
