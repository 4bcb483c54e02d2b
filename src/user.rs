//! Users - transient, loaded per lookup and never cached

use crate::privilege::{self, Privilege};
use crate::registry::GroupId;
use uuid::Uuid;

/// A player's permission record.
///
/// Identity is the UUID; the display name is a secondary lookup key and may
/// change between saves.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub uuid: Uuid,
    pub name: String,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub super_user: bool,
    pub privileges: Vec<Privilege>,
    groups: Vec<GroupId>,
}

impl User {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            prefix: None,
            suffix: None,
            super_user: false,
            privileges: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Groups the user belongs to, in membership order, without duplicates
    pub fn groups(&self) -> &[GroupId] {
        &self.groups
    }

    /// Add a group membership. Returns `false` if already a member.
    pub fn add_group(&mut self, group: GroupId) -> bool {
        if self.groups.contains(&group) {
            return false;
        }
        self.groups.push(group);
        true
    }

    pub fn remove_group(&mut self, group: GroupId) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| *g != group);
        before != self.groups.len()
    }

    pub fn in_group(&self, group: GroupId) -> bool {
        self.groups.contains(&group)
    }

    pub fn grant(&mut self, privilege: Privilege) -> bool {
        privilege::insert_unique(&mut self.privileges, privilege)
    }

    pub fn revoke(&mut self, privilege: &Privilege) -> bool {
        let before = self.privileges.len();
        self.privileges.retain(|p| p != privilege);
        before != self.privileges.len()
    }
}
