//! Platform - what storage needs from the hosting game server

use std::cell::RefCell;
use std::collections::HashSet;
use crate::group::Group;

/// Game-server services consumed while decoding and reconciling.
pub trait Platform {
    /// Whether a world with this name exists on the running server.
    fn world_exists(&self, name: &str) -> bool;

    /// Called for a registry group right before it is dropped because it
    /// was deleted from storage. Cascading cleanup belongs here.
    fn group_deleted(&self, _group: &Group) {}
}

/// Accepts every world and does nothing on delete.
///
/// Used when no game server is attached, e.g. from the admin CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct Detached;

impl Platform for Detached {
    fn world_exists(&self, _name: &str) -> bool {
        true
    }
}

/// A fixed set of worlds; records the names of groups passed to the delete hook.
#[derive(Debug, Default)]
pub struct StaticPlatform {
    worlds: HashSet<String>,
    deleted: RefCell<Vec<String>>,
}

impl StaticPlatform {
    pub fn new<I, S>(worlds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            worlds: worlds.into_iter().map(Into::into).collect(),
            deleted: RefCell::new(Vec::new()),
        }
    }

    /// Names of groups the delete hook ran for, in call order
    pub fn deleted_groups(&self) -> Vec<String> {
        self.deleted.borrow().clone()
    }
}

impl Platform for StaticPlatform {
    fn world_exists(&self, name: &str) -> bool {
        self.worlds.contains(name)
    }

    fn group_deleted(&self, group: &Group) {
        self.deleted.borrow_mut().push(group.name().to_string());
    }
}
