//! Registries - in-memory directories of live groups and tracks
//!
//! Groups live in an arena keyed by [`GroupId`] with a name index on the
//! side, so users, tracks and other groups refer to a group by id rather
//! than holding links into each other. The registries are plain values
//! passed into every storage operation that needs them.

use std::collections::{HashMap, HashSet};
use crate::group::Group;
use crate::privilege::Privilege;
use crate::track::Track;
use crate::{Error, Result};

/// Stable handle to a group in a [`GroupRegistry`].
///
/// Ids are never reused, so a handle to a removed group stays dangling
/// instead of silently pointing at a newer group with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u64);

/// Registry of live groups, keyed by name.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    /// All groups indexed by id
    groups: HashMap<GroupId, Group>,
    /// Name index
    by_name: HashMap<String, GroupId>,
    /// Registry order (insertion order)
    order: Vec<GroupId>,
    next_id: u64,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new group with empty collections.
    pub fn insert(&mut self, name: impl Into<String>, priority: i32) -> Result<GroupId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(Error::DuplicateName(name));
        }

        let id = GroupId(self.next_id);
        self.next_id += 1;

        self.by_name.insert(name.clone(), id);
        self.order.push(id);
        self.groups.insert(id, Group::new(id, name, priority));
        Ok(id)
    }

    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn get_mut(&mut self, id: GroupId) -> Option<&mut Group> {
        self.groups.get_mut(&id)
    }

    /// Resolve a name to its live group id
    pub fn id_of(&self, name: &str) -> Option<GroupId> {
        self.by_name.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&Group> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn name_of(&self, id: GroupId) -> Option<&str> {
        self.get(id).map(Group::name)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Remove a group from the registry.
    ///
    /// References held by other groups, users or tracks are left in place.
    pub fn remove(&mut self, id: GroupId) -> Option<Group> {
        let group = self.groups.remove(&id)?;
        self.by_name.remove(group.name());
        self.order.retain(|g| *g != id);
        Some(group)
    }

    /// All groups in registry order
    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.order.iter().filter_map(|id| self.groups.get(id))
    }

    /// Ids in registry order
    pub fn ids(&self) -> Vec<GroupId> {
        self.order.clone()
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(Group::name).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Walk the inheritance graph upward from `id`.
    ///
    /// Every reachable live ancestor is reported once, depth-first in
    /// declaration order. Edges that lead back onto the current path are
    /// recorded as cycles and not followed, so the walk always terminates.
    pub fn inheritance_walk(&self, id: GroupId) -> InheritanceWalk {
        let mut walk = InheritanceWalk::default();
        if self.get(id).is_none() {
            return walk;
        }

        let mut visited = HashSet::from([id]);
        let mut on_path = HashSet::from([id]);

        // each frame is a group on the current path and the index of its
        // next parent to visit
        let mut stack = vec![(id, 0usize)];
        while let Some(frame) = stack.last_mut() {
            let current = frame.0;
            let parents = self.get(current).map_or(&[][..], |g| g.inheritance.as_slice());
            let Some(&parent) = parents.get(frame.1) else {
                on_path.remove(&current);
                stack.pop();
                continue;
            };
            frame.1 += 1;

            if on_path.contains(&parent) {
                walk.cycles.push((current, parent));
                continue;
            }
            if self.get(parent).is_none() || !visited.insert(parent) {
                continue;
            }

            walk.ancestors.push(parent);
            on_path.insert(parent);
            stack.push((parent, 0));
        }
        walk
    }

    /// The group's own privileges followed by those of every ancestor, deduplicated.
    pub fn effective_privileges(&self, id: GroupId) -> Vec<Privilege> {
        let Some(group) = self.get(id) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut privileges = Vec::new();
        let ancestors = self.inheritance_walk(id).ancestors;

        let chain = std::iter::once(group).chain(ancestors.iter().filter_map(|a| self.get(*a)));
        for g in chain {
            for p in &g.privileges {
                if seen.insert(p.clone()) {
                    privileges.push(p.clone());
                }
            }
        }
        privileges
    }
}

/// Result of an inheritance walk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InheritanceWalk {
    /// Reachable ancestors, each once
    pub ancestors: Vec<GroupId>,
    /// `(from, to)` edges that closed a cycle
    pub cycles: Vec<(GroupId, GroupId)>,
}

impl InheritanceWalk {
    pub fn has_cycle(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// Registry of live tracks, in load order.
#[derive(Debug, Default)]
pub struct TrackRegistry {
    tracks: Vec<Track>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track. Fails if the name is already taken.
    pub fn push(&mut self, track: Track) -> Result<()> {
        if self.get(track.name()).is_some() {
            return Err(Error::DuplicateName(track.name().to_string()));
        }
        self.tracks.push(track);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.name() == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Track> {
        let idx = self.tracks.iter().position(|t| t.name() == name)?;
        Some(self.tracks.remove(idx))
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// The registries storage reads from and writes into.
#[derive(Debug, Default)]
pub struct Directory {
    pub groups: GroupRegistry,
    pub tracks: TrackRegistry,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }
}
