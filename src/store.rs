//! PermissionStore - the one owner of storage and the delete pairing
//!
//! Repositories never touch registries beyond what they are handed. Any
//! operation that has to change both storage and a registry goes through
//! here, so the two halves are never split.

use tracing::info;
use uuid::Uuid;
use crate::group::Group;
use crate::platform::Platform;
use crate::registry::{Directory, GroupId, GroupRegistry};
use crate::storage::{Database, ReconcileStats, StoreConfig, StoreStats, UpsertOutcome};
use crate::track::Track;
use crate::user::User;
use crate::{Error, Result};

pub struct PermissionStore {
    db: Database,
    platform: Box<dyn Platform>,
}

/// Outcome of a full startup load
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct LoadReport {
    pub groups: ReconcileStats,
    pub tracks: usize,
}

impl PermissionStore {
    /// Create a store without connecting
    pub fn new(config: StoreConfig, platform: Box<dyn Platform>) -> Result<Self> {
        Ok(Self {
            db: Database::new(config)?,
            platform,
        })
    }

    /// Create a store and run [`Self::initialize`]
    pub fn open(config: StoreConfig, platform: Box<dyn Platform>) -> Result<Self> {
        let mut store = Self::new(config, platform)?;
        store.initialize()?;
        Ok(store)
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.db.initialize()
    }

    pub fn close(&mut self) -> Result<()> {
        self.db.close()
    }

    pub fn is_connected(&self) -> bool {
        self.db.is_connected()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn stats(&self) -> Result<StoreStats> {
        self.db.stats()
    }

    /// Startup load: groups first, since tracks refer to them.
    pub fn load_all(&self, directory: &mut Directory) -> Result<LoadReport> {
        let groups = self.load_groups(&mut directory.groups)?;
        let tracks = self.load_tracks(directory)?;
        Ok(LoadReport { groups, tracks })
    }

    pub fn load_groups(&self, groups: &mut GroupRegistry) -> Result<ReconcileStats> {
        self.db.groups()?.load_all(groups, self.platform.as_ref())
    }

    pub fn load_tracks(&self, directory: &mut Directory) -> Result<usize> {
        self.db.tracks()?.load_all(&mut directory.tracks, &directory.groups)
    }

    /// `Ok(None)` when no row matches or the row cannot be read.
    pub fn load_user(&self, uuid: Uuid, groups: &GroupRegistry) -> Result<Option<User>> {
        Ok(self.db.users()?.load(uuid, groups))
    }

    pub fn load_user_by_name(&self, name: &str, groups: &GroupRegistry) -> Result<Option<User>> {
        Ok(self.db.users()?.load_by_name(name, groups))
    }

    pub fn save_user(&self, user: &User, groups: &GroupRegistry) -> Result<UpsertOutcome> {
        self.db.users()?.save(user, groups)
    }

    pub fn save_group(&self, group: &Group, groups: &GroupRegistry) -> Result<UpsertOutcome> {
        self.db.groups()?.save(group, groups)
    }

    pub fn save_track(&self, track: &Track, groups: &GroupRegistry) -> Result<UpsertOutcome> {
        self.db.tracks()?.save(track, groups)
    }

    /// Delete a group from storage, run its delete hook, then drop it from the registry.
    ///
    /// Other groups' inheritance and tracks keep their (now dangling) ids.
    /// Nothing in the registry changes if the storage delete fails.
    pub fn remove_group(&self, directory: &mut Directory, id: GroupId) -> Result<Group> {
        let group = directory
            .groups
            .get(id)
            .ok_or_else(|| Error::UnknownGroup(format!("{:?}", id)))?;

        self.db.groups()?.delete(group)?;
        self.platform.group_deleted(group);

        let removed = directory
            .groups
            .remove(id)
            .ok_or_else(|| Error::UnknownGroup(format!("{:?}", id)))?;
        info!("Deleted group {}", removed.name());
        Ok(removed)
    }

    /// Delete a track from storage, then drop it from the registry.
    pub fn remove_track(&self, directory: &mut Directory, name: &str) -> Result<Option<Track>> {
        let Some(track) = directory.tracks.get(name) else {
            return Ok(None);
        };

        self.db.tracks()?.delete(track)?;
        info!("Deleted track {}", name);
        Ok(directory.tracks.remove(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Detached;
    use crate::privilege::Privilege;

    fn store() -> PermissionStore {
        PermissionStore::open(StoreConfig::memory(), Box::new(Detached)).unwrap()
    }

    fn seed(store: &PermissionStore) -> Directory {
        let mut directory = Directory::new();
        let base = directory.groups.insert("default", 0).unwrap();
        let admin = directory.groups.insert("admin", 10).unwrap();
        directory.groups.get_mut(admin).unwrap().inherit(base).unwrap();

        let mut track = Track::new("staff");
        track.groups = vec![base, admin];
        directory.tracks.push(track).unwrap();

        for id in [base, admin] {
            store
                .save_group(directory.groups.get(id).unwrap(), &directory.groups)
                .unwrap();
        }
        store
            .save_track(directory.tracks.get("staff").unwrap(), &directory.groups)
            .unwrap();
        directory
    }

    #[test]
    fn test_startup_load_resolves_identities() {
        let store = store();
        seed(&store);

        let mut directory = Directory::new();
        let report = store.load_all(&mut directory).unwrap();
        assert_eq!(report.groups.hydrated, 2);
        assert_eq!(report.tracks, 1);

        let base = directory.groups.id_of("default").unwrap();
        let admin = directory.groups.by_name("admin").unwrap();
        assert_eq!(admin.inheritance, vec![base]);
        assert_eq!(directory.tracks.get("staff").unwrap().groups[0], base);
    }

    #[test]
    fn test_user_lifecycle() {
        let store = store();
        let directory = seed(&store);

        let mut user = User::new(Uuid::new_v4(), "Steve");
        user.add_group(directory.groups.id_of("admin").unwrap());
        user.grant(Privilege::parse("fly").unwrap());

        assert_eq!(store.save_user(&user, &directory.groups).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.save_user(&user, &directory.groups).unwrap(), UpsertOutcome::Updated);
        assert_eq!(store.stats().unwrap().users, 1);

        let loaded = store.load_user(user.uuid, &directory.groups).unwrap().unwrap();
        assert_eq!(loaded, user);
        assert!(store.load_user(Uuid::new_v4(), &directory.groups).unwrap().is_none());
    }

    #[test]
    fn test_remove_group_pairs_storage_and_registry() {
        let store = store();
        let mut directory = seed(&store);
        let base = directory.groups.id_of("default").unwrap();

        let removed = store.remove_group(&mut directory, base).unwrap();
        assert_eq!(removed.name(), "default");
        assert!(!directory.groups.contains_name("default"));
        assert_eq!(store.stats().unwrap().groups, 1);

        // references are not retracted, only left dangling
        let admin = directory.groups.by_name("admin").unwrap();
        assert_eq!(admin.inheritance, vec![base]);
        assert!(directory.tracks.get("staff").unwrap().contains(base));
    }

    #[test]
    fn test_remove_unknown_group() {
        let store = store();
        let mut directory = seed(&store);
        let ghost = {
            let mut other = GroupRegistry::new();
            other.insert("x", 0).unwrap();
            other.insert("y", 0).unwrap();
            other.insert("z", 0).unwrap()
        };
        assert!(matches!(
            store.remove_group(&mut directory, ghost),
            Err(Error::UnknownGroup(_))
        ));
    }

    #[test]
    fn test_remove_track() {
        let store = store();
        let mut directory = seed(&store);

        assert!(store.remove_track(&mut directory, "staff").unwrap().is_some());
        assert!(store.remove_track(&mut directory, "staff").unwrap().is_none());
        assert_eq!(store.stats().unwrap().tracks, 0);
    }

    #[test]
    fn test_closed_store_fails_fast() {
        let mut store = store();
        let mut directory = Directory::new();
        store.close().unwrap();

        assert!(!store.is_connected());
        let err = store.load_all(&mut directory).unwrap_err();
        assert!(err.is_precondition());
        assert!(store.load_user(Uuid::new_v4(), &directory.groups).unwrap_err().is_precondition());
    }
}
