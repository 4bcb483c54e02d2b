//! Group repository and the group reconciliation pass
//!
//! Bulk load runs in four steps:
//! 1. read every stored group name
//! 2. drop registry groups that are no longer stored (running the delete hook)
//! 3. register a priority-0 stub for every stored name the registry lacks
//! 4. hydrate every registry group from its document
//!
//! Stubs exist before any document is decoded so inheritance can resolve
//! to groups whose own rows come later.

use std::collections::HashSet;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};
use crate::document::{self, GroupDocument};
use crate::group::Group;
use crate::platform::Platform;
use crate::registry::GroupRegistry;
use crate::Result;
use super::upsert::{self, UpsertOutcome, UpsertSql};

pub struct GroupRepository<'a> {
    conn: &'a Connection,
    table: &'a str,
}

impl<'a> GroupRepository<'a> {
    pub(crate) fn new(conn: &'a Connection, table: &'a str) -> Self {
        Self { conn, table }
    }

    /// Every stored group name
    pub fn names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!("SELECT name FROM {}", self.table))?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// The raw document stored for `name`
    pub fn document(&self, name: &str) -> Result<Option<String>> {
        let data = self
            .conn
            .query_row(
                &format!("SELECT data FROM {} WHERE name = ?1 LIMIT 1", self.table),
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }

    /// Make `registry` match storage, then hydrate every group.
    ///
    /// Must not run while something else mutates the registry.
    pub fn load_all(&self, registry: &mut GroupRegistry, platform: &dyn Platform) -> Result<ReconcileStats> {
        self.reconcile(registry, platform)
            .inspect(|stats| info!("Loaded {} groups", stats.hydrated))
            .inspect_err(|e| warn!("Group load aborted: {}", e))
    }

    fn reconcile(&self, registry: &mut GroupRegistry, platform: &dyn Platform) -> Result<ReconcileStats> {
        let mut stats = ReconcileStats::default();

        // Step 1: authoritative name set
        let stored = self.names()?;
        let stored_set: HashSet<&str> = stored.iter().map(String::as_str).collect();

        // Step 2: prune groups deleted from storage
        for id in registry.ids() {
            let Some(group) = registry.get(id) else {
                continue;
            };
            if stored_set.contains(group.name()) {
                continue;
            }
            platform.group_deleted(group);
            if let Some(group) = registry.remove(id) {
                debug!("Removed group {} (deleted from storage)", group.name());
                stats.removed.push(group.name().to_string());
            }
        }

        // Step 3: stubs for groups only storage knows about
        for name in &stored {
            if !registry.contains_name(name) {
                registry.insert(name.clone(), 0)?;
                stats.created.push(name.clone());
            }
        }

        // Step 4: hydrate from documents
        for id in registry.ids() {
            let Some(name) = registry.name_of(id).map(str::to_string) else {
                continue;
            };

            let Some(json) = self.document(&name)? else {
                debug!("Group {} vanished before hydration", name);
                stats.missing.push(name);
                continue;
            };

            let doc: GroupDocument = match document::from_json(&json) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Ignoring unreadable data for group {}: {}", name, e);
                    stats.undecodable.push(name);
                    continue;
                }
            };

            let fields = document::decode_group(&name, &doc, registry, platform);
            if let Some(group) = registry.get_mut(id) {
                fields.apply(group);
                stats.hydrated += 1;
            }
        }

        Ok(stats)
    }

    /// Write the full group snapshot, keyed by name.
    pub fn save(&self, group: &Group, registry: &GroupRegistry) -> Result<UpsertOutcome> {
        self.try_save(group, registry)
            .inspect(|outcome| debug!("Saved group {} ({:?})", group.name(), outcome))
            .inspect_err(|e| warn!("Failed to save group {}: {}", group.name(), e))
    }

    fn try_save(&self, group: &Group, registry: &GroupRegistry) -> Result<UpsertOutcome> {
        let json = document::to_json(&document::encode_group(group, registry))?;
        let sql = UpsertSql::keyed_document(self.table, "name");
        upsert::upsert(
            self.conn,
            &sql,
            group.name(),
            params![json, group.name()],
            params![group.name(), json],
        )
    }

    /// Delete the stored row only. The registry entry is left alone.
    pub fn delete(&self, group: &Group) -> Result<bool> {
        upsert::delete(self.conn, self.table, "name", group.name())
            .inspect_err(|e| warn!("Failed to delete group {}: {}", group.name(), e))
    }

    pub fn count(&self) -> Result<usize> {
        upsert::count(self.conn, self.table)
    }
}

/// What a reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ReconcileStats {
    /// Registry groups dropped because storage no longer has them
    pub removed: Vec<String>,
    /// Stubs created for names only storage had
    pub created: Vec<String>,
    /// Groups whose fields were overwritten from their document
    pub hydrated: usize,
    /// Groups whose row disappeared between steps 1 and 4
    pub missing: Vec<String>,
    /// Groups whose document failed to parse
    pub undecodable: Vec<String>,
}

impl std::fmt::Display for ReconcileStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Group Reconciliation:")?;
        writeln!(f, "  Hydrated: {}", self.hydrated)?;
        writeln!(f, "  Created: {}", self.created.len())?;
        writeln!(f, "  Removed: {}", self.removed.len())?;
        writeln!(f, "  Missing: {}", self.missing.len())?;
        writeln!(f, "  Undecodable: {}", self.undecodable.len())
    }
}
