//! User repository - point lookups by UUID or name, upsert by UUID

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};
use uuid::Uuid;
use crate::document::{self, UserDocument};
use crate::registry::GroupRegistry;
use crate::user::User;
use crate::Result;
use super::upsert::{self, UpsertOutcome, UpsertSql};

/// Raw `users` row
struct UserRow {
    uuid: String,
    name: String,
    data: String,
}

pub struct UserRepository<'a> {
    conn: &'a Connection,
    table: &'a str,
}

impl<'a> UserRepository<'a> {
    pub(crate) fn new(conn: &'a Connection, table: &'a str) -> Self {
        Self { conn, table }
    }

    /// Look a user up by UUID.
    ///
    /// A missing row, a storage error and an undecodable document all
    /// yield `None`; the latter two are logged.
    pub fn load(&self, uuid: Uuid, groups: &GroupRegistry) -> Option<User> {
        self.load_by("uuid", &uuid.hyphenated().to_string(), groups)
    }

    /// Look a user up by display name. Same error policy as [`Self::load`].
    pub fn load_by_name(&self, name: &str, groups: &GroupRegistry) -> Option<User> {
        self.load_by("name", name, groups)
    }

    fn load_by(&self, column: &str, key: &str, groups: &GroupRegistry) -> Option<User> {
        let row = match self.fetch(column, key) {
            Ok(Some(row)) => row,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to query user {} = {}: {}", column, key, e);
                return None;
            }
        };

        match Self::decode(&row, groups) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Ignoring user {} with unreadable data: {}", row.uuid, e);
                None
            }
        }
    }

    fn fetch(&self, column: &str, key: &str) -> Result<Option<UserRow>> {
        let sql = format!(
            "SELECT uuid, name, data FROM {} WHERE {} = ?1 LIMIT 1",
            self.table, column
        );
        let row = self
            .conn
            .query_row(&sql, [key], |row| {
                Ok(UserRow {
                    uuid: row.get(0)?,
                    name: row.get(1)?,
                    data: row.get(2)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    fn decode(row: &UserRow, groups: &GroupRegistry) -> Result<User> {
        let uuid = Uuid::parse_str(&row.uuid)?;
        let doc: UserDocument = document::from_json(&row.data)?;
        Ok(document::decode_user(uuid, &row.name, &doc, groups))
    }

    /// Write the full user snapshot, updating name and document if the UUID exists.
    pub fn save(&self, user: &User, groups: &GroupRegistry) -> Result<UpsertOutcome> {
        self.try_save(user, groups)
            .inspect(|outcome| debug!("Saved user {} ({:?})", user.uuid, outcome))
            .inspect_err(|e| warn!("Failed to save user {}: {}", user.uuid, e))
    }

    fn try_save(&self, user: &User, groups: &GroupRegistry) -> Result<UpsertOutcome> {
        let json = document::to_json(&document::encode_user(user, groups))?;
        let uuid = user.uuid.hyphenated().to_string();

        let sql = UpsertSql {
            probe: format!("SELECT 1 FROM {} WHERE uuid = ?1 LIMIT 1", self.table),
            update: format!("UPDATE {} SET name = ?1, data = ?2 WHERE uuid = ?3", self.table),
            insert: format!("INSERT INTO {} (uuid, name, data) VALUES (?1, ?2, ?3)", self.table),
        };
        upsert::upsert(
            self.conn,
            &sql,
            &uuid,
            params![user.name, json, uuid],
            params![uuid, user.name, json],
        )
    }

    pub fn count(&self) -> Result<usize> {
        upsert::count(self.conn, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::Privilege;
    use crate::storage::Database;

    fn fixture() -> (Database, GroupRegistry) {
        let db = Database::open_in_memory().unwrap();
        let mut groups = GroupRegistry::new();
        groups.insert("default", 0).unwrap();
        groups.insert("Admin", 10).unwrap();
        (db, groups)
    }

    fn sample_user(groups: &GroupRegistry) -> User {
        let mut user = User::new(Uuid::new_v4(), "Steve");
        user.suffix = Some("!".to_string());
        user.grant(Privilege::parse("chat:color:red").unwrap());
        user.add_group(groups.id_of("Admin").unwrap());
        user
    }

    #[test]
    fn test_user_crud() {
        let (db, groups) = fixture();
        let users = db.users().unwrap();
        let user = sample_user(&groups);

        assert_eq!(users.save(&user, &groups).unwrap(), UpsertOutcome::Inserted);

        let by_uuid = users.load(user.uuid, &groups).unwrap();
        assert_eq!(by_uuid, user);

        let by_name = users.load_by_name("Steve", &groups).unwrap();
        assert_eq!(by_name.uuid, user.uuid);
    }

    #[test]
    fn test_missing_user_is_not_found() {
        let (db, groups) = fixture();
        let users = db.users().unwrap();
        assert!(users.load(Uuid::new_v4(), &groups).is_none());
        assert!(users.load_by_name("nobody", &groups).is_none());
    }

    #[test]
    fn test_second_save_updates_in_place() {
        let (db, groups) = fixture();
        let users = db.users().unwrap();
        let mut user = sample_user(&groups);

        users.save(&user, &groups).unwrap();
        user.name = "Steve2".to_string();
        user.super_user = true;
        assert_eq!(users.save(&user, &groups).unwrap(), UpsertOutcome::Updated);

        assert_eq!(users.count().unwrap(), 1);
        let loaded = users.load(user.uuid, &groups).unwrap();
        assert_eq!(loaded.name, "Steve2");
        assert!(loaded.super_user);
        assert!(users.load_by_name("Steve", &groups).is_none());
    }

    #[test]
    fn test_unchanged_resave_keeps_row() {
        let (db, groups) = fixture();
        let users = db.users().unwrap();
        let user = sample_user(&groups);

        users.save(&user, &groups).unwrap();
        let read_data = || -> String {
            db.users()
                .unwrap()
                .conn
                .query_row("SELECT data FROM users", [], |r| r.get(0))
                .unwrap()
        };
        let before = read_data();
        users.save(&user, &groups).unwrap();
        assert_eq!(read_data(), before);
    }

    #[test]
    fn test_unparsable_document_is_not_found() {
        let (db, groups) = fixture();
        let uuid = Uuid::new_v4();
        db.users()
            .unwrap()
            .conn
            .execute(
                "INSERT INTO users (uuid, name, data) VALUES (?1, 'Broken', '{oops')",
                [uuid.to_string()],
            )
            .unwrap();

        assert!(db.users().unwrap().load(uuid, &groups).is_none());
        assert!(db.users().unwrap().load_by_name("Broken", &groups).is_none());
    }

    #[test]
    fn test_ghost_group_is_dropped_on_load() {
        let (db, groups) = fixture();
        let uuid = Uuid::new_v4();
        db.users()
            .unwrap()
            .conn
            .execute(
                "INSERT INTO users (uuid, name, data) VALUES (?1, 'Alex', ?2)",
                params![
                    uuid.to_string(),
                    r#"{"prefix":null,"suffix":null,"super":false,"privileges":[],"groups":["Admin","Ghost"]}"#
                ],
            )
            .unwrap();

        let user = db.users().unwrap().load(uuid, &groups).unwrap();
        assert_eq!(user.groups(), &[groups.id_of("Admin").unwrap()]);
    }
}
