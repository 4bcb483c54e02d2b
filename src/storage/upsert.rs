//! Probe-then-write upsert shared by every repository
//!
//! `PROBE -> {EXISTS -> UPDATE, ABSENT -> INSERT} -> DONE`, run inside one
//! IMMEDIATE transaction. The write lock is taken before the probe, so a
//! second writer on another connection waits out the busy timeout and then
//! sees the committed row instead of failing mid-upsert.

use rusqlite::{Connection, OptionalExtension, ToSql, Transaction, TransactionBehavior};
use crate::Result;

/// Which branch an upsert took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// The three statements of one upsert, all keyed on the same column.
#[derive(Debug, Clone)]
pub(crate) struct UpsertSql {
    pub probe: String,
    pub update: String,
    pub insert: String,
}

impl UpsertSql {
    /// Statements for a `(key, data)` table
    pub fn keyed_document(table: &str, key_column: &str) -> Self {
        Self {
            probe: format!("SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1", table, key_column),
            update: format!("UPDATE {} SET data = ?1 WHERE {} = ?2", table, key_column),
            insert: format!("INSERT INTO {} ({}, data) VALUES (?1, ?2)", table, key_column),
        }
    }
}

pub(crate) fn upsert(
    conn: &Connection,
    sql: &UpsertSql,
    key: &str,
    update_params: &[&dyn ToSql],
    insert_params: &[&dyn ToSql],
) -> Result<UpsertOutcome> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let exists = tx
        .query_row(&sql.probe, [key], |_| Ok(()))
        .optional()?
        .is_some();

    let outcome = if exists {
        tx.execute(&sql.update, update_params)?;
        UpsertOutcome::Updated
    } else {
        tx.execute(&sql.insert, insert_params)?;
        UpsertOutcome::Inserted
    };

    tx.commit()?;
    Ok(outcome)
}

/// Delete the row with the given key. Returns whether a row was removed.
pub(crate) fn delete(conn: &Connection, table: &str, key_column: &str, key: &str) -> Result<bool> {
    let removed = conn.execute(
        &format!("DELETE FROM {} WHERE {} = ?1", table, key_column),
        [key],
    )?;
    Ok(removed > 0)
}

/// Row count of a table
pub(crate) fn count(conn: &Connection, table: &str) -> Result<usize> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn table() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE things (name TEXT PRIMARY KEY, data TEXT NOT NULL)", [])
            .unwrap();
        conn
    }

    #[test]
    fn test_insert_then_update() {
        let conn = table();
        let sql = UpsertSql::keyed_document("things", "name");

        let first = upsert(&conn, &sql, "a", params!["1", "a"], params!["a", "1"]).unwrap();
        assert_eq!(first, UpsertOutcome::Inserted);

        let second = upsert(&conn, &sql, "a", params!["2", "a"], params!["a", "2"]).unwrap();
        assert_eq!(second, UpsertOutcome::Updated);

        assert_eq!(count(&conn, "things").unwrap(), 1);
        let data: String = conn
            .query_row("SELECT data FROM things WHERE name = 'a'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(data, "2");
    }

    #[test]
    fn test_failed_insert_leaves_table_unchanged() {
        let conn = table();
        let sql = UpsertSql {
            probe: "SELECT 1 FROM things WHERE name = ?1".to_string(),
            update: "UPDATE things SET data = ?1 WHERE name = ?2".to_string(),
            insert: "INSERT INTO missing_table (name, data) VALUES (?1, ?2)".to_string(),
        };

        assert!(upsert(&conn, &sql, "a", params!["1", "a"], params!["a", "1"]).is_err());
        assert_eq!(count(&conn, "things").unwrap(), 0);
        // the failed transaction was rolled back on drop
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_concurrent_writer_waits_for_lock() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("things.db");
        let first = Connection::open(&path).unwrap();
        first
            .execute("CREATE TABLE things (name TEXT PRIMARY KEY, data TEXT NOT NULL)", [])
            .unwrap();
        let second = Connection::open(&path).unwrap();
        second.busy_timeout(Duration::from_secs(10)).unwrap();
        let sql = UpsertSql::keyed_document("things", "name");

        // hold the write lock across the probe, as a racing upsert would
        let tx = Transaction::new_unchecked(&first, TransactionBehavior::Immediate).unwrap();
        let exists = tx
            .query_row(&sql.probe, ["k"], |_| Ok(()))
            .optional()
            .unwrap()
            .is_some();
        assert!(!exists);

        let writer = {
            let sql = sql.clone();
            thread::spawn(move || upsert(&second, &sql, "k", params!["2", "k"], params!["k", "2"]))
        };
        thread::sleep(Duration::from_millis(200));

        tx.execute(&sql.insert, params!["k", "1"]).unwrap();
        tx.commit().unwrap();

        let outcome = writer.join().unwrap().unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(count(&first, "things").unwrap(), 1);
        let data: String = first
            .query_row("SELECT data FROM things WHERE name = 'k'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(data, "2");
    }

    #[test]
    fn test_delete_reports_removal() {
        let conn = table();
        conn.execute("INSERT INTO things (name, data) VALUES ('a', '{}')", []).unwrap();

        assert!(delete(&conn, "things", "name", "a").unwrap());
        assert!(!delete(&conn, "things", "name", "a").unwrap());
    }
}
