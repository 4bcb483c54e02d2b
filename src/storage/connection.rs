//! Connection lifecycle - the single live connection to the store

use std::path::PathBuf;
use std::time::Duration;
use rusqlite::Connection;
use tracing::{info, warn};
use crate::{Error, Result};
use super::groups::GroupRepository;
use super::schema::TableNames;
use super::tracks::TrackRepository;
use super::upsert;
use super::users::UserRepository;

/// How long a writer waits on another connection's lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn ping(conn: &Connection) -> bool {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok()
}

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Memory,
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: Location,
    pub table_prefix: String,
}

impl StoreConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            table_prefix: String::new(),
        }
    }

    pub fn memory() -> Self {
        Self {
            location: Location::Memory,
            table_prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }
}

/// Owns the one connection every repository borrows.
///
/// There is no reconnect logic: once the connection is gone every data
/// access fails with [`Error::NotConnected`] until [`Database::initialize`]
/// runs again.
pub struct Database {
    location: Location,
    tables: TableNames,
    conn: Option<Connection>,
}

impl Database {
    /// Validate the configuration without connecting
    pub fn new(config: StoreConfig) -> Result<Self> {
        Ok(Self {
            tables: TableNames::with_prefix(&config.table_prefix)?,
            location: config.location,
            conn: None,
        })
    }

    /// Create and initialize in one step
    pub fn open(config: StoreConfig) -> Result<Self> {
        let mut db = Self::new(config)?;
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::open(StoreConfig::memory())
    }

    /// Connect and make sure every table exists.
    ///
    /// Any failure leaves the database disconnected and is returned as
    /// [`Error::Initialization`]; startup should not continue past it.
    pub fn initialize(&mut self) -> Result<()> {
        if self.conn.is_some() {
            warn!("Re-initializing an open database connection");
            self.close()?;
        }

        info!("Establishing {} database connection...", self.describe());
        if let Err(e) = self.connect() {
            if let Err(close_err) = self.close() {
                warn!("Failed to close connection after startup error: {}", close_err);
            }
            return Err(Error::Initialization(Box::new(e)));
        }
        info!("Database startup complete.");
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        let conn = match &self.location {
            Location::File(path) => Connection::open(path)?,
            Location::Memory => Connection::open_in_memory()?,
        };
        conn.busy_timeout(BUSY_TIMEOUT)?;
        self.conn = Some(conn);

        info!("Connection successful! Checking tables...");
        self.setup_tables()
    }

    fn setup_tables(&self) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(Error::NotConnected)?;
        for stmt in self.tables.schema_statements() {
            conn.execute(&stmt, [])?;
        }
        Ok(())
    }

    /// Release the connection. Safe to call repeatedly.
    ///
    /// The handle is cleared even when the driver reports a close failure;
    /// that failure is still returned.
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.close().map_err(|(_conn, e)| Error::Storage(e))
    }

    /// True when a connection is held and answers a trivial query
    pub fn is_connected(&self) -> bool {
        self.conn.as_ref().is_some_and(ping)
    }

    /// Guard run before every data access
    fn check_connection(&self) -> Result<&Connection> {
        match &self.conn {
            Some(conn) if ping(conn) => Ok(conn),
            _ => Err(Error::NotConnected),
        }
    }

    pub fn users(&self) -> Result<UserRepository<'_>> {
        Ok(UserRepository::new(self.check_connection()?, &self.tables.users))
    }

    pub fn groups(&self) -> Result<GroupRepository<'_>> {
        Ok(GroupRepository::new(self.check_connection()?, &self.tables.groups))
    }

    pub fn tracks(&self) -> Result<TrackRepository<'_>> {
        Ok(TrackRepository::new(self.check_connection()?, &self.tables.tracks))
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.check_connection()?;
        Ok(StoreStats {
            users: upsert::count(conn, &self.tables.users)?,
            groups: upsert::count(conn, &self.tables.groups)?,
            tracks: upsert::count(conn, &self.tables.tracks)?,
        })
    }

    fn describe(&self) -> String {
        match &self.location {
            Location::File(path) => format!("SQLite ({})", path.display()),
            Location::Memory => "SQLite (in-memory)".to_string(),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub users: usize,
    pub groups: usize,
    pub tracks: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Users: {}", self.users)?;
        writeln!(f, "  Groups: {}", self.groups)?;
        writeln!(f, "  Tracks: {}", self.tracks)
    }
}
