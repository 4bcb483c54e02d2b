//! # Permstore - permission data layer for game servers
//!
//! Persists users, permission groups and promotion tracks to SQLite and
//! rebuilds the in-memory object graph from per-row JSON documents.
//!
//! Permstore provides:
//! - A group registry (arena + name index) and a track registry
//! - A pure document codec with best-effort reference resolution
//! - Per-entity repositories with an atomic probe-then-upsert discipline
//! - A reconciliation pass that prunes registry groups deleted from storage
//! - A single-connection lifecycle manager with fail-fast guards

pub mod privilege;
pub mod user;
pub mod group;
pub mod track;
pub mod registry;
pub mod platform;
pub mod document;
pub mod storage;
pub mod store;
pub mod config;
pub mod output;
pub mod ui;

// Re-exports for convenient access
pub use privilege::Privilege;
pub use user::User;
pub use group::{Group, ServerId};
pub use track::Track;
pub use registry::{Directory, GroupId, GroupRegistry, TrackRegistry};
pub use platform::Platform;
pub use storage::{Database, Location, StoreConfig};
pub use store::PermissionStore;

/// Result type alias for Permstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Permstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation ran while no live connection was held.
    #[error("Database is not connected")]
    NotConnected,

    #[error("Failed to initialize database: {0}")]
    Initialization(#[source] Box<Error>),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Document error: {0}")]
    Document(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid UUID: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Name already registered: {0}")]
    DuplicateName(String),

    #[error("Group cannot inherit itself: {0}")]
    SelfInheritance(String),

    #[error("Unknown group: {0}")]
    UnknownGroup(String),
}

impl Error {
    /// True for contract violations that log-and-continue paths must not swallow.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::NotConnected)
    }
}
