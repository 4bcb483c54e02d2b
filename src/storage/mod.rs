//! Storage Layer - SQLite-backed persistence
//!
//! One row per entity, the entity itself serialized as a JSON document:
//! - {prefix}users(uuid, name, data)
//! - {prefix}groups(name, data)
//! - {prefix}tracks(name, data)

pub mod schema;
pub mod connection;
pub mod upsert;
pub mod users;
pub mod groups;
pub mod tracks;

pub use connection::{Database, Location, StoreConfig, StoreStats};
pub use groups::{GroupRepository, ReconcileStats};
pub use schema::TableNames;
pub use tracks::TrackRepository;
pub use upsert::UpsertOutcome;
pub use users::UserRepository;
