//! Persistence layer modules.

pub mod alert_repo;
pub mod cache_store;
pub mod db;
pub mod history_repo;
pub mod retention;
pub mod schema;
pub mod snapshot_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;
