//! storage-adapters
//!
//! Concrete implementations of the `domains` ports. Each backend sits
//! behind a cargo feature so binaries compile only what they ship.

#[cfg(feature = "db-sqlite")]
pub mod sqlite;

#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteStore;
