//! Storage implementations
//!
//! - `memory/` - in-memory document store (default)
//! - `sqlite/` - SQLite-backed document store (requires `sqlite` feature)
//! - `mock/` - memory stores with injectable failures

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod memory;
pub mod mock;
