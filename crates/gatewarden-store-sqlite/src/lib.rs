// gatewarden-store-sqlite/src/lib.rs
// ============================================================================
// Module: gatewarden-store-sqlite
// Description: SQLite-backed implementation of the Instance Store (C6).
// Purpose: Give instances, decisions, and audit events ACID persistence
//          without requiring an external database service.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! This crate is the only place in the workspace that talks to SQLite.
//! Everything it stores is plain data defined in `gatewarden-core`; this
//! crate adds durability, not domain rules.

/// The SQLite-backed `SqliteInstanceStore` and its configuration.
mod store;

pub use store::DEFAULT_BUSY_TIMEOUT_MS;
pub use store::SCHEMA_VERSION;
pub use store::SqliteInstanceStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreMode;
pub use store::StoreError;
pub use store::display_path;
