// gatewarden-core/src/core/mod.rs
// ============================================================================
// Module: Core
// Description: Pure, I/O-free domain logic shared by every other crate.
// ============================================================================

pub mod artifact;
pub mod canon;
/// The `serde::Serializer` that drives canonicalization.
mod canon_ser;
/// `serde::Serialize`/`Deserialize` for `canon::Value` itself.
mod canon_serde;
pub mod chain;
pub mod hashing;
pub mod identifiers;
pub mod model;
pub mod policy;
pub mod state_machine;
pub mod time;
