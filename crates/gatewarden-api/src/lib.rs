// gatewarden-api/src/lib.rs
// ============================================================================
// Module: gatewarden-api
// Description: The JSON-over-HTTP transport for the orchestration and audit
//              control plane.
// Purpose: Translate the six routes in the external interface contract into
//          calls against `gatewarden-orchestrator` and
//          `gatewarden-store-sqlite`; carry no business logic of its own.
// Dependencies: axum, gatewarden_core, gatewarden_orchestrator,
//               gatewarden_store_sqlite, gatewarden_worm
// ============================================================================

//! ## Overview
//! `gatewarden-api` is a thin adapter: [`routes::build_router`] wires six
//! HTTP routes to handlers that do nothing but deserialize a request,
//! call into [`state::AppState`]'s store/orchestrator, and serialize the
//! response. `POST /instances` starts a workflow task in the background
//! ([`state::spawn_instance_workflow`]) and returns `202 Accepted`
//! immediately; `POST /instances/{id}/decisions` forwards a signal to that
//! task's channel. Authentication, RBAC, and TLS termination are expected
//! to be handled by an upstream proxy or middleware layer — out of scope
//! here, as in the external interface contract.

/// Error type every route handler returns on failure.
pub mod error;

/// The six HTTP routes and their request/response DTOs.
pub mod routes;

/// Binds a TCP listener and serves the router built by [`routes`].
pub mod serve;

/// Shared handler state: the instance store, decision engine, and the
/// registry of in-flight HITL signal channels.
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use serve::ServeError;
pub use serve::serve;
pub use state::AppState;
