// gatewarden-core/src/lib.rs
// ============================================================================
// Module: gatewarden-core
// Description: Pure domain logic for the HITL orchestration and audit
//              control plane: canonicalization, the artifact model, the
//              state machine, the chain verifier, and policy evaluation.
// Purpose: Hold every rule that must behave identically whether invoked
//          from an HTTP handler, a workflow replay, or an offline CLI
//          verification pass — no I/O, no wall-clock reads, no randomness.
// Dependencies: crate::core::*
// ============================================================================

//! ## Overview
//! `gatewarden-core` is the audit-grade heart of the system: everything in
//! here is a pure function or an immutable value type. Persistence (WORM
//! store, instance store), orchestration (durable workflow, replay guard),
//! and transport (HTTP API) all live in separate crates that depend on
//! this one, never the other way around.
//!
//! Security posture: canonicalization rejects non-finite floats rather
//! than silently coercing them, the state machine rejects any transition
//! outside its matrix, and the policy wrapper fails closed on any
//! ambiguity. None of that behavior is reachable or overridable from
//! outside this crate.

/// Pure, I/O-free domain logic: canonicalization, identifiers, the data
/// model, the state machine, the artifact model, the chain verifier, and
/// policy evaluation.
pub mod core;

pub use core::artifact::ArtifactError;
pub use core::artifact::CommitmentArtifact;
pub use core::artifact::NewArtifact;
pub use core::canon::CanonError;
pub use core::canon::Value;
pub use core::canon::to_canonical_value;
pub use core::chain::ChainResult;
pub use core::chain::VerificationResult;
pub use core::chain::verify_artifact;
pub use core::chain::verify_chain;
pub use core::hashing::HashAlgorithm;
pub use core::hashing::HashDigest;
pub use core::hashing::HashError;
pub use core::hashing::canonical_json_bytes;
pub use core::hashing::hash_bytes;
pub use core::hashing::hash_canonical_json;
pub use core::hashing::hash_canonical_json_with_limit;
pub use core::identifiers::ActorId;
pub use core::identifiers::ArtifactId;
pub use core::identifiers::DecisionId;
pub use core::identifiers::InstanceId;
pub use core::identifiers::PolicyVersionId;
pub use core::identifiers::WorkflowId;
pub use core::model::AuditEvent;
pub use core::model::DecisionCommand;
pub use core::model::DecisionRecord;
pub use core::model::Instance;
pub use core::model::event_types;
pub use core::policy::DEFAULT_APPROVAL_TIMEOUT_SECONDS;
pub use core::policy::Materiality;
pub use core::policy::Policy;
pub use core::policy::PolicyEvaluation;
pub use core::policy::evaluate;
pub use core::policy::evaluate_fail_closed;
pub use core::state_machine::DecisionType;
pub use core::state_machine::InvalidTransition;
pub use core::state_machine::State;
pub use core::state_machine::transition;
pub use core::time::Timestamp;
