// gatewarden-core/src/core/model.rs
// ============================================================================
// Module: Instance & Decision Model
// Description: The Instance, AuditEvent, and DecisionCommand shapes shared
//              by the store (C6) and decision engine (C8).
// Purpose: One place where the data model in the specification's data
//          model section is defined as plain Rust types.
// Dependencies: crate::core::{canon::Value, identifiers, state_machine, time}
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::canon::Value;
use crate::core::identifiers::ActorId;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::DecisionId;
use crate::core::identifiers::InstanceId;
use crate::core::identifiers::PolicyVersionId;
use crate::core::identifiers::WorkflowId;
use crate::core::state_machine::DecisionType;
use crate::core::state_machine::State;
use crate::core::time::Timestamp;

/// One execution run.
///
/// # Invariants
/// - `state` is always a member of the canonical state set.
/// - `last_artifact_hash` is empty iff no authority transition has been
///   committed yet.
/// - Once `state.is_terminal()`, no further transition may be applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Stable opaque identifier; also the durable workflow ID.
    pub id: InstanceId,
    /// The workflow definition driving this instance.
    pub workflow_id: WorkflowId,
    /// The current canonical state.
    pub state: State,
    /// Opaque trigger context supplied at creation.
    pub trigger_context: Value,
    /// Snapshot of the policy evaluation result.
    pub policy_context: Value,
    /// The policy version evaluated for this instance.
    pub policy_version_id: PolicyVersionId,
    /// The most recently committed artifact's ID, or empty if none yet.
    pub last_artifact_hash: ArtifactId,
    /// When this instance was created.
    pub created_at: Timestamp,
    /// When this instance was last updated.
    pub updated_at: Timestamp,
}

/// An observable trail entry derived from state changes and decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// This event's identifier.
    pub id: String,
    /// The instance this event belongs to.
    pub instance_id: InstanceId,
    /// A short, stable event type tag (e.g. `"INSTANCE_CREATED"`).
    pub event_type: String,
    /// Opaque event payload.
    pub payload: Value,
    /// When this event was recorded.
    pub timestamp: Timestamp,
}

/// Well-known audit event type tags.
pub mod event_types {
    /// Emitted once when an instance is created.
    pub const INSTANCE_CREATED: &str = "INSTANCE_CREATED";
    /// Emitted once a decision has been recorded and the instance updated.
    pub const DECISION_RECORDED: &str = "DECISION_RECORDED";
    /// Emitted for an automatic, policy-driven state transition that is
    /// not itself a recorded decision (e.g. `CREATED -> RUNNING`).
    pub const STATE_TRANSITIONED: &str = "STATE_TRANSITIONED";
}

/// Inputs for one human/machine decision, before the artifact's ID has
/// been computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionCommand {
    /// The instance this decision applies to.
    pub instance_id: InstanceId,
    /// The kind of decision being recorded.
    pub decision_type: DecisionType,
    /// The actor recording this decision.
    pub actor_id: ActorId,
    /// The actor's role (e.g. `"HUMAN"`, `"SYSTEM"`).
    pub role: String,
    /// Why this decision was made.
    pub justification: String,
    /// Full context snapshot, omitted when `evidence_hash` is supplied.
    pub context_snapshot: Option<Value>,
    /// The change applied to the context by an `OVERRIDE` decision.
    pub context_delta: Option<Value>,
    /// The policy version in effect when this decision was recorded.
    pub policy_version_id: PolicyVersionId,
    /// A pre-computed hash standing in for `context_snapshot` (Privacy
    /// Wall): when present, the control plane never sees the raw context.
    pub evidence_hash: Option<String>,
    /// Filled in by the emitter (C4) before persistence.
    pub new_artifact_hash: Option<ArtifactId>,
}

impl DecisionCommand {
    /// Returns true if `justification`, after trimming whitespace, is
    /// non-empty.
    #[must_use]
    pub fn has_justification(&self) -> bool {
        !self.justification.trim().is_empty()
    }

    /// Returns true if `context_delta` is present and not an empty object.
    #[must_use]
    pub fn has_context_delta(&self) -> bool {
        match &self.context_delta {
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
            None => false,
        }
    }
}

/// A stored decision row, as persisted by the instance store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// This decision's identifier.
    pub id: DecisionId,
    /// The instance this decision applies to.
    pub instance_id: InstanceId,
    /// The kind of decision recorded.
    pub decision_type: DecisionType,
    /// The actor that recorded this decision.
    pub actor_id: ActorId,
    /// The state the instance was in before this decision.
    pub from_state: State,
    /// The state the instance transitioned to.
    pub to_state: State,
    /// The artifact sealed for this decision.
    pub artifact_id: ArtifactId,
    /// When this decision was recorded.
    pub timestamp: Timestamp,
}
