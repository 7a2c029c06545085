// gatewarden-orchestrator/src/decision.rs
// ============================================================================
// Module: Decision Engine
// Description: Validates and records one HITL decision against an instance
//              that is currently waiting for a human (C8).
// Purpose: Enforce the HITL invariants in one place: only instances in
//          WAITING_FOR_HUMAN may be decided, APPROVE/OVERRIDE require a
//          justification, OVERRIDE requires a context delta, and the
//          Privacy Wall keeps a supplied evidence hash from ever being
//          replaced by (or logged alongside) the raw context snapshot.
// Dependencies: gatewarden_core, gatewarden_store_sqlite, crate::emitter
// ============================================================================

//! ## Overview
//! [`DecisionEngine::record`] is the only path a human or system decision
//! takes to become a durable state transition: it validates the command,
//! computes the context hash, emits the commitment artifact (C4), and only
//! then asks the instance store to record the decision. The artifact is
//! durable before the instance row changes, honoring the emit-then-persist
//! ordering invariant.

use std::sync::Arc;

use gatewarden_core::DecisionCommand;
use gatewarden_core::DecisionType;
use gatewarden_core::HashError;
use gatewarden_core::Instance;
use gatewarden_core::NewArtifact;
use gatewarden_core::State;
use gatewarden_core::Timestamp;
use gatewarden_core::Value;
use gatewarden_core::hash_canonical_json;
use gatewarden_store_sqlite::SqliteInstanceStore;
use gatewarden_store_sqlite::StoreError;

use crate::emitter::ArtifactEmitter;
use crate::emitter::EmitError;

/// Errors raised while validating or recording a decision.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    /// The instance is not currently waiting for a human decision.
    #[error("instance {instance_id} is not waiting for a human decision (state: {actual})")]
    NotWaitingForHuman {
        /// The instance the decision targeted.
        instance_id: String,
        /// The instance's actual current state.
        actual: State,
    },
    /// `actor_id` was empty.
    #[error("decision actor_id must not be empty")]
    MissingActor,
    /// `APPROVE`/`OVERRIDE` was recorded without a justification.
    #[error("{0} requires a non-empty justification")]
    MissingJustification(DecisionType),
    /// `OVERRIDE` was recorded without a non-empty context delta.
    #[error("OVERRIDE requires a non-empty context_delta")]
    MissingContextDelta,
    /// The context snapshot could not be hashed.
    #[error("failed to hash context snapshot: {0}")]
    ContextHash(#[from] HashError),
    /// The commitment artifact could not be emitted.
    #[error("failed to emit artifact: {0}")]
    Emit(#[from] EmitError),
    /// The instance store rejected the command.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Validates and records HITL decisions.
pub struct DecisionEngine {
    /// The transactional instance/decision/audit-event store.
    store: Arc<SqliteInstanceStore>,
    /// The shared artifact emitter (C4).
    emitter: ArtifactEmitter,
}

impl DecisionEngine {
    /// Builds a decision engine over `store` and `emitter`.
    #[must_use]
    pub fn new(store: Arc<SqliteInstanceStore>, emitter: ArtifactEmitter) -> Self {
        Self { store, emitter }
    }

    /// Validates `cmd` against the instance it targets, emits a commitment
    /// artifact, and records the decision. Returns the updated instance.
    ///
    /// # Errors
    /// Returns [`DecisionError::NotWaitingForHuman`] if the instance is not
    /// paused, [`DecisionError::MissingActor`]/[`DecisionError::MissingJustification`]/
    /// [`DecisionError::MissingContextDelta`] on a violated HITL invariant,
    /// [`DecisionError::ContextHash`] if the context cannot be hashed,
    /// [`DecisionError::Emit`] if the artifact cannot be emitted, or
    /// [`DecisionError::Store`] if persistence fails.
    pub fn record(&self, mut cmd: DecisionCommand, now: Timestamp) -> Result<Instance, DecisionError> {
        let instance = self.store.get_instance(&cmd.instance_id)?;

        if instance.state != State::WaitingForHuman {
            return Err(DecisionError::NotWaitingForHuman {
                instance_id: instance.id.to_string(),
                actual: instance.state,
            });
        }

        if cmd.actor_id.is_empty() {
            return Err(DecisionError::MissingActor);
        }

        if matches!(cmd.decision_type, DecisionType::Approve | DecisionType::Override)
            && !cmd.has_justification()
        {
            return Err(DecisionError::MissingJustification(cmd.decision_type));
        }

        if cmd.decision_type == DecisionType::Override && !cmd.has_context_delta() {
            return Err(DecisionError::MissingContextDelta);
        }

        // Privacy Wall: an evidence hash, if supplied, is used verbatim and
        // the raw context snapshot is never touched, logged, or hashed in
        // this branch.
        let context_hash = match &cmd.evidence_hash {
            Some(hash) => hash.clone(),
            None => {
                let snapshot = cmd.context_snapshot.clone().unwrap_or(Value::Null);
                hash_canonical_json(&snapshot)?.as_hex().to_owned()
            }
        };

        let next_state = cmd.decision_type.next_state();

        let artifact = self.emitter.emit(NewArtifact {
            instance_id: instance.id.clone(),
            prev_artifact_hash: instance.last_artifact_hash.clone(),
            authority_state: next_state,
            policy_version_id: cmd.policy_version_id.clone(),
            context_hash,
            human_actor_id: cmd.actor_id.to_string(),
            timestamp: now,
        })?;

        cmd.new_artifact_hash = Some(artifact.artifact_id.clone());

        Ok(self.store.record_decision(&cmd, next_state, now)?)
    }
}

#[cfg(test)]
mod tests {
    use gatewarden_core::ActorId;
    use gatewarden_core::InstanceId;
    use gatewarden_core::PolicyVersionId;
    use gatewarden_core::WorkflowId;
    use gatewarden_worm::MemWormStore;

    use super::*;

    fn ts(secs: i64) -> Timestamp {
        #[allow(clippy::unwrap_used, reason = "test fixture, input is a fixed literal")]
        let raw = time::OffsetDateTime::from_unix_timestamp(secs).unwrap();
        Timestamp::from_offset_date_time(raw)
    }

    fn engine() -> (Arc<SqliteInstanceStore>, DecisionEngine) {
        let store = Arc::new(SqliteInstanceStore::open_in_memory().expect("open"));
        let worm = Arc::new(MemWormStore::new());
        let emitter = ArtifactEmitter::new(worm);
        let engine = DecisionEngine::new(store.clone(), emitter);
        (store, engine)
    }

    fn waiting_instance(store: &SqliteInstanceStore, id: &str) {
        let instance = Instance {
            id: InstanceId::new(id),
            workflow_id: WorkflowId::new("wf-1"),
            state: State::Created,
            trigger_context: Value::Null,
            policy_context: Value::Null,
            policy_version_id: PolicyVersionId::new("policy-v1"),
            last_artifact_hash: gatewarden_core::ArtifactId::genesis(),
            created_at: ts(1_000),
            updated_at: ts(1_000),
        };
        store.create_instance(&instance).expect("create");
        store
            .transition_state(&instance.id, State::Running, ts(1_001))
            .expect("running");
        store
            .transition_state(&instance.id, State::WaitingForHuman, ts(1_002))
            .expect("waiting");
    }

    fn base_cmd(id: &str) -> DecisionCommand {
        DecisionCommand {
            instance_id: InstanceId::new(id),
            decision_type: DecisionType::Approve,
            actor_id: ActorId::new("human-1"),
            role: "HUMAN".to_owned(),
            justification: "approved after review".to_owned(),
            context_snapshot: None,
            context_delta: None,
            policy_version_id: PolicyVersionId::new("policy-v1"),
            evidence_hash: Some("a".repeat(64)),
            new_artifact_hash: None,
        }
    }

    #[test]
    fn approve_records_decision_and_advances_state() {
        let (store, engine) = engine();
        waiting_instance(&store, "inst-1");

        let updated = engine.record(base_cmd("inst-1"), ts(1_003)).expect("record");
        assert_eq!(updated.state, State::Approved);
        assert_ne!(updated.last_artifact_hash, gatewarden_core::ArtifactId::genesis());
    }

    #[test]
    fn reject_does_not_require_justification() {
        let (store, engine) = engine();
        waiting_instance(&store, "inst-2");

        let mut cmd = base_cmd("inst-2");
        cmd.decision_type = DecisionType::Reject;
        cmd.justification = String::new();
        cmd.actor_id = ActorId::new("SYSTEM");

        let updated = engine.record(cmd, ts(1_003)).expect("record");
        assert_eq!(updated.state, State::Rejected);
    }

    #[test]
    fn override_without_context_delta_is_rejected() {
        let (store, engine) = engine();
        waiting_instance(&store, "inst-3");

        let mut cmd = base_cmd("inst-3");
        cmd.decision_type = DecisionType::Override;
        cmd.context_delta = None;

        let err = engine.record(cmd, ts(1_003)).unwrap_err();
        assert!(matches!(err, DecisionError::MissingContextDelta));
    }

    #[test]
    fn override_with_context_delta_succeeds() {
        let (store, engine) = engine();
        waiting_instance(&store, "inst-4");

        let mut cmd = base_cmd("inst-4");
        cmd.decision_type = DecisionType::Override;
        cmd.context_delta = Some(Value::Object(
            [("note".to_owned(), Value::String("manual override".to_owned()))]
                .into_iter()
                .collect(),
        ));

        let updated = engine.record(cmd, ts(1_003)).expect("record");
        assert_eq!(updated.state, State::Overridden);
    }

    #[test]
    fn approve_without_justification_is_rejected() {
        let (store, engine) = engine();
        waiting_instance(&store, "inst-5");

        let mut cmd = base_cmd("inst-5");
        cmd.justification = "   ".to_owned();

        let err = engine.record(cmd, ts(1_003)).unwrap_err();
        assert!(matches!(err, DecisionError::MissingJustification(_)));
    }

    #[test]
    fn decision_on_non_waiting_instance_is_rejected() {
        let store = Arc::new(SqliteInstanceStore::open_in_memory().expect("open"));
        let worm = Arc::new(MemWormStore::new());
        let emitter = ArtifactEmitter::new(worm);
        let engine = DecisionEngine::new(store.clone(), emitter);

        let instance = Instance {
            id: InstanceId::new("inst-6"),
            workflow_id: WorkflowId::new("wf-1"),
            state: State::Created,
            trigger_context: Value::Null,
            policy_context: Value::Null,
            policy_version_id: PolicyVersionId::new("policy-v1"),
            last_artifact_hash: gatewarden_core::ArtifactId::genesis(),
            created_at: ts(1_000),
            updated_at: ts(1_000),
        };
        store.create_instance(&instance).expect("create");

        let err = engine.record(base_cmd("inst-6"), ts(1_001)).unwrap_err();
        assert!(matches!(err, DecisionError::NotWaitingForHuman { .. }));
    }

    #[test]
    fn missing_evidence_hash_falls_back_to_hashing_snapshot() {
        let (store, engine) = engine();
        waiting_instance(&store, "inst-7");

        let mut cmd = base_cmd("inst-7");
        cmd.evidence_hash = None;
        cmd.context_snapshot = Some(Value::Object(
            [("k".to_owned(), Value::String("v".to_owned()))].into_iter().collect(),
        ));

        let updated = engine.record(cmd, ts(1_003)).expect("record");
        assert_eq!(updated.state, State::Approved);
    }
}
