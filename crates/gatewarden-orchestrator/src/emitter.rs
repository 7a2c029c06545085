// gatewarden-orchestrator/src/emitter.rs
// ============================================================================
// Module: Artifact Emitter
// Description: Seals a new commitment artifact and durably writes it to the
//              WORM store before any caller is allowed to persist a state
//              change that depends on it (C4).
// Purpose: Give every authority transition a single, reusable seal-then-
//          write path so no caller can accidentally persist state ahead of
//          evidence.
// Dependencies: gatewarden_core::{ArtifactError, NewArtifact, CommitmentArtifact},
//               gatewarden_worm::{WormError, WormStore}
// ============================================================================

//! ## Overview
//! [`ArtifactEmitter::emit`] is the only place in this workspace that calls
//! [`gatewarden_core::NewArtifact::seal`] and [`gatewarden_worm::WormStore::write`]
//! back to back. Every caller that needs a new commitment artifact — the
//! decision engine, the workflow's automatic transitions — goes through
//! here, so the emit-then-persist ordering invariant only has to be
//! enforced in one place.

use std::sync::Arc;

use gatewarden_core::ArtifactError;
use gatewarden_core::CommitmentArtifact;
use gatewarden_core::NewArtifact;
use gatewarden_worm::WormError;
use gatewarden_worm::WormStore;

/// Errors raised while emitting a commitment artifact.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The artifact could not be sealed (missing field or hashing failure).
    #[error("failed to seal artifact: {0}")]
    Seal(#[from] ArtifactError),
    /// The sealed artifact could not be durably written.
    #[error("failed to write artifact to worm store: {0}")]
    Worm(#[from] WormError),
}

/// Seals and durably writes commitment artifacts against a shared WORM
/// store.
pub struct ArtifactEmitter {
    /// The durable store every sealed artifact is written to.
    worm: Arc<dyn WormStore>,
}

impl ArtifactEmitter {
    /// Builds an emitter backed by `worm`.
    #[must_use]
    pub fn new(worm: Arc<dyn WormStore>) -> Self {
        Self { worm }
    }

    /// Seals `new_artifact` and writes it to the WORM store. Returns the
    /// sealed artifact only once it is durable; callers must not persist
    /// any state that depends on this artifact before this call returns.
    ///
    /// # Errors
    /// Returns [`EmitError::Seal`] if a required field is empty, or
    /// [`EmitError::Worm`] if the write fails (including a collision with
    /// an already-written artifact of the same ID).
    pub fn emit(&self, new_artifact: NewArtifact) -> Result<CommitmentArtifact, EmitError> {
        let artifact = new_artifact.seal()?;
        self.worm.write(&artifact)?;
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use gatewarden_core::ArtifactId;
    use gatewarden_core::InstanceId;
    use gatewarden_core::PolicyVersionId;
    use gatewarden_core::State;
    use gatewarden_core::Timestamp;
    use gatewarden_worm::MemWormStore;

    use super::*;

    fn ts() -> Timestamp {
        #[allow(clippy::unwrap_used, reason = "test fixture, input is a fixed literal")]
        let raw = time::OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        Timestamp::from_offset_date_time(raw)
    }

    fn new_artifact() -> NewArtifact {
        NewArtifact {
            instance_id: InstanceId::new("inst-1"),
            prev_artifact_hash: ArtifactId::genesis(),
            authority_state: State::Running,
            policy_version_id: PolicyVersionId::new("policy-v1"),
            context_hash: "deadbeef".to_owned(),
            human_actor_id: "SYSTEM".to_owned(),
            timestamp: ts(),
        }
    }

    #[test]
    fn emit_writes_a_durable_artifact() {
        let worm = Arc::new(MemWormStore::new());
        let emitter = ArtifactEmitter::new(worm.clone());

        let artifact = emitter.emit(new_artifact()).expect("emit");
        let fetched = worm.get(&artifact.artifact_id).expect("fetch");
        assert_eq!(fetched, artifact);
    }

    #[test]
    fn emit_rejects_missing_instance_id() {
        let worm = Arc::new(MemWormStore::new());
        let emitter = ArtifactEmitter::new(worm);

        let mut input = new_artifact();
        input.instance_id = InstanceId::new("");
        let err = emitter.emit(input).unwrap_err();
        assert!(matches!(err, EmitError::Seal(_)));
    }

    #[test]
    fn emit_surfaces_worm_collision() {
        let worm = Arc::new(MemWormStore::new());
        let emitter = ArtifactEmitter::new(worm);

        let first = emitter.emit(new_artifact()).expect("first emit");
        // Same inputs, same timestamp -> same seal -> same ID -> collision.
        let mut second_input = new_artifact();
        second_input.timestamp = first.timestamp;
        let err = emitter.emit(second_input).unwrap_err();
        assert!(matches!(err, EmitError::Worm(WormError::AlreadyExists(_))));
    }
}
