// gatewarden-orchestrator/src/consistency.rs
// ============================================================================
// Module: Consistency Guard
// Description: Verifies that a claimed artifact ID exists in the WORM store
//              and is bound to the right instance before any transition
//              that depends on it is allowed to proceed (C12).
// Purpose: Catch a phantom write — a state transition claiming evidence
//          that was never durably committed, or committed for a different
//          instance — before it can do anything else.
// Dependencies: gatewarden_core::InstanceId, gatewarden_worm::{WormError, WormStore}
// ============================================================================

//! ## Overview
//! [`ensure_state_consistency`] is a noop when no artifact is claimed (the
//! caller is starting fresh, with nothing to check yet). Once an artifact
//! ID is claimed, it must exist in the WORM store and must belong to the
//! instance making the claim; either failure is a
//! [`ConsistencyError::StateAmbiguous`], which callers must treat as
//! fatal rather than retriable.

use gatewarden_core::ArtifactId;
use gatewarden_core::InstanceId;
use gatewarden_worm::WormError;
use gatewarden_worm::WormStore;

/// Errors raised while checking state consistency.
#[derive(Debug, thiserror::Error)]
pub enum ConsistencyError {
    /// `artifact_id` was claimed but either does not exist in the WORM
    /// store or is bound to a different instance. A critical disconnect
    /// between execution state and evidence — typically a phantom write
    /// or a replay attack.
    #[error("CRITICAL: state ambiguity detected for instance {instance_id}: {reason}")]
    StateAmbiguous {
        /// The instance making the claim.
        instance_id: String,
        /// Why the claim is ambiguous.
        reason: String,
    },
    /// The WORM store could not be queried for a reason other than
    /// "not found". Treated as fail-closed by the caller.
    #[error("consistency check could not reach the worm store: {0}")]
    Worm(WormError),
}

/// Verifies that `artifact_id`, if non-empty, exists in `worm` and is
/// bound to `instance_id`. A noop when `artifact_id` is empty (e.g. the
/// genesis transition, where no artifact is claimed yet).
///
/// # Errors
/// Returns [`ConsistencyError::StateAmbiguous`] if the artifact is missing
/// or bound to a different instance, or [`ConsistencyError::Worm`] if the
/// store cannot be queried at all.
pub fn ensure_state_consistency(
    worm: &dyn WormStore,
    instance_id: &InstanceId,
    artifact_id: &ArtifactId,
) -> Result<(), ConsistencyError> {
    if artifact_id.is_empty() {
        return Ok(());
    }

    let artifact = match worm.get(artifact_id) {
        Ok(artifact) => artifact,
        Err(WormError::NotFound(id)) => {
            return Err(ConsistencyError::StateAmbiguous {
                instance_id: instance_id.to_string(),
                reason: format!("artifact {id} not found"),
            });
        }
        Err(other) => return Err(ConsistencyError::Worm(other)),
    };

    if artifact.instance_id != *instance_id {
        return Err(ConsistencyError::StateAmbiguous {
            instance_id: instance_id.to_string(),
            reason: "artifact is bound to a different instance".to_owned(),
        });
    }

    Ok(())
}
