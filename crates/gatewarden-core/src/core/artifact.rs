// gatewarden-core/src/core/artifact.rs
// ============================================================================
// Module: Artifact Model
// Description: The immutable, self-sealed commitment artifact (C2).
// Purpose: Record one authority transition such that its identity is
//          entirely determined by its own canonical payload.
// Dependencies: crate::core::{canon, hashing, identifiers, state_machine, time}
// ============================================================================

//! ## Overview
//! A [`CommitmentArtifact`] is built unsealed (`ArtifactId` empty), then
//! [`CommitmentArtifact::seal`] computes and fixes its ID. Sealing twice on
//! unchanged fields reproduces the same ID; any field mutation after seal
//! invalidates it and must be treated as tampering by callers (the chain
//! verifier, C5, is what actually catches that case).

use serde::Deserialize;
use serde::Serialize;

use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::InstanceId;
use crate::core::identifiers::PolicyVersionId;
use crate::core::state_machine::State;
use crate::core::time::Timestamp;

/// The schema tag for the current artifact shape.
pub const ARTIFACT_VERSION: &str = "v1";

/// An immutable, content-addressed record of one authority transition.
///
/// # Invariants
/// - `artifact_id == SHA256(canonical(self without artifact_id))` once
///   sealed.
/// - `instance_id`, `authority_state`, `context_hash`, and the timestamp
///   are never empty.
/// - In a chain, `prev_artifact_hash` equals the previous artifact's
///   `artifact_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitmentArtifact {
    /// Schema tag, currently always `"v1"`.
    pub artifact_version: String,
    /// The self-seal; empty until [`CommitmentArtifact::seal`] is called.
    pub artifact_id: ArtifactId,
    /// The instance this transition belongs to.
    pub instance_id: InstanceId,
    /// The previous artifact's ID, or empty/genesis sentinel for the first.
    pub prev_artifact_hash: ArtifactId,
    /// The post-decision state.
    pub authority_state: State,
    /// The policy version evaluated for this transition.
    pub policy_version_id: PolicyVersionId,
    /// Hex SHA-256 of the context snapshot, or the supplied evidence hash.
    pub context_hash: String,
    /// The actor that authored this transition (`"SYSTEM"` for timeouts).
    pub human_actor_id: String,
    /// RFC-3339 UTC timestamp at second precision.
    pub timestamp: Timestamp,
}

/// Errors raised while building or sealing an artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// A required field was empty.
    #[error("required artifact field is empty: {0}")]
    MissingField(&'static str),
    /// The canonical payload could not be hashed.
    #[error("failed to hash canonical payload: {0}")]
    Hashing(#[from] HashError),
}

/// The fields used to build a new, unsealed artifact. Kept distinct from
/// [`CommitmentArtifact`] so an unsealed artifact is never accidentally
/// treated as a durable record.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    /// The instance this transition belongs to.
    pub instance_id: InstanceId,
    /// The previous artifact's ID, or empty/genesis for the first.
    pub prev_artifact_hash: ArtifactId,
    /// The post-decision state.
    pub authority_state: State,
    /// The policy version evaluated for this transition.
    pub policy_version_id: PolicyVersionId,
    /// Hex SHA-256 of the context snapshot, or the supplied evidence hash.
    pub context_hash: String,
    /// The actor that authored this transition.
    pub human_actor_id: String,
    /// RFC-3339 UTC timestamp at second precision.
    pub timestamp: Timestamp,
}

/// The payload hashed to produce an artifact's ID: every field except
/// `artifact_id` itself.
#[derive(Serialize)]
struct SealPayload<'a> {
    artifact_version: &'a str,
    instance_id: &'a InstanceId,
    prev_artifact_hash: &'a ArtifactId,
    authority_state: State,
    policy_version_id: &'a PolicyVersionId,
    context_hash: &'a str,
    human_actor_id: &'a str,
    timestamp: Timestamp,
}

impl NewArtifact {
    /// Validates fail-closed invariants and seals the artifact, computing
    /// its `artifact_id` from the canonical payload.
    ///
    /// # Errors
    /// Returns [`ArtifactError::MissingField`] if `instance_id`,
    /// `context_hash`, or `human_actor_id` is empty, or
    /// [`ArtifactError::Hashing`] if the payload cannot be canonicalized.
    pub fn seal(self) -> Result<CommitmentArtifact, ArtifactError> {
        if self.instance_id.is_empty() {
            return Err(ArtifactError::MissingField("instance_id"));
        }
        if self.context_hash.trim().is_empty() {
            return Err(ArtifactError::MissingField("context_hash"));
        }
        if self.human_actor_id.trim().is_empty() {
            return Err(ArtifactError::MissingField("human_actor_id"));
        }

        let payload = SealPayload {
            artifact_version: ARTIFACT_VERSION,
            instance_id: &self.instance_id,
            prev_artifact_hash: &self.prev_artifact_hash,
            authority_state: self.authority_state,
            policy_version_id: &self.policy_version_id,
            context_hash: &self.context_hash,
            human_actor_id: &self.human_actor_id,
            timestamp: self.timestamp,
        };
        let digest = hash_canonical_json(&payload)?;

        Ok(CommitmentArtifact {
            artifact_version: ARTIFACT_VERSION.to_owned(),
            artifact_id: ArtifactId::new(digest.as_hex()),
            instance_id: self.instance_id,
            prev_artifact_hash: self.prev_artifact_hash,
            authority_state: self.authority_state,
            policy_version_id: self.policy_version_id,
            context_hash: self.context_hash,
            human_actor_id: self.human_actor_id,
            timestamp: self.timestamp,
        })
    }
}

impl CommitmentArtifact {
    /// Recomputes this artifact's seal from its current fields, without
    /// consulting the stored `artifact_id`. Used by the chain verifier
    /// (C5) to detect tampering.
    ///
    /// # Errors
    /// Returns [`ArtifactError::Hashing`] if the payload cannot be
    /// canonicalized.
    pub fn reseal(&self) -> Result<ArtifactId, ArtifactError> {
        let payload = SealPayload {
            artifact_version: &self.artifact_version,
            instance_id: &self.instance_id,
            prev_artifact_hash: &self.prev_artifact_hash,
            authority_state: self.authority_state,
            policy_version_id: &self.policy_version_id,
            context_hash: &self.context_hash,
            human_actor_id: &self.human_actor_id,
            timestamp: self.timestamp,
        };
        let digest = hash_canonical_json(&payload)?;
        Ok(ArtifactId::new(digest.as_hex()))
    }
}
