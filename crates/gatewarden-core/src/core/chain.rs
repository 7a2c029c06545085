// gatewarden-core/src/core/chain.rs
// ============================================================================
// Module: Chain Verifier
// Description: Offline verification of a single artifact and of a linked
//              sequence of artifacts (C5).
// Purpose: Run without any store access so audits can be performed years
//          later against nothing but the artifact files themselves.
// Dependencies: crate::core::artifact::CommitmentArtifact
// ============================================================================

use crate::core::artifact::ArtifactError;
use crate::core::artifact::CommitmentArtifact;
use crate::core::identifiers::ArtifactId;

/// The result of verifying a single artifact's self-seal.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    /// Whether the artifact's claimed ID matches its recomputed seal.
    pub valid: bool,
    /// The artifact's claimed ID.
    pub artifact_id: ArtifactId,
    /// The freshly recomputed seal.
    pub calculated_hash: ArtifactId,
    /// A human-readable reason when `valid` is false.
    pub error: Option<String>,
}

/// The result of verifying a chain of linked artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainResult {
    /// Whether every link in the chain holds.
    pub valid: bool,
    /// The index of the first broken link, if any.
    pub broken_at: Option<usize>,
    /// A human-readable reason for the break, if any.
    pub reason: Option<String>,
}

/// Recomputes `artifact`'s seal and compares it against the claimed ID.
///
/// # Errors
/// Returns [`ArtifactError`] only if the payload cannot be canonicalized
/// at all (not on a mismatch — a mismatch is reported as `valid: false`).
pub fn verify_artifact(artifact: &CommitmentArtifact) -> Result<VerificationResult, ArtifactError> {
    if artifact.artifact_id.is_empty() {
        return Ok(VerificationResult {
            valid: false,
            artifact_id: artifact.artifact_id.clone(),
            calculated_hash: ArtifactId::new(""),
            error: Some("artifact_id is missing".to_owned()),
        });
    }

    let calculated = artifact.reseal()?;
    if calculated == artifact.artifact_id {
        Ok(VerificationResult {
            valid: true,
            artifact_id: artifact.artifact_id.clone(),
            calculated_hash: calculated,
            error: None,
        })
    } else {
        Ok(VerificationResult {
            valid: false,
            artifact_id: artifact.artifact_id.clone(),
            calculated_hash: calculated,
            error: Some("hash mismatch: integrity compromised".to_owned()),
        })
    }
}

/// Verifies that `chain` (caller-ordered, typically by timestamp) forms an
/// unbroken sequence: `chain[i].prev_artifact_hash == chain[i-1].artifact_id`
/// for every `i > 0`. An empty or single-element chain is trivially valid.
///
/// # Errors
/// Returns [`ArtifactError`] only if an artifact's payload cannot be
/// canonicalized at all.
pub fn verify_chain(chain: &[CommitmentArtifact]) -> Result<ChainResult, ArtifactError> {
    for artifact in chain {
        let result = verify_artifact(artifact)?;
        if !result.valid {
            let index = chain
                .iter()
                .position(|a| a.artifact_id == artifact.artifact_id)
                .unwrap_or(0);
            return Ok(ChainResult {
                valid: false,
                broken_at: Some(index),
                reason: result.error,
            });
        }
    }

    for i in 1..chain.len() {
        if chain[i].prev_artifact_hash != chain[i - 1].artifact_id {
            return Ok(ChainResult {
                valid: false,
                broken_at: Some(i),
                reason: Some(format!(
                    "chain[{i}].prev_artifact_hash ({}) does not match chain[{}].artifact_id ({})",
                    chain[i].prev_artifact_hash,
                    i - 1,
                    chain[i - 1].artifact_id
                )),
            });
        }
    }

    Ok(ChainResult {
        valid: true,
        broken_at: None,
        reason: None,
    })
}
