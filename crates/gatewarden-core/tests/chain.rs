// gatewarden-core/tests/chain.rs
// ============================================================================
// Tests for the artifact model (C2) and chain verifier (C5).
// ============================================================================

use gatewarden_core::ArtifactId;
use gatewarden_core::InstanceId;
use gatewarden_core::NewArtifact;
use gatewarden_core::PolicyVersionId;
use gatewarden_core::State;
use gatewarden_core::Timestamp;
use gatewarden_core::verify_artifact;
use gatewarden_core::verify_chain;

fn ts(seconds_after_epoch: i64) -> Timestamp {
    let odt = time::OffsetDateTime::from_unix_timestamp(seconds_after_epoch)
        .expect("valid unix timestamp");
    Timestamp::from_offset_date_time(odt)
}

fn seal_one(prev: ArtifactId, state: State, actor: &str, when: i64) -> gatewarden_core::CommitmentArtifact {
    NewArtifact {
        instance_id: InstanceId::new("inst-1"),
        prev_artifact_hash: prev,
        authority_state: state,
        policy_version_id: PolicyVersionId::new("p1"),
        context_hash: "deadbeef".to_owned(),
        human_actor_id: actor.to_owned(),
        timestamp: ts(when),
    }
    .seal()
    .expect("artifact seals")
}

#[test]
fn seal_is_idempotent() {
    let artifact = seal_one(ArtifactId::new(""), State::Approved, "alice", 1000);
    let result = verify_artifact(&artifact).unwrap();
    assert!(result.valid);
    assert_eq!(result.artifact_id, artifact.artifact_id);
    assert_eq!(result.calculated_hash, artifact.artifact_id);
}

#[test]
fn tamper_detection_on_mutated_field() {
    let mut artifact = seal_one(ArtifactId::new(""), State::Approved, "alice", 1000);
    artifact.authority_state = State::Rejected;
    let result = verify_artifact(&artifact).unwrap();
    assert!(!result.valid);
    assert_eq!(result.error.as_deref(), Some("hash mismatch: integrity compromised"));
}

#[test]
fn chain_of_three_verifies() {
    let a1 = seal_one(ArtifactId::new(""), State::Approved, "alice", 1000);
    let a2 = seal_one(a1.artifact_id.clone(), State::Overridden, "bob", 2000);
    let a3 = seal_one(a2.artifact_id.clone(), State::Rejected, "SYSTEM", 3000);

    let result = verify_chain(&[a1, a2, a3]).unwrap();
    assert!(result.valid);
    assert_eq!(result.broken_at, None);
}

#[test]
fn chain_breaks_when_middle_artifact_removed() {
    let a1 = seal_one(ArtifactId::new(""), State::Approved, "alice", 1000);
    let a2 = seal_one(a1.artifact_id.clone(), State::Overridden, "bob", 2000);
    let a3 = seal_one(a2.artifact_id.clone(), State::Rejected, "SYSTEM", 3000);

    let result = verify_chain(&[a1, a3]).unwrap();
    assert!(!result.valid);
    assert_eq!(result.broken_at, Some(1));
}

#[test]
fn empty_chain_is_trivially_valid() {
    let result = verify_chain(&[]).unwrap();
    assert!(result.valid);
}

#[test]
fn missing_required_fields_are_rejected() {
    let err = NewArtifact {
        instance_id: InstanceId::new(""),
        prev_artifact_hash: ArtifactId::new(""),
        authority_state: State::Approved,
        policy_version_id: PolicyVersionId::new("p1"),
        context_hash: "deadbeef".to_owned(),
        human_actor_id: "alice".to_owned(),
        timestamp: ts(1000),
    }
    .seal()
    .unwrap_err();
    assert!(matches!(err, gatewarden_core::ArtifactError::MissingField("instance_id")));
}
