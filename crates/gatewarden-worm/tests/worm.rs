// gatewarden-worm/tests/worm.rs
// ============================================================================
// Tests for WORM immutability and concurrency (C3, Testable Property 6).
// ============================================================================

use std::sync::Arc;
use std::thread;

use gatewarden_core::ArtifactId;
use gatewarden_core::InstanceId;
use gatewarden_core::NewArtifact;
use gatewarden_core::PolicyVersionId;
use gatewarden_core::State;
use gatewarden_core::Timestamp;
use gatewarden_worm::FsWormStore;
use gatewarden_worm::MemWormStore;
use gatewarden_worm::WormError;
use gatewarden_worm::WormStore;

fn sample_artifact(actor: &str) -> gatewarden_core::CommitmentArtifact {
    let odt = time::OffsetDateTime::from_unix_timestamp(1000).unwrap();
    NewArtifact {
        instance_id: InstanceId::new("inst-1"),
        prev_artifact_hash: ArtifactId::new(""),
        authority_state: State::Approved,
        policy_version_id: PolicyVersionId::new("p1"),
        context_hash: "deadbeef".to_owned(),
        human_actor_id: actor.to_owned(),
        timestamp: Timestamp::from_offset_date_time(odt),
    }
    .seal()
    .unwrap()
}

#[test]
fn fs_store_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsWormStore::open(dir.path()).unwrap();
    let artifact = sample_artifact("alice");
    store.write(&artifact).unwrap();
    let loaded = store.get(&artifact.artifact_id).unwrap();
    assert_eq!(loaded.artifact_id, artifact.artifact_id);
    assert_eq!(loaded.human_actor_id, "alice");
}

#[test]
fn fs_store_rejects_second_write_and_preserves_original() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsWormStore::open(dir.path()).unwrap();
    let artifact = sample_artifact("alice");
    store.write(&artifact).unwrap();

    let mut tampered = artifact.clone();
    tampered.human_actor_id = "mallory".to_owned();
    let err = store.write(&tampered).unwrap_err();
    assert!(matches!(err, WormError::AlreadyExists(_)));

    let loaded = store.get(&artifact.artifact_id).unwrap();
    assert_eq!(loaded.human_actor_id, "alice");
}

#[test]
fn fs_store_rejects_invalid_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsWormStore::open(dir.path()).unwrap();
    let err = store.get(&ArtifactId::new("../escape")).unwrap_err();
    assert!(matches!(err, WormError::InvalidId(_)));
}

#[test]
fn fs_store_get_missing_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsWormStore::open(dir.path()).unwrap();
    let err = store.get(&ArtifactId::new("deadbeef")).unwrap_err();
    assert!(matches!(err, WormError::NotFound(_)));
}

#[test]
fn mem_store_round_trips() {
    let store = MemWormStore::new();
    let artifact = sample_artifact("bob");
    store.write(&artifact).unwrap();
    let loaded = store.get(&artifact.artifact_id).unwrap();
    assert_eq!(loaded.artifact_id, artifact.artifact_id);
}

#[test]
fn concurrent_writes_to_same_id_resolve_to_exactly_one_success() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsWormStore::open(dir.path()).unwrap());
    let artifact = Arc::new(sample_artifact("alice"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let artifact = Arc::clone(&artifact);
            thread::spawn(move || store.write(&artifact))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
}
