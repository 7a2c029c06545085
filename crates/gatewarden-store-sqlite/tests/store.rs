// gatewarden-store-sqlite/tests/store.rs
// ============================================================================
// Module: Instance Store integration tests
// Description: Exercises create/transition/decision/audit-event flows
//              against a real in-memory SQLite connection.
// ============================================================================

use gatewarden_core::ActorId;
use gatewarden_core::DecisionCommand;
use gatewarden_core::DecisionType;
use gatewarden_core::Instance;
use gatewarden_core::InstanceId;
use gatewarden_core::PolicyVersionId;
use gatewarden_core::State;
use gatewarden_core::Timestamp;
use gatewarden_core::Value;
use gatewarden_core::WorkflowId;
use gatewarden_core::event_types;
use gatewarden_store_sqlite::SqliteInstanceStore;
use gatewarden_store_sqlite::StoreError;

fn ts(secs: i64) -> Timestamp {
    #[allow(clippy::unwrap_used, reason = "test fixture, input is a fixed literal")]
    let raw = time::OffsetDateTime::from_unix_timestamp(secs).unwrap();
    Timestamp::from_offset_date_time(raw)
}

fn sample_instance(id: &str) -> Instance {
    Instance {
        id: InstanceId::new(id),
        workflow_id: WorkflowId::new("wf-1"),
        state: State::Created,
        trigger_context: Value::Object(std::collections::BTreeMap::new()),
        policy_context: Value::Object(std::collections::BTreeMap::new()),
        policy_version_id: PolicyVersionId::new("policy-v1"),
        last_artifact_hash: gatewarden_core::ArtifactId::genesis(),
        created_at: ts(1_000),
        updated_at: ts(1_000),
    }
}

#[test]
fn create_instance_then_get_round_trips() {
    let store = SqliteInstanceStore::open_in_memory().expect("open store");
    let instance = sample_instance("inst-1");
    store.create_instance(&instance).expect("create");

    let loaded = store
        .get_instance(&InstanceId::new("inst-1"))
        .expect("get");
    assert_eq!(loaded.id.as_str(), "inst-1");
    assert_eq!(loaded.state, State::Created);

    let events = store
        .get_audit_events(&InstanceId::new("inst-1"))
        .expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, event_types::INSTANCE_CREATED);
}

#[test]
fn get_instance_not_found() {
    let store = SqliteInstanceStore::open_in_memory().expect("open store");
    let err = store.get_instance(&InstanceId::new("missing")).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn transition_state_created_to_running_to_waiting() {
    let store = SqliteInstanceStore::open_in_memory().expect("open store");
    let instance = sample_instance("inst-2");
    store.create_instance(&instance).expect("create");
    let id = InstanceId::new("inst-2");

    let updated = store
        .transition_state(&id, State::Running, ts(1_001))
        .expect("created -> running");
    assert_eq!(updated.state, State::Running);

    let updated = store
        .transition_state(&id, State::WaitingForHuman, ts(1_002))
        .expect("running -> waiting");
    assert_eq!(updated.state, State::WaitingForHuman);

    let events = store.get_audit_events(&id).expect("events");
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].event_type, event_types::STATE_TRANSITIONED);
    assert_eq!(events[2].event_type, event_types::STATE_TRANSITIONED);
}

#[test]
fn transition_state_rejects_illegal_edge() {
    let store = SqliteInstanceStore::open_in_memory().expect("open store");
    let instance = sample_instance("inst-3");
    store.create_instance(&instance).expect("create");
    let id = InstanceId::new("inst-3");

    let err = store
        .transition_state(&id, State::WaitingForHuman, ts(1_001))
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));

    // the instance must be untouched by the rejected attempt.
    let loaded = store.get_instance(&id).expect("get");
    assert_eq!(loaded.state, State::Created);
    assert_eq!(store.get_audit_events(&id).expect("events").len(), 1);
}

#[test]
fn transition_state_not_found() {
    let store = SqliteInstanceStore::open_in_memory().expect("open store");
    let err = store
        .transition_state(&InstanceId::new("ghost"), State::Running, ts(1_000))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn record_decision_advances_state_and_writes_audit_event() {
    let store = SqliteInstanceStore::open_in_memory().expect("open store");
    let instance = sample_instance("inst-4");
    store.create_instance(&instance).expect("create");
    let id = InstanceId::new("inst-4");
    store
        .transition_state(&id, State::Running, ts(1_001))
        .expect("created -> running");
    store
        .transition_state(&id, State::WaitingForHuman, ts(1_002))
        .expect("running -> waiting");

    let cmd = DecisionCommand {
        instance_id: id.clone(),
        decision_type: DecisionType::Approve,
        actor_id: ActorId::new("actor-1"),
        role: "HUMAN".to_owned(),
        justification: "looks fine".to_owned(),
        context_snapshot: None,
        context_delta: None,
        policy_version_id: PolicyVersionId::new("policy-v1"),
        evidence_hash: Some("deadbeef".to_owned()),
        new_artifact_hash: Some(gatewarden_core::ArtifactId::new(
            "a".repeat(64),
        )),
    };

    let updated = store
        .record_decision(&cmd, State::Approved, ts(1_003))
        .expect("record decision");
    assert_eq!(updated.state, State::Approved);
    assert_eq!(updated.last_artifact_hash.as_str(), "a".repeat(64));

    let decision = store
        .get_decision_by_artifact(&gatewarden_core::ArtifactId::new("a".repeat(64)))
        .expect("lookup")
        .expect("decision present");
    assert_eq!(decision.from_state, State::WaitingForHuman);
    assert_eq!(decision.to_state, State::Approved);

    let events = store.get_audit_events(&id).expect("events");
    assert_eq!(events.len(), 4);
    assert_eq!(events[3].event_type, event_types::DECISION_RECORDED);
}

#[test]
fn record_decision_requires_artifact_hash() {
    let store = SqliteInstanceStore::open_in_memory().expect("open store");
    let instance = sample_instance("inst-5");
    store.create_instance(&instance).expect("create");

    let cmd = DecisionCommand {
        instance_id: InstanceId::new("inst-5"),
        decision_type: DecisionType::Reject,
        actor_id: ActorId::new("actor-1"),
        role: "HUMAN".to_owned(),
        justification: "no".to_owned(),
        context_snapshot: None,
        context_delta: None,
        policy_version_id: PolicyVersionId::new("policy-v1"),
        evidence_hash: None,
        new_artifact_hash: None,
    };

    let err = store
        .record_decision(&cmd, State::Rejected, ts(1_001))
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidInput(_)));
}

#[test]
fn list_instances_returns_all_created() {
    let store = SqliteInstanceStore::open_in_memory().expect("open store");
    store.create_instance(&sample_instance("inst-a")).expect("create a");
    store.create_instance(&sample_instance("inst-b")).expect("create b");

    let all = store.list_instances().expect("list");
    assert_eq!(all.len(), 2);
}

#[test]
fn readiness_succeeds_on_open_connection() {
    let store = SqliteInstanceStore::open_in_memory().expect("open store");
    store.readiness().expect("readiness");
}
