// gatewarden-api/src/routes.rs
// ============================================================================
// Module: HTTP Routes
// Description: The thin JSON-over-HTTP surface over the orchestrator and
//              instance store: create an instance, signal a decision, and
//              read instances/audit trails back.
// Purpose: Translate HTTP requests into calls against `gatewarden-core` and
//          `gatewarden-orchestrator` types; no business logic lives here.
// Dependencies: axum, gatewarden_core, gatewarden_orchestrator,
//               gatewarden_store_sqlite
// ============================================================================

//! ## Overview
//! Six routes, matching the external interface: `POST /instances` starts a
//! workflow in the background and returns immediately; `POST
//! /instances/{id}/decisions` forwards a signal to that workflow's channel;
//! the three `GET` routes are plain reads against the instance store;
//! `GET /healthz` never touches the store. Authentication and RBAC are
//! expected to be applied by upstream middleware — these handlers trust
//! the identity they are called with.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::post;
use gatewarden_core::ActorId;
use gatewarden_core::AuditEvent;
use gatewarden_core::DecisionCommand;
use gatewarden_core::DecisionType;
use gatewarden_core::Instance;
use gatewarden_core::InstanceId;
use gatewarden_core::Materiality;
use gatewarden_core::Policy;
use gatewarden_core::PolicyVersionId;
use gatewarden_core::Value;
use gatewarden_core::WorkflowId;
use gatewarden_orchestrator::WorkflowInput;
use gatewarden_store_sqlite::StoreError;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;
use crate::state::new_instance_id;
use crate::state::spawn_instance_workflow;

/// Builds the router over `state`.
#[must_use]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/instances", post(create_instance).get(list_instances))
        .route("/instances/{id}", get(get_instance))
        .route("/instances/{id}/decisions", post(record_decision))
        .route("/instances/{id}/audit", get(get_audit))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// The `policy` field of a `POST /instances` body. Mirrors
/// [`Policy`] except `requires_human_approval` defaults to `false` when
/// omitted, matching the seed scenarios in the external interface.
#[derive(Debug, Deserialize)]
struct PolicyRequest {
    /// The policy's identifier.
    id: String,
    /// The declared materiality level.
    materiality: Materiality,
    /// Whether this policy demands human approval regardless of
    /// materiality.
    #[serde(default)]
    requires_human_approval: bool,
    /// The HITL approval timeout, in seconds.
    approval_timeout_seconds: Option<u64>,
}

impl From<PolicyRequest> for Policy {
    fn from(request: PolicyRequest) -> Self {
        Self {
            id: PolicyVersionId::new(request.id),
            materiality: request.materiality,
            requires_human_approval: request.requires_human_approval,
            approval_timeout_seconds: request.approval_timeout_seconds,
        }
    }
}

/// Body for `POST /instances`.
#[derive(Debug, Deserialize)]
struct CreateInstanceRequest {
    /// The workflow definition driving this instance.
    workflow_id: String,
    /// Opaque trigger context supplied at creation.
    trigger_context: Value,
    /// The policy to evaluate for this instance.
    policy: PolicyRequest,
}

/// Response for a successful `POST /instances`.
#[derive(Debug, Serialize)]
struct CreateInstanceResponse {
    /// The newly created instance's ID.
    id: String,
    /// Always `"PENDING"`: the workflow has been accepted but has not
    /// necessarily reached its first persisted state yet.
    status: &'static str,
}

/// Starts a new instance workflow in the background and returns
/// immediately with its assigned ID.
async fn create_instance(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateInstanceRequest>,
) -> (StatusCode, Json<CreateInstanceResponse>) {
    let instance_id = new_instance_id();
    let input = WorkflowInput {
        instance_id: instance_id.clone(),
        workflow_id: WorkflowId::new(request.workflow_id),
        trigger_context: request.trigger_context,
        policy: request.policy.into(),
    };

    spawn_instance_workflow(&state, input);

    (
        StatusCode::ACCEPTED,
        Json(CreateInstanceResponse {
            id: instance_id.into_inner(),
            status: "PENDING",
        }),
    )
}

/// Body for `POST /instances/{id}/decisions`.
#[derive(Debug, Deserialize)]
struct DecisionRequest {
    /// The kind of decision being recorded.
    #[serde(rename = "type")]
    decision_type: DecisionType,
    /// The actor recording this decision.
    actor_id: String,
    /// Why this decision was made.
    #[serde(default)]
    justification: String,
    /// Full context snapshot, omitted when `evidence_hash` is supplied.
    #[serde(default)]
    context_snapshot: Option<Value>,
    /// The change applied to the context by an `OVERRIDE` decision.
    #[serde(default)]
    context_delta: Option<Value>,
    /// A pre-computed hash standing in for `context_snapshot`.
    #[serde(default)]
    evidence_hash: Option<String>,
}

/// Response for a successfully forwarded decision signal.
#[derive(Debug, Serialize)]
struct DecisionResponse {
    /// Always `"SIGNAL_SENT"`: the signal reached the workflow's channel.
    /// Whether the decision is ultimately accepted is validated inside the
    /// workflow and reflected in the instance's later state.
    status: &'static str,
}

/// Forwards a decision to the instance's waiting workflow task, if any.
///
/// # Errors
/// Returns [`ApiError::NotFound`] if the instance does not exist, is
/// already terminal, or has no workflow task currently awaiting a signal.
async fn record_decision(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Result<(StatusCode, Json<DecisionResponse>), ApiError> {
    let instance_id = InstanceId::new(id);
    let instance = load_instance(&state, &instance_id)?;

    if instance.state.is_terminal() {
        return Err(ApiError::NotFound(format!(
            "instance {instance_id} is terminal"
        )));
    }

    let cmd = DecisionCommand {
        instance_id: instance_id.clone(),
        decision_type: request.decision_type,
        actor_id: ActorId::new(request.actor_id),
        role: "HUMAN".to_owned(),
        justification: request.justification,
        context_snapshot: request.context_snapshot,
        context_delta: request.context_delta,
        policy_version_id: instance.policy_version_id,
        evidence_hash: request.evidence_hash,
        new_artifact_hash: None,
    };

    let sender = state.signal_sender(&instance_id).ok_or_else(|| {
        ApiError::NotFound(format!(
            "instance {instance_id} is not awaiting a decision"
        ))
    })?;

    sender.send(cmd).await.map_err(|_err| {
        ApiError::NotFound(format!(
            "instance {instance_id} is not awaiting a decision"
        ))
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DecisionResponse {
            status: "SIGNAL_SENT",
        }),
    ))
}

/// Response for `GET /instances`.
#[derive(Debug, Serialize)]
struct ListInstancesResponse {
    /// Every known instance.
    instances: Vec<Instance>,
}

/// Lists every known instance.
///
/// # Errors
/// Returns [`ApiError::Internal`] if the store cannot be read.
async fn list_instances(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListInstancesResponse>, ApiError> {
    let instances = state
        .store()
        .list_instances()
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(ListInstancesResponse { instances }))
}

/// Fetches one instance by ID.
///
/// # Errors
/// Returns [`ApiError::NotFound`] if no such instance exists, or
/// [`ApiError::Internal`] on a store failure.
async fn get_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Instance>, ApiError> {
    let instance = load_instance(&state, &InstanceId::new(id))?;
    Ok(Json(instance))
}

/// Response for `GET /instances/{id}/audit`.
#[derive(Debug, Serialize)]
struct AuditEventsResponse {
    /// The instance's audit trail, in chronological order.
    events: Vec<AuditEvent>,
}

/// Fetches one instance's audit trail.
///
/// # Errors
/// Returns [`ApiError::Internal`] if the store cannot be read.
async fn get_audit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AuditEventsResponse>, ApiError> {
    let events = state
        .store()
        .get_audit_events(&InstanceId::new(id))
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(AuditEventsResponse { events }))
}

/// Liveness probe; never touches the store.
async fn healthz() -> &'static str {
    "OK"
}

/// Loads `id` from the store, mapping `StoreError` onto [`ApiError`].
fn load_instance(state: &AppState, id: &InstanceId) -> Result<Instance, ApiError> {
    match state.store().get_instance(id) {
        Ok(instance) => Ok(instance),
        Err(StoreError::NotFound(message)) => Err(ApiError::NotFound(message)),
        Err(other) => Err(ApiError::Internal(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gatewarden_core::State as InstanceState;
    use gatewarden_store_sqlite::SqliteInstanceStore;
    use gatewarden_worm::MemWormStore;

    use super::*;

    fn test_state() -> Arc<AppState> {
        let store = Arc::new(SqliteInstanceStore::open_in_memory().expect("open store"));
        let worm: Arc<dyn gatewarden_worm::WormStore> = Arc::new(MemWormStore::new());
        Arc::new(AppState::new(store, worm))
    }

    async fn wait_for_state(state: &AppState, id: &InstanceId, target: InstanceState) -> Instance {
        for _ in 0..200 {
            if let Ok(instance) = state.store().get_instance(id) {
                if instance.state == target {
                    return instance;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("instance {id} never reached {target}");
    }

    fn low_policy() -> PolicyRequest {
        PolicyRequest {
            id: "p1".to_owned(),
            materiality: Materiality::Low,
            requires_human_approval: false,
            approval_timeout_seconds: None,
        }
    }

    fn high_policy(timeout_seconds: u64) -> PolicyRequest {
        PolicyRequest {
            id: "p1".to_owned(),
            materiality: Materiality::High,
            requires_human_approval: false,
            approval_timeout_seconds: Some(timeout_seconds),
        }
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        assert_eq!(healthz().await, "OK");
    }

    #[tokio::test]
    async fn low_materiality_instance_auto_runs() {
        let state = test_state();
        let (status, Json(response)) = create_instance(
            State(Arc::clone(&state)),
            Json(CreateInstanceRequest {
                workflow_id: "wf-lo".to_owned(),
                trigger_context: Value::Object(std::collections::BTreeMap::new()),
                policy: low_policy(),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(response.status, "PENDING");

        let id = InstanceId::new(response.id);
        let instance = wait_for_state(&state, &id, InstanceState::Running).await;
        assert!(instance.last_artifact_hash.is_genesis());
    }

    #[tokio::test]
    async fn high_materiality_instance_pauses_then_approves() {
        let state = test_state();
        let (_, Json(response)) = create_instance(
            State(Arc::clone(&state)),
            Json(CreateInstanceRequest {
                workflow_id: "wf-hi".to_owned(),
                trigger_context: Value::Null,
                policy: high_policy(60),
            }),
        )
        .await;
        let id = InstanceId::new(response.id.clone());
        wait_for_state(&state, &id, InstanceState::WaitingForHuman).await;

        let (status, Json(decision_response)) = record_decision(
            State(Arc::clone(&state)),
            Path(response.id),
            Json(DecisionRequest {
                decision_type: DecisionType::Approve,
                actor_id: "alice".to_owned(),
                justification: "looks fine".to_owned(),
                context_snapshot: None,
                context_delta: None,
                evidence_hash: Some("a".repeat(64)),
            }),
        )
        .await
        .expect("signal accepted");
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(decision_response.status, "SIGNAL_SENT");

        let instance = wait_for_state(&state, &id, InstanceState::Approved).await;
        assert!(!instance.last_artifact_hash.is_genesis());
    }

    #[tokio::test]
    async fn decision_on_unknown_instance_is_not_found() {
        let state = test_state();
        let err = record_decision(
            State(state),
            Path("does-not-exist".to_owned()),
            Json(DecisionRequest {
                decision_type: DecisionType::Approve,
                actor_id: "alice".to_owned(),
                justification: "ok".to_owned(),
                context_snapshot: None,
                context_delta: None,
                evidence_hash: Some("a".repeat(64)),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_instance_unknown_is_not_found() {
        let state = test_state();
        let err = get_instance(State(state), Path("ghost".to_owned())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_and_audit_reflect_created_instance() {
        let state = test_state();
        let (_, Json(response)) = create_instance(
            State(Arc::clone(&state)),
            Json(CreateInstanceRequest {
                workflow_id: "wf-lo".to_owned(),
                trigger_context: Value::Null,
                policy: low_policy(),
            }),
        )
        .await;
        let id = InstanceId::new(response.id.clone());
        wait_for_state(&state, &id, InstanceState::Running).await;

        let Json(list) = list_instances(State(Arc::clone(&state))).await.expect("list");
        assert_eq!(list.instances.len(), 1);

        let Json(audit) = get_audit(State(state), Path(response.id)).await.expect("audit");
        assert!(!audit.events.is_empty());
    }
}
