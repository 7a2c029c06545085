// gatewarden-orchestrator/src/workflow.rs
// ============================================================================
// Module: Orchestration Protocol
// Description: The end-to-end instance lifecycle: create, evaluate policy,
//              optionally pause for a human decision, and record the
//              outcome (C10).
// Purpose: Drive one instance from CREATED through to a decided or
//          auto-run terminal state using the same retry and signal-or-
//          timer race idiom a durable workflow engine would apply to its
//          activities, without embedding a full external engine.
// Dependencies: gatewarden_core, gatewarden_store_sqlite, crate::decision,
//               tokio::{sync::mpsc, time}
// ============================================================================

//! ## Overview
//! No bundled crate in this workspace embeds a Temporal-compatible durable
//! executor, so [`run_instance_workflow`] is a minimal, in-process
//! equivalent of one: persistence calls go through [`RetryPolicy`] with the
//! same initial-interval/backoff-coefficient/maximum-interval shape a
//! durable workflow would configure for its activities, and the HITL pause
//! is a race between an inbound decision signal and an approval-timeout
//! timer, exactly like a `workflow.Selector` over a signal channel and a
//! timer future. Signals whose `instance_id` does not match this
//! instance are logged and discarded without consuming the timer, so a
//! stray or misrouted signal can never shortcut the timeout.
//!
//! Every timestamp is supplied by `clock`, never read from the wall clock
//! inside this function, so the same workflow body can be driven by a
//! fixed or advancing clock in tests without any real waiting.

use std::time::Duration;

use gatewarden_core::ActorId;
use gatewarden_core::ArtifactId;
use gatewarden_core::DecisionCommand;
use gatewarden_core::DecisionType;
use gatewarden_core::Instance;
use gatewarden_core::InstanceId;
use gatewarden_core::Policy;
use gatewarden_core::PolicyEvaluation;
use gatewarden_core::State;
use gatewarden_core::Timestamp;
use gatewarden_core::Value;
use gatewarden_core::WorkflowId;
use gatewarden_core::evaluate;
use gatewarden_store_sqlite::SqliteInstanceStore;
use gatewarden_store_sqlite::StoreError;
use tokio::sync::mpsc;

use crate::decision::DecisionEngine;
use crate::decision::DecisionError;

/// The actor ID recorded for a system-synthesized decision.
pub const SYSTEM_ACTOR_ID: &str = "SYSTEM";

/// Mirrors the retry shape a durable workflow engine would apply to its
/// activities: exponential backoff between attempts, capped at a maximum
/// interval, with attempts abandoned once the interval would exceed it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// The delay before the first retry.
    pub initial_interval: Duration,
    /// The multiplier applied to the interval after each failed attempt.
    pub backoff_coefficient: f64,
    /// The interval is never allowed to grow past this; once it would,
    /// the next failure is returned to the caller instead of retried.
    pub maximum_interval: Duration,
    /// Budget for a single attempt, mirroring `StartToCloseTimeout`. Not
    /// currently enforced per-attempt by this in-process executor, but
    /// part of the configuration surface a real durable engine exposes.
    pub start_to_close_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(100),
            start_to_close_timeout: Duration::from_secs(10),
        }
    }
}

/// Inputs for starting a new instance workflow.
#[derive(Debug, Clone)]
pub struct WorkflowInput {
    /// The instance's stable identifier.
    pub instance_id: InstanceId,
    /// The workflow definition driving this instance.
    pub workflow_id: WorkflowId,
    /// Opaque trigger context supplied at creation.
    pub trigger_context: Value,
    /// The policy to evaluate for this instance.
    pub policy: Policy,
}

/// The outcome of running an instance workflow to its first decision point.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutcome {
    /// The instance that was run.
    pub instance_id: InstanceId,
    /// The state the instance ended in.
    pub final_state: State,
}

/// Errors raised while running an instance workflow.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// A persistence call failed even after retrying.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// Recording the HITL (or system-timeout) decision failed.
    #[error("decision error: {0}")]
    Decision(#[from] DecisionError),
}

/// Runs `input` from `CREATED` through policy evaluation and, if the
/// policy pauses the instance, through a signal-or-timeout race against
/// `signals`. `clock` supplies every timestamp recorded along the way.
///
/// # Errors
/// Returns [`WorkflowError::Store`] if persistence fails after retrying,
/// or [`WorkflowError::Decision`] if the terminal decision cannot be
/// recorded.
pub async fn run_instance_workflow(
    store: &SqliteInstanceStore,
    decision_engine: &DecisionEngine,
    retry_policy: &RetryPolicy,
    input: WorkflowInput,
    mut signals: mpsc::Receiver<DecisionCommand>,
    clock: &(dyn Fn() -> Timestamp + Send + Sync),
) -> Result<WorkflowOutcome, WorkflowError> {
    let evaluation = evaluate(&input.policy);

    let instance = Instance {
        id: input.instance_id.clone(),
        workflow_id: input.workflow_id,
        state: State::Created,
        trigger_context: input.trigger_context,
        policy_context: policy_evaluation_to_value(&evaluation, &input.policy),
        policy_version_id: input.policy.id.clone(),
        last_artifact_hash: ArtifactId::genesis(),
        created_at: clock(),
        updated_at: clock(),
    };

    retry(retry_policy, is_retryable_store_error, || {
        store.create_instance(&instance)
    })
    .await?;

    retry(retry_policy, is_retryable_store_error, || {
        store.transition_state(&instance.id, State::Running, clock())
    })
    .await?;

    if !evaluation.should_pause {
        let final_instance = store.get_instance(&instance.id)?;
        return Ok(WorkflowOutcome {
            instance_id: final_instance.id,
            final_state: final_instance.state,
        });
    }

    retry(retry_policy, is_retryable_store_error, || {
        store.transition_state(&instance.id, State::WaitingForHuman, clock())
    })
    .await?;

    let timeout = Duration::from_secs(input.policy.effective_timeout_seconds());
    let sleep = tokio::time::sleep(timeout);
    tokio::pin!(sleep);

    let cmd = loop {
        tokio::select! {
            received = signals.recv() => {
                match received {
                    Some(signal) if signal.instance_id == instance.id => break signal,
                    Some(signal) => {
                        tracing::warn!(
                            expected = %instance.id,
                            got = %signal.instance_id,
                            "ignoring decision signal for a different instance"
                        );
                    }
                    None => break system_timeout_decision(&instance.id, &input.policy.id, timeout),
                }
            }
            () = &mut sleep => {
                break system_timeout_decision(&instance.id, &input.policy.id, timeout);
            }
        }
    };

    let updated = retry(retry_policy, is_retryable_decision_error, || {
        decision_engine.record(cmd.clone(), clock())
    })
    .await?;

    Ok(WorkflowOutcome {
        instance_id: updated.id,
        final_state: updated.state,
    })
}

/// Builds the system-synthesized `REJECT` recorded when the approval
/// timeout elapses before any matching signal arrives.
fn system_timeout_decision(
    instance_id: &InstanceId,
    policy_version_id: &gatewarden_core::PolicyVersionId,
    timeout: Duration,
) -> DecisionCommand {
    DecisionCommand {
        instance_id: instance_id.clone(),
        decision_type: DecisionType::Reject,
        actor_id: ActorId::new(SYSTEM_ACTOR_ID),
        role: SYSTEM_ACTOR_ID.to_owned(),
        justification: format!("Approval Timeout ({}s) Exceeded", timeout.as_secs()),
        context_snapshot: None,
        context_delta: None,
        policy_version_id: policy_version_id.clone(),
        evidence_hash: None,
        new_artifact_hash: None,
    }
}

fn policy_evaluation_to_value(evaluation: &PolicyEvaluation, policy: &Policy) -> Value {
    let mut fields = std::collections::BTreeMap::new();
    fields.insert(
        "should_pause".to_owned(),
        Value::Bool(evaluation.should_pause),
    );
    fields.insert(
        "next_state".to_owned(),
        Value::String(evaluation.next_state.to_string()),
    );
    fields.insert(
        "policy_id".to_owned(),
        Value::String(policy.id.to_string()),
    );
    Value::Object(fields)
}

fn is_retryable_store_error(err: &StoreError) -> bool {
    matches!(err, StoreError::Sqlite(_))
}

fn is_retryable_decision_error(err: &DecisionError) -> bool {
    matches!(err, DecisionError::Store(StoreError::Sqlite(_)))
}

/// Retries `op` with exponential backoff per `policy`, stopping as soon as
/// `is_retryable` returns false for a given error or the backoff interval
/// would exceed `policy.maximum_interval`.
async fn retry<T, E>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let mut interval = policy.initial_interval;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && interval <= policy.maximum_interval => {
                tracing::warn!(?interval, "retrying after transient failure");
                tokio::time::sleep(interval).await;
                let scaled = interval.as_secs_f64() * policy.backoff_coefficient;
                interval = Duration::from_secs_f64(scaled.min(policy.maximum_interval.as_secs_f64()));
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicI64;
    use std::sync::atomic::Ordering;

    use gatewarden_core::Materiality;
    use gatewarden_core::PolicyVersionId;
    use gatewarden_worm::MemWormStore;

    use super::*;
    use crate::emitter::ArtifactEmitter;

    fn counting_clock() -> (impl Fn() -> Timestamp + Send + Sync, Arc<AtomicI64>) {
        let counter = Arc::new(AtomicI64::new(1_700_000_000));
        let counter_for_clock = counter.clone();
        let clock = move || {
            #[allow(clippy::unwrap_used, reason = "test fixture, counter stays in range")]
            let raw = time::OffsetDateTime::from_unix_timestamp(counter_for_clock.fetch_add(1, Ordering::SeqCst))
                .unwrap();
            Timestamp::from_offset_date_time(raw)
        };
        (clock, counter)
    }

    fn low_risk_policy() -> Policy {
        Policy {
            id: PolicyVersionId::new("policy-v1"),
            materiality: Materiality::Low,
            requires_human_approval: false,
            approval_timeout_seconds: Some(3_600),
        }
    }

    fn high_risk_policy() -> Policy {
        Policy {
            id: PolicyVersionId::new("policy-v1"),
            materiality: Materiality::High,
            requires_human_approval: false,
            approval_timeout_seconds: Some(1),
        }
    }

    #[tokio::test]
    async fn low_materiality_auto_runs_to_running() {
        let store = SqliteInstanceStore::open_in_memory().expect("open");
        let worm = Arc::new(MemWormStore::new());
        let engine = DecisionEngine::new(Arc::new(SqliteInstanceStore::open_in_memory().expect("open")), ArtifactEmitter::new(worm));
        let (clock, _) = counting_clock();
        let (_tx, rx) = mpsc::channel(1);

        let outcome = run_instance_workflow(
            &store,
            &engine,
            &RetryPolicy::default(),
            WorkflowInput {
                instance_id: InstanceId::new("inst-1"),
                workflow_id: WorkflowId::new("wf-1"),
                trigger_context: Value::Null,
                policy: low_risk_policy(),
            },
            rx,
            &clock,
        )
        .await
        .expect("workflow run");

        assert_eq!(outcome.final_state, State::Running);
    }

    #[tokio::test]
    async fn high_materiality_pauses_then_approves_on_signal() {
        let store = Arc::new(SqliteInstanceStore::open_in_memory().expect("open"));
        let worm = Arc::new(MemWormStore::new());
        let engine = DecisionEngine::new(store.clone(), ArtifactEmitter::new(worm));
        let (clock, _) = counting_clock();
        let (tx, rx) = mpsc::channel(1);

        tx.send(DecisionCommand {
            instance_id: InstanceId::new("inst-2"),
            decision_type: DecisionType::Approve,
            actor_id: ActorId::new("human-1"),
            role: "HUMAN".to_owned(),
            justification: "reviewed".to_owned(),
            context_snapshot: None,
            context_delta: None,
            policy_version_id: PolicyVersionId::new("policy-v1"),
            evidence_hash: Some("b".repeat(64)),
            new_artifact_hash: None,
        })
        .await
        .expect("send signal");

        let outcome = run_instance_workflow(
            &store,
            &engine,
            &RetryPolicy::default(),
            WorkflowInput {
                instance_id: InstanceId::new("inst-2"),
                workflow_id: WorkflowId::new("wf-1"),
                trigger_context: Value::Null,
                policy: high_risk_policy(),
            },
            rx,
            &clock,
        )
        .await
        .expect("workflow run");

        assert_eq!(outcome.final_state, State::Approved);
    }

    #[tokio::test(start_paused = true)]
    async fn high_materiality_times_out_to_system_rejection() {
        let store = Arc::new(SqliteInstanceStore::open_in_memory().expect("open"));
        let worm = Arc::new(MemWormStore::new());
        let engine = DecisionEngine::new(store.clone(), ArtifactEmitter::new(worm));
        let (clock, _) = counting_clock();
        let (_tx, rx) = mpsc::channel(1);

        let outcome = run_instance_workflow(
            &store,
            &engine,
            &RetryPolicy::default(),
            WorkflowInput {
                instance_id: InstanceId::new("inst-3"),
                workflow_id: WorkflowId::new("wf-1"),
                trigger_context: Value::Null,
                policy: high_risk_policy(),
            },
            rx,
            &clock,
        )
        .await
        .expect("workflow run");

        assert_eq!(outcome.final_state, State::Rejected);
    }
}
