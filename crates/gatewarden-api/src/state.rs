// gatewarden-api/src/state.rs
// ============================================================================
// Module: API State
// Description: Shared handler state: the instance store, the decision
//              engine, and the registry of in-flight HITL signal channels.
// Purpose: Let `POST /instances` spawn a workflow task and `POST
//          /instances/{id}/decisions` deliver a signal to it without either
//          route depending on the other directly.
// Dependencies: gatewarden_orchestrator, gatewarden_store_sqlite,
//               gatewarden_worm, tokio::sync::mpsc
// ============================================================================

//! ## Overview
//! Every instance that pauses for a human decision has exactly one
//! outstanding [`tokio::sync::mpsc::Sender`] registered under its
//! [`InstanceId`] for the lifetime of its workflow task. `POST /instances`
//! registers the channel and spawns [`run_instance_workflow`]; `POST
//! /instances/{id}/decisions` looks the sender up and forwards the signal.
//! The workflow task deregisters its own channel on completion, whether it
//! paused at all or not, so a decision posted after completion finds no
//! channel and is rejected as not-found rather than silently dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use gatewarden_core::DecisionCommand;
use gatewarden_core::InstanceId;
use gatewarden_core::Timestamp;
use gatewarden_orchestrator::DecisionEngine;
use gatewarden_orchestrator::RetryPolicy;
use gatewarden_orchestrator::WorkflowInput;
use gatewarden_orchestrator::run_instance_workflow;
use gatewarden_store_sqlite::SqliteInstanceStore;
use gatewarden_worm::WormStore;
use rand::RngCore;
use rand::rngs::OsRng;
use tokio::sync::mpsc;

use gatewarden_orchestrator::ArtifactEmitter;

/// The channel capacity for each instance's HITL signal: exactly one
/// decision is ever delivered per instance.
const SIGNAL_CHANNEL_CAPACITY: usize = 1;

/// Shared state for every route handler.
pub struct AppState {
    /// Transactional instance/decision/audit-event store.
    store: Arc<SqliteInstanceStore>,
    /// Validates and records HITL decisions.
    decision_engine: Arc<DecisionEngine>,
    /// Retry shape applied to persistence calls inside the workflow.
    retry_policy: RetryPolicy,
    /// One signal sender per instance currently running a workflow task.
    pending_signals: Mutex<HashMap<InstanceId, mpsc::Sender<DecisionCommand>>>,
}

impl AppState {
    /// Builds API state over `store` and `worm`.
    #[must_use]
    pub fn new(store: Arc<SqliteInstanceStore>, worm: Arc<dyn WormStore>) -> Self {
        let emitter = ArtifactEmitter::new(worm);
        let decision_engine = Arc::new(DecisionEngine::new(Arc::clone(&store), emitter));
        Self {
            store,
            decision_engine,
            retry_policy: RetryPolicy::default(),
            pending_signals: Mutex::new(HashMap::new()),
        }
    }

    /// The instance store, for read-path handlers.
    #[must_use]
    pub fn store(&self) -> &SqliteInstanceStore {
        &self.store
    }

    /// Clones the signal sender registered for `id`, if its workflow task
    /// is still running.
    #[must_use]
    pub fn signal_sender(&self, id: &InstanceId) -> Option<mpsc::Sender<DecisionCommand>> {
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this registry"
        )]
        let guard = self.pending_signals.lock().unwrap();
        guard.get(id).cloned()
    }

    /// Creates and registers a fresh signal channel for `id`, returning the
    /// receiver half for the workflow task to hold.
    fn register_signal_channel(&self, id: InstanceId) -> mpsc::Receiver<DecisionCommand> {
        let (tx, rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this registry"
        )]
        let mut guard = self.pending_signals.lock().unwrap();
        guard.insert(id, tx);
        drop(guard);
        rx
    }

    /// Removes `id`'s signal channel once its workflow task has finished.
    fn deregister_signal_channel(&self, id: &InstanceId) {
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this registry"
        )]
        let mut guard = self.pending_signals.lock().unwrap();
        guard.remove(id);
    }
}

/// Generates a fresh, random [`InstanceId`]: 16 bytes from the OS CSPRNG,
/// lowercase-hex encoded.
#[must_use]
pub fn new_instance_id() -> InstanceId {
    let mut bytes = [0_u8; 16];
    OsRng.fill_bytes(&mut bytes);
    InstanceId::new(hex_lower(&bytes))
}

/// Renders `bytes` as a lowercase-hex string.
fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        // Infallible: writing to a String never fails.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// The wall clock every spawned workflow task's timestamps are drawn from.
/// `gatewarden-core` and `gatewarden-orchestrator` never read the clock
/// themselves; this is the one place in the transport layer that does.
fn system_clock() -> Timestamp {
    Timestamp::from_offset_date_time(time::OffsetDateTime::now_utc())
}

/// Registers `input.instance_id`'s signal channel and spawns its workflow
/// task in the background. The task deregisters its own channel and logs
/// its outcome when it completes; callers do not await it.
pub fn spawn_instance_workflow(state: &Arc<AppState>, input: WorkflowInput) {
    let signals = state.register_signal_channel(input.instance_id.clone());
    let state = Arc::clone(state);
    let instance_id = input.instance_id.clone();

    tokio::spawn(async move {
        let outcome = run_instance_workflow(
            &state.store,
            &state.decision_engine,
            &state.retry_policy,
            input,
            signals,
            &system_clock,
        )
        .await;

        state.deregister_signal_channel(&instance_id);

        match outcome {
            Ok(outcome) => {
                tracing::info!(
                    instance_id = %outcome.instance_id,
                    final_state = %outcome.final_state,
                    "workflow completed"
                );
            }
            Err(err) => {
                tracing::error!(%instance_id, error = %err, "workflow failed");
            }
        }
    });
}
