// gatewarden-core/src/core/policy.rs
// ============================================================================
// Module: Policy Evaluator + Fail-Closed Wrapper
// Description: Pure policy evaluation and its fail-closed wrapper (C9).
// Purpose: Decide whether an instance must pause for a human decision;
//          force a safe outcome whenever that decision is ambiguous.
// Dependencies: crate::core::{identifiers, state_machine}
// ============================================================================

//! ## Overview
//! `evaluate` is pure and side-effect free, safe to call from deterministic
//! workflow code. [`evaluate_fail_closed`] never returns an error: any
//! ambiguity in the inner evaluation collapses to the safe outcome
//! (`should_pause = true`, `next_state = WAITING_FOR_HUMAN`), the same
//! "unknown pauses the gate" idiom this codebase uses elsewhere for
//! incomplete-evidence handling.

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::PolicyVersionId;
use crate::core::state_machine::State;

/// Policy-declared risk level driving the HITL decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Materiality {
    /// Low risk; no human approval required on materiality grounds alone.
    Low,
    /// Medium risk.
    Medium,
    /// High risk; always triggers a pause.
    High,
}

/// A policy evaluated against one instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// The policy's identifier.
    pub id: PolicyVersionId,
    /// The declared materiality level.
    pub materiality: Materiality,
    /// Whether this policy demands human approval regardless of
    /// materiality.
    pub requires_human_approval: bool,
    /// The HITL approval timeout, in seconds. `None` uses the default
    /// (24 hours), per the orchestration protocol.
    pub approval_timeout_seconds: Option<u64>,
}

/// The default HITL approval timeout when a policy does not specify one.
pub const DEFAULT_APPROVAL_TIMEOUT_SECONDS: u64 = 24 * 60 * 60;

impl Policy {
    /// The effective approval timeout for this policy.
    #[must_use]
    pub fn effective_timeout_seconds(&self) -> u64 {
        self.approval_timeout_seconds
            .unwrap_or(DEFAULT_APPROVAL_TIMEOUT_SECONDS)
    }
}

/// The outcome of evaluating a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEvaluation {
    /// Whether the instance must pause for a human decision.
    pub should_pause: bool,
    /// The state to enter immediately after evaluation.
    pub next_state: State,
    /// A human-readable reason, present when the wrapper fell back to the
    /// fail-closed outcome.
    pub reason: Option<String>,
}

/// Evaluates `policy` with no I/O: `should_pause = materiality == HIGH ||
/// requires_human_approval`.
#[must_use]
pub fn evaluate(policy: &Policy) -> PolicyEvaluation {
    let should_pause = policy.materiality == Materiality::High || policy.requires_human_approval;
    PolicyEvaluation {
        should_pause,
        next_state: if should_pause {
            State::WaitingForHuman
        } else {
            State::Running
        },
        reason: None,
    }
}

/// Wraps [`evaluate`] so that any evaluator error collapses to the safe
/// outcome instead of propagating. This function cannot fail: ambiguity
/// fails closed rather than failing the caller.
#[must_use]
pub fn evaluate_fail_closed(policy: Option<&Policy>) -> PolicyEvaluation {
    match policy {
        Some(policy) => evaluate(policy),
        None => PolicyEvaluation {
            should_pause: true,
            next_state: State::WaitingForHuman,
            reason: Some("fail-closed: no policy supplied".to_owned()),
        },
    }
}
