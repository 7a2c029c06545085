// gatewarden-core/src/core/state_machine.rs
// ============================================================================
// Module: State Machine
// Description: Canonical execution states and the legal transition matrix
//              (C7).
// Purpose: Pure, total function over (from, to) pairs; no instance is ever
//          mutated on a rejected transition.
// Dependencies: serde::{Deserialize, Serialize}
// ============================================================================

//! ## Overview
//! `transition` is pure on its two state arguments. It never looks at an
//! `Instance` — timestamps and persistence are the caller's job — which is
//! what lets it be invoked safely from deterministic workflow code.

use serde::Deserialize;
use serde::Serialize;

/// The canonical states of an execution instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// The instance has been created but has not yet started running.
    Created,
    /// The instance is actively executing.
    Running,
    /// The instance is paused, awaiting a human/machine decision.
    WaitingForHuman,
    /// A human approved the pending decision.
    Approved,
    /// A human rejected the pending decision.
    Rejected,
    /// A human overrode the pending decision.
    Overridden,
    /// The instance has been resumed after an approval/override.
    Resumed,
    /// The instance finished successfully.
    Completed,
    /// The instance was terminated and will not resume.
    Terminated,
}

impl State {
    /// Returns true if no further transitions are permitted from this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Terminated)
    }

    /// The states that are legal targets of a transition from `self`.
    #[must_use]
    pub const fn legal_targets(self) -> &'static [Self] {
        match self {
            Self::Created => &[Self::Running],
            Self::Running => &[Self::WaitingForHuman, Self::Completed, Self::Terminated],
            Self::WaitingForHuman => &[Self::Approved, Self::Rejected, Self::Overridden],
            Self::Approved | Self::Overridden => &[Self::Resumed],
            Self::Rejected => &[Self::Terminated],
            Self::Resumed => &[Self::Running],
            Self::Completed | Self::Terminated => &[],
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::WaitingForHuman => "WAITING_FOR_HUMAN",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Overridden => "OVERRIDDEN",
            Self::Resumed => "RESUMED",
            Self::Completed => "COMPLETED",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(label)
    }
}

/// The three kinds of human/machine authority decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    /// Approve the pending instance as-is.
    Approve,
    /// Reject the pending instance.
    Reject,
    /// Approve the pending instance with a modified context.
    Override,
}

impl DecisionType {
    /// The state a successful decision of this type transitions into.
    #[must_use]
    pub const fn next_state(self) -> State {
        match self {
            Self::Approve => State::Approved,
            Self::Reject => State::Rejected,
            Self::Override => State::Overridden,
        }
    }
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::Override => "OVERRIDE",
        };
        f.write_str(label)
    }
}

/// A transition from `from` to `to` is not in the legal matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition from {from} to {to}")]
pub struct InvalidTransition {
    /// The state the transition was attempted from.
    pub from: State,
    /// The state the transition targeted.
    pub to: State,
}

/// Validates a transition from `from` to `to` against the legal matrix.
/// On failure, returns [`InvalidTransition`]; the caller's state is left
/// unchanged either way since this function takes states by value.
///
/// # Errors
/// Returns [`InvalidTransition`] if `(from, to)` is not a legal edge.
pub fn transition(from: State, to: State) -> Result<State, InvalidTransition> {
    if from.legal_targets().contains(&to) {
        Ok(to)
    } else {
        Err(InvalidTransition { from, to })
    }
}
