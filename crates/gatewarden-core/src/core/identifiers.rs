// gatewarden-core/src/core/identifiers.rs
// ============================================================================
// Module: Identifiers
// Description: Opaque newtype wrappers for every identifier kind in the
//              data model.
// Purpose: Prevent accidental mixing of unrelated identifier strings at
//          compile time.
// Dependencies: serde::{Deserialize, Serialize}
// ============================================================================

//! ## Overview
//! Every identifier in the system (instance, artifact, actor, workflow,
//! policy version, decision) is a distinct type even though all are
//! string-backed. This keeps `fn foo(instance: InstanceID, actor:
//! ActorID)` from silently accepting swapped arguments.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a string as this identifier without validation.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true if the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Consumes the wrapper, returning the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(InstanceId, "Stable opaque identifier for one execution instance; also the durable workflow ID.");
string_id!(WorkflowId, "Identifier of the workflow definition driving an instance.");
string_id!(ActorId, "Identifier of the human or machine actor recording a decision.");
string_id!(PolicyVersionId, "Identifier of the policy version evaluated for an instance.");
string_id!(DecisionId, "Identifier of one stored decision row.");
string_id!(ArtifactId, "Hex-encoded SHA-256 self-seal of a commitment artifact's canonical payload.");

/// The sentinel genesis value for [`ArtifactId`]: 64 ASCII zeros.
pub const GENESIS_ARTIFACT_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

impl ArtifactId {
    /// Returns the genesis sentinel (64 zero characters), used as the
    /// `prev_artifact_hash` of the first artifact in a chain when the
    /// caller prefers an explicit sentinel over an empty string.
    #[must_use]
    pub fn genesis() -> Self {
        Self(GENESIS_ARTIFACT_HASH.to_owned())
    }

    /// Returns true if this is the empty string or the genesis sentinel.
    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.0.is_empty() || self.0 == GENESIS_ARTIFACT_HASH
    }
}
