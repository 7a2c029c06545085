// gatewarden-core/src/core/canon.rs
// ============================================================================
// Module: Canonicalizer
// Description: Deterministic, recursive value model and byte encoding for
//              hashing (C1).
// Purpose: Give every structured payload in the system (trigger context,
//          policy context, context snapshots/deltas, artifact payloads) one
//          byte encoding such that semantically equal inputs always produce
//          bit-identical output.
// Dependencies: serde::Serialize, std::collections::BTreeMap
// ============================================================================

//! ## Overview
//! `Value` is a recursive tagged variant deliberately kept separate from
//! `serde_json::Value`: the latter silently maps non-finite floats to
//! `null` during construction, which this system cannot tolerate (NaN and
//! ±infinity must be rejected, not laundered into a valid encoding).
//!
//! # Invariants
//! - Object keys render in ascending byte order (via `BTreeMap<String, _>`).
//! - Whole-valued floats and integers collapse to the same textual form.
//! - `Value::Float` never holds a non-finite or whole-valued number; those
//!   collapse to `Value::Int` or are rejected during construction.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::core::canon_ser::ValueSerializer;

/// A canonical, recursively-ordered value.
///
/// # Invariants
/// - `Object` entries are kept sorted by key via `BTreeMap`.
/// - `Array` entries retain caller-supplied order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The JSON `null` literal.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integral number, rendered without a decimal point.
    Int(i64),
    /// A finite, non-whole-valued number.
    Float(f64),
    /// A UTF-8 string.
    String(String),
    /// An ordered sequence of values.
    Array(Vec<Value>),
    /// A key-sorted mapping of string keys to values.
    Object(BTreeMap<String, Value>),
}

/// Errors raised while building or rendering a [`Value`].
#[derive(Debug, thiserror::Error)]
pub enum CanonError {
    /// A `f32`/`f64` was NaN or ±infinity.
    #[error("non-finite float cannot be canonicalized")]
    NonFiniteFloat,
    /// A map had a non-string key, which canonical JSON cannot represent.
    #[error("map keys must be strings")]
    NonStringKey,
    /// Serde produced a value this encoder has no representation for.
    #[error("unsupported value for canonicalization: {0}")]
    Unsupported(String),
    /// A `serde::Serialize` implementation reported a custom error.
    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for CanonError {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Self::Custom(msg.to_string())
    }
}

impl Value {
    /// Builds a [`Value::Int`] or [`Value::Float`] from an `f64`, rejecting
    /// non-finite input and collapsing whole-valued floats to integers so
    /// that `1.0` and `1` canonicalize identically.
    pub fn from_f64(value: f64) -> Result<Self, CanonError> {
        if !value.is_finite() {
            return Err(CanonError::NonFiniteFloat);
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "bounds are checked before the cast"
        )]
        if value.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&value) {
            return Ok(Self::Int(value as i64));
        }
        Ok(Self::Float(value))
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders this value into canonical UTF-8 bytes.
    #[must_use]
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out.into_bytes()
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Int(i) => {
                use std::fmt::Write as _;
                // Infallible: writing to a String never fails.
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => {
                use std::fmt::Write as _;
                let _ = write!(out, "{f}");
            }
            Self::String(s) => {
                // serde_json's string escaping is itself deterministic and
                // cannot fail for a valid Rust `str`.
                match serde_json::to_string(s) {
                    Ok(encoded) => out.push_str(&encoded),
                    Err(_) => out.push_str("\"\""),
                }
            }
            Self::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            Self::Object(map) => {
                out.push('{');
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    match serde_json::to_string(key) {
                        Ok(encoded) => out.push_str(&encoded),
                        Err(_) => out.push_str("\"\""),
                    }
                    out.push(':');
                    value.write_canonical(out);
                }
                out.push('}');
            }
        }
    }
}

/// Converts any `Serialize` value into a canonical [`Value`] tree,
/// rejecting non-finite floats anywhere in the structure.
pub fn to_canonical_value<T>(value: &T) -> Result<Value, CanonError>
where
    T: Serialize,
{
    value.serialize(ValueSerializer)
}

/// Converts any `Serialize` value directly into canonical bytes.
pub fn canonical_bytes<T>(value: &T) -> Result<Vec<u8>, CanonError>
where
    T: Serialize,
{
    Ok(to_canonical_value(value)?.to_canonical_bytes())
}
