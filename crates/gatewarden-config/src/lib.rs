// gatewarden-config/src/lib.rs
// ============================================================================
// Module: Gatewarden Config Library
// Description: Loads and validates the environment variables the control
//              plane reads at boot.
// Purpose: Single source of truth for `GatewardenConfig` semantics; fail
//          closed on anything malformed rather than booting on a guess.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! `gatewarden-config` resolves the five environment variables named in
//! the external interface contract (`DATABASE_URL`, `TEMPORAL_HOST_PORT`,
//! `TASK_QUEUE`, `ARTIFACT_STORAGE_PATH`, `PORT`) into a validated
//! [`GatewardenConfig`]. Configuration inputs are operator-controlled but
//! still validated strictly: a malformed value fails closed with a
//! [`ConfigError`] rather than silently falling back to a default.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

/// Environment variable carrying the instance/audit store DSN.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Environment variable carrying the durable workflow runtime endpoint.
pub const TEMPORAL_HOST_PORT_VAR: &str = "TEMPORAL_HOST_PORT";
/// Environment variable carrying the workflow task queue name.
pub const TASK_QUEUE_VAR: &str = "TASK_QUEUE";
/// Environment variable carrying the WORM store root directory.
pub const ARTIFACT_STORAGE_PATH_VAR: &str = "ARTIFACT_STORAGE_PATH";
/// Environment variable carrying the HTTP listen port.
pub const PORT_VAR: &str = "PORT";

/// Default task queue name when `TASK_QUEUE` is unset.
const DEFAULT_TASK_QUEUE: &str = "gatewarden-default";
/// Default HTTP listen port when `PORT` is unset.
const DEFAULT_PORT: u16 = 8080;
/// Maximum accepted length for a path-shaped environment variable.
const MAX_PATH_LENGTH: usize = 4096;
/// Maximum accepted length for a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    /// An environment variable was set but empty or whitespace-only.
    #[error("environment variable {0} must not be empty")]
    Empty(&'static str),
    /// A path-shaped environment variable failed length or component
    /// limits.
    #[error("environment variable {var} has an invalid path: {reason}")]
    InvalidPath {
        /// The offending variable name.
        var: &'static str,
        /// Why the path was rejected.
        reason: String,
    },
    /// `PORT` could not be parsed as a `u16`.
    #[error("environment variable {var} is not a valid port: {value}")]
    InvalidPort {
        /// The offending variable name.
        var: &'static str,
        /// The raw value that failed to parse.
        value: String,
    },
}

/// Validated boot-time configuration for the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewardenConfig {
    /// Instance/audit store DSN (`DATABASE_URL`).
    pub database_url: String,
    /// Durable workflow runtime endpoint (`TEMPORAL_HOST_PORT`), if wired
    /// to an external runtime rather than the in-process executor.
    pub temporal_host_port: Option<String>,
    /// Workflow task queue name (`TASK_QUEUE`).
    pub task_queue: String,
    /// WORM store root directory (`ARTIFACT_STORAGE_PATH`).
    pub artifact_storage_path: PathBuf,
    /// HTTP listen port (`PORT`).
    pub port: u16,
}

impl GatewardenConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a required variable is missing or any
    /// variable fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_env(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary lookup function. Exposed
    /// so tests can supply an in-memory environment without mutating the
    /// process-global one.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a required variable is missing or any
    /// variable fails validation.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = require_non_empty(&lookup, DATABASE_URL_VAR)?;
        let artifact_storage_path_raw = require_non_empty(&lookup, ARTIFACT_STORAGE_PATH_VAR)?;
        validate_path_string(ARTIFACT_STORAGE_PATH_VAR, &artifact_storage_path_raw)?;

        let temporal_host_port = match lookup(TEMPORAL_HOST_PORT_VAR) {
            Some(value) if value.trim().is_empty() => return Err(ConfigError::Empty(TEMPORAL_HOST_PORT_VAR)),
            Some(value) => Some(value),
            None => None,
        };

        let task_queue = match lookup(TASK_QUEUE_VAR) {
            Some(value) if value.trim().is_empty() => return Err(ConfigError::Empty(TASK_QUEUE_VAR)),
            Some(value) => value,
            None => DEFAULT_TASK_QUEUE.to_owned(),
        };

        let port = match lookup(PORT_VAR) {
            Some(value) => value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                var: PORT_VAR,
                value,
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            database_url,
            temporal_host_port,
            task_queue,
            artifact_storage_path: PathBuf::from(artifact_storage_path_raw),
            port,
        })
    }
}

impl fmt::Display for GatewardenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GatewardenConfig {{ task_queue: {}, port: {}, artifact_storage_path: {} }}",
            self.task_queue,
            self.port,
            self.artifact_storage_path.display(),
        )
    }
}

fn require_non_empty(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    match lookup(var) {
        None => Err(ConfigError::Missing(var)),
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty(var)),
        Some(value) => Ok(value),
    }
}

fn validate_path_string(var: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.len() > MAX_PATH_LENGTH {
        return Err(ConfigError::InvalidPath {
            var,
            reason: "path exceeds maximum length".to_owned(),
        });
    }
    for component in Path::new(value).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::InvalidPath {
                var,
                reason: "path component exceeds maximum length".to_owned(),
            });
        }
    }
    Ok(())
}
