// gatewarden-store-sqlite/src/store.rs
// ============================================================================
// Module: Instance Store
// Description: Transactional SQLite persistence for instances, decisions,
//              and audit events (C6).
// Purpose: Give every instance/decision/audit-event mutation ACID
//          semantics against a single embedded database file.
// Dependencies: rusqlite::{Connection, params}, gatewarden_core::*
// ============================================================================

//! ## Overview
//! A single `rusqlite::Connection`, opened in WAL mode with a bounded busy
//! timeout, guarded by a `Mutex` so every call observes a consistent view
//! and SQLite's own file locking never has to arbitrate between two
//! connections from this process.
//!
//! # Invariants
//! - `record_decision` inserts the decision row, updates the instance's
//!   `state`/`last_artifact_hash`, and inserts a `DECISION_RECORDED` audit
//!   event inside one transaction.
//! - `create_instance` inserts the instance row and an `INSTANCE_CREATED`
//!   audit event inside one transaction.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use gatewarden_core::ArtifactId;
use gatewarden_core::AuditEvent;
use gatewarden_core::DecisionCommand;
use gatewarden_core::DecisionId;
use gatewarden_core::DecisionRecord;
use gatewarden_core::InstanceId;
use gatewarden_core::PolicyVersionId;
use gatewarden_core::State;
use gatewarden_core::Timestamp;
use gatewarden_core::Value;
use gatewarden_core::WorkflowId;
use gatewarden_core::event_types;
use gatewarden_core::Instance;
use rusqlite::Connection;
use rusqlite::OptionalExtension as _;
use rusqlite::params;

/// The current schema version, stored via `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// The default SQLite busy timeout.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Journal mode for the underlying connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqliteStoreMode {
    /// Write-ahead logging; the default and recommended mode.
    Wal,
    /// The classic rollback journal, for filesystems that don't support WAL.
    Delete,
}

/// Configuration for [`SqliteInstanceStore::open`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// How long to wait on a locked database before giving up.
    pub busy_timeout_ms: u64,
    /// The journal mode to configure on open.
    pub mode: SqliteStoreMode,
}

impl SqliteStoreConfig {
    /// Builds a config pointing at `path` with WAL mode and the default
    /// busy timeout.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            mode: SqliteStoreMode::Wal,
        }
    }
}

/// Errors raised by the instance store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No instance with this ID exists.
    #[error("instance not found: {0}")]
    NotFound(String),
    /// A `DecisionCommand` was missing a required field before persistence.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The underlying SQLite call failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored JSON column could not be decoded.
    #[error("stored payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Transactional persistence of instances, decisions, and audit events.
pub struct SqliteInstanceStore {
    /// The guarded connection; one writer at a time from this process.
    conn: Mutex<Connection>,
}

impl SqliteInstanceStore {
    /// Opens (creating and migrating if necessary) a store at
    /// `config.path`.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] if the database cannot be opened or
    /// configured.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, StoreError> {
        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
        let journal_mode = match config.mode {
            SqliteStoreMode::Wal => "WAL",
            SqliteStoreMode::Delete => "DELETE",
        };
        conn.pragma_update(None, "journal_mode", journal_mode)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens an in-memory store, useful for tests.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] if the in-memory database cannot be
    /// configured.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        let current_version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if current_version >= SCHEMA_VERSION {
            return Ok(());
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS instances (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                state TEXT NOT NULL,
                trigger_context TEXT NOT NULL,
                policy_context TEXT NOT NULL,
                policy_version_id TEXT NOT NULL,
                last_artifact_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS decisions (
                id TEXT PRIMARY KEY,
                instance_id TEXT NOT NULL REFERENCES instances(id),
                decision_type TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                from_state TEXT NOT NULL,
                to_state TEXT NOT NULL,
                artifact_id TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS audit_events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                instance_id TEXT NOT NULL REFERENCES instances(id),
                event_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );",
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// A cheap liveness probe for `GET /healthz`.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] if the connection cannot run a
    /// trivial query.
    pub fn readiness(&self) -> Result<(), StoreError> {
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this store"
        )]
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Inserts `instance` and an `INSTANCE_CREATED` audit event in one
    /// transaction.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] on any constraint violation or I/O
    /// failure.
    pub fn create_instance(&self, instance: &Instance) -> Result<(), StoreError> {
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this store"
        )]
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let trigger_context = serde_json::to_string(&instance.trigger_context)?;
        let policy_context = serde_json::to_string(&instance.policy_context)?;

        tx.execute(
            "INSERT INTO instances
                (id, workflow_id, state, trigger_context, policy_context,
                 policy_version_id, last_artifact_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                instance.id.as_str(),
                instance.workflow_id.as_str(),
                instance.state.to_string(),
                trigger_context,
                policy_context,
                instance.policy_version_id.as_str(),
                instance.last_artifact_hash.as_str(),
                instance.created_at.to_rfc3339(),
                instance.updated_at.to_rfc3339(),
            ],
        )?;

        let payload = serde_json::to_string(&Value::Null)?;
        tx.execute(
            "INSERT INTO audit_events (instance_id, event_type, payload, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                instance.id.as_str(),
                event_types::INSTANCE_CREATED,
                payload,
                instance.created_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Applies an automatic, policy-driven state transition (not a
    /// recorded HITL decision) and records a `STATE_TRANSITIONED` audit
    /// event. Used by the orchestrator to move an instance from `CREATED`
    /// to `RUNNING`, and from `RUNNING` to `WAITING_FOR_HUMAN`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the instance does not exist, or
    /// [`StoreError::InvalidInput`] if `target` is not a legal transition
    /// from the instance's current state.
    pub fn transition_state(
        &self,
        id: &InstanceId,
        target: State,
        now: Timestamp,
    ) -> Result<Instance, StoreError> {
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this store"
        )]
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let current = {
            let mut stmt = tx.prepare(
                "SELECT id, workflow_id, state, trigger_context, policy_context,
                        policy_version_id, last_artifact_hash, created_at, updated_at
                 FROM instances WHERE id = ?1",
            )?;
            stmt.query_row(params![id.as_str()], row_to_instance)
                .optional()?
        }
        .ok_or_else(|| StoreError::NotFound(id.as_str().to_owned()))?;

        gatewarden_core::transition(current.state, target)
            .map_err(|err| StoreError::InvalidInput(err.to_string()))?;

        tx.execute(
            "UPDATE instances SET state = ?1, updated_at = ?2 WHERE id = ?3",
            params![target.to_string(), now.to_rfc3339(), id.as_str()],
        )?;

        let payload = Value::Object(
            [
                ("from_state".to_owned(), Value::String(current.state.to_string())),
                ("to_state".to_owned(), Value::String(target.to_string())),
            ]
            .into_iter()
            .collect(),
        );
        tx.execute(
            "INSERT INTO audit_events (instance_id, event_type, payload, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                id.as_str(),
                event_types::STATE_TRANSITIONED,
                serde_json::to_string(&payload)?,
                now.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        Self::load_instance(&conn, id)
    }

    /// Loads the instance with the given ID.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such instance exists.
    pub fn get_instance(&self, id: &InstanceId) -> Result<Instance, StoreError> {
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this store"
        )]
        let conn = self.conn.lock().unwrap();
        Self::load_instance(&conn, id)
    }

    fn load_instance(conn: &Connection, id: &InstanceId) -> Result<Instance, StoreError> {
        conn.query_row(
            "SELECT id, workflow_id, state, trigger_context, policy_context,
                    policy_version_id, last_artifact_hash, created_at, updated_at
             FROM instances WHERE id = ?1",
            params![id.as_str()],
            row_to_instance,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(id.as_str().to_owned()))
    }

    /// Lists every stored instance, most recently created first.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] on read failure.
    pub fn list_instances(&self) -> Result<Vec<Instance>, StoreError> {
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this store"
        )]
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, workflow_id, state, trigger_context, policy_context,
                    policy_version_id, last_artifact_hash, created_at, updated_at
             FROM instances ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], row_to_instance)?;
        let mut instances = Vec::new();
        for row in rows {
            instances.push(row?);
        }
        Ok(instances)
    }

    /// Records a decision: inserts the decision row, transactionally
    /// advances the instance's `state`/`last_artifact_hash`, and appends a
    /// `DECISION_RECORDED` audit event. Returns the updated instance.
    ///
    /// Expects `cmd.new_artifact_hash` to already be set by the emitter
    /// (C4) — this is the "record" half of the emit-then-persist ordering
    /// invariant; the artifact itself must already be durable in WORM
    /// storage before this is called.
    ///
    /// # Errors
    /// Returns [`StoreError::InvalidInput`] if `cmd.new_artifact_hash` is
    /// unset, [`StoreError::NotFound`] if the instance does not exist, or
    /// [`StoreError::Sqlite`] on any other failure.
    pub fn record_decision(
        &self,
        cmd: &DecisionCommand,
        next_state: State,
        decided_at: Timestamp,
    ) -> Result<Instance, StoreError> {
        let new_artifact_hash = cmd
            .new_artifact_hash
            .clone()
            .ok_or_else(|| StoreError::InvalidInput("new_artifact_hash is unset".to_owned()))?;

        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this store"
        )]
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let current = {
            let mut stmt = tx.prepare(
                "SELECT id, workflow_id, state, trigger_context, policy_context,
                        policy_version_id, last_artifact_hash, created_at, updated_at
                 FROM instances WHERE id = ?1",
            )?;
            stmt.query_row(params![cmd.instance_id.as_str()], row_to_instance)
                .optional()?
        }
        .ok_or_else(|| StoreError::NotFound(cmd.instance_id.as_str().to_owned()))?;

        let decision_id = DecisionId::new(new_artifact_hash.as_str());

        tx.execute(
            "INSERT INTO decisions
                (id, instance_id, decision_type, actor_id, from_state, to_state,
                 artifact_id, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                decision_id.as_str(),
                cmd.instance_id.as_str(),
                cmd.decision_type.to_string(),
                cmd.actor_id.as_str(),
                current.state.to_string(),
                next_state.to_string(),
                new_artifact_hash.as_str(),
                decided_at.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "UPDATE instances
             SET state = ?1, last_artifact_hash = ?2, updated_at = ?3
             WHERE id = ?4",
            params![
                next_state.to_string(),
                new_artifact_hash.as_str(),
                decided_at.to_rfc3339(),
                cmd.instance_id.as_str(),
            ],
        )?;

        let event_payload = Value::Object(
            [
                ("decision_id".to_owned(), Value::String(decision_id.to_string())),
                ("type".to_owned(), Value::String(cmd.decision_type.to_string())),
                ("actor_id".to_owned(), Value::String(cmd.actor_id.to_string())),
                ("from_state".to_owned(), Value::String(current.state.to_string())),
                ("to_state".to_owned(), Value::String(next_state.to_string())),
            ]
            .into_iter()
            .collect(),
        );
        tx.execute(
            "INSERT INTO audit_events (instance_id, event_type, payload, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                cmd.instance_id.as_str(),
                event_types::DECISION_RECORDED,
                serde_json::to_string(&event_payload)?,
                decided_at.to_rfc3339(),
            ],
        )?;

        tx.commit()?;

        Self::load_instance(&conn, &cmd.instance_id)
    }

    /// Returns the decision row written for `artifact_id`, if any.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] on read failure.
    pub fn get_decision_by_artifact(
        &self,
        artifact_id: &ArtifactId,
    ) -> Result<Option<DecisionRecord>, StoreError> {
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this store"
        )]
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, instance_id, decision_type, actor_id, from_state, to_state,
                    artifact_id, timestamp
             FROM decisions WHERE artifact_id = ?1",
            params![artifact_id.as_str()],
            row_to_decision,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Returns every audit event for `instance_id`, in chronological order.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] on read failure, or
    /// [`StoreError::Decode`] if a stored payload is not valid JSON.
    pub fn get_audit_events(&self, instance_id: &InstanceId) -> Result<Vec<AuditEvent>, StoreError> {
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this store"
        )]
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT seq, instance_id, event_type, payload, timestamp
             FROM audit_events WHERE instance_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![instance_id.as_str()], row_to_audit_event)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row??);
        }
        Ok(events)
    }
}

fn row_to_instance(row: &rusqlite::Row<'_>) -> rusqlite::Result<Instance> {
    let state_text: String = row.get(2)?;
    let trigger_context_text: String = row.get(3)?;
    let policy_context_text: String = row.get(4)?;
    let created_at_text: String = row.get(7)?;
    let updated_at_text: String = row.get(8)?;

    Ok(Instance {
        id: InstanceId::new(row.get::<_, String>(0)?),
        workflow_id: WorkflowId::new(row.get::<_, String>(1)?),
        state: parse_state(&state_text),
        trigger_context: serde_json::from_str(&trigger_context_text).unwrap_or(Value::Null),
        policy_context: serde_json::from_str(&policy_context_text).unwrap_or(Value::Null),
        policy_version_id: PolicyVersionId::new(row.get::<_, String>(5)?),
        last_artifact_hash: ArtifactId::new(row.get::<_, String>(6)?),
        created_at: Timestamp::parse(&created_at_text).unwrap_or_else(|_| epoch_timestamp()),
        updated_at: Timestamp::parse(&updated_at_text).unwrap_or_else(|_| epoch_timestamp()),
    })
}

fn row_to_decision(row: &rusqlite::Row<'_>) -> rusqlite::Result<DecisionRecord> {
    let decision_type_text: String = row.get(2)?;
    let from_state_text: String = row.get(4)?;
    let to_state_text: String = row.get(5)?;
    let timestamp_text: String = row.get(7)?;

    Ok(DecisionRecord {
        id: DecisionId::new(row.get::<_, String>(0)?),
        instance_id: InstanceId::new(row.get::<_, String>(1)?),
        decision_type: parse_decision_type(&decision_type_text),
        actor_id: gatewarden_core::ActorId::new(row.get::<_, String>(3)?),
        from_state: parse_state(&from_state_text),
        to_state: parse_state(&to_state_text),
        artifact_id: ArtifactId::new(row.get::<_, String>(6)?),
        timestamp: Timestamp::parse(&timestamp_text).unwrap_or_else(|_| epoch_timestamp()),
    })
}

fn row_to_audit_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<AuditEvent, StoreError>> {
    let seq: i64 = row.get(0)?;
    let instance_id: String = row.get(1)?;
    let event_type: String = row.get(2)?;
    let payload_text: String = row.get(3)?;
    let timestamp_text: String = row.get(4)?;

    let payload = match serde_json::from_str(&payload_text) {
        Ok(value) => value,
        Err(err) => return Ok(Err(StoreError::Decode(err))),
    };

    Ok(Ok(AuditEvent {
        id: format!("evt-{seq}"),
        instance_id: InstanceId::new(instance_id),
        event_type,
        payload,
        timestamp: Timestamp::parse(&timestamp_text).unwrap_or_else(|_| epoch_timestamp()),
    }))
}

fn epoch_timestamp() -> Timestamp {
    #[allow(
        clippy::unwrap_used,
        reason = "the unix epoch is always a valid OffsetDateTime"
    )]
    let raw = time::OffsetDateTime::from_unix_timestamp(0).unwrap();
    Timestamp::from_offset_date_time(raw)
}

fn parse_state(text: &str) -> State {
    match text {
        "CREATED" => State::Created,
        "RUNNING" => State::Running,
        "WAITING_FOR_HUMAN" => State::WaitingForHuman,
        "APPROVED" => State::Approved,
        "REJECTED" => State::Rejected,
        "OVERRIDDEN" => State::Overridden,
        "RESUMED" => State::Resumed,
        "COMPLETED" => State::Completed,
        _ => State::Terminated,
    }
}

fn parse_decision_type(text: &str) -> gatewarden_core::DecisionType {
    match text {
        "APPROVE" => gatewarden_core::DecisionType::Approve,
        "OVERRIDE" => gatewarden_core::DecisionType::Override,
        _ => gatewarden_core::DecisionType::Reject,
    }
}

/// Returns the path the store was opened against, for diagnostics.
#[must_use]
pub fn display_path(path: &Path) -> String {
    path.display().to_string()
}
