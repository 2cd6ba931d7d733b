//! Local advisory cache mapping tests to their last known session.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, warn};

use exam_core::model::{SessionId, TestId};

/// Advisory mapping from a test to the session last used for it.
///
/// This is a hint, not a source of truth: a returned id may point at a
/// session that has since completed or disappeared, so callers must validate
/// it against the remote service before trusting it. The contract is
/// infallible on purpose; a cache that cannot be read behaves as empty.
pub trait SessionCache: Send + Sync {
    /// The cached session for a test, if any.
    fn get(&self, test_id: TestId) -> Option<SessionId>;

    /// Remember the session in use for a test.
    fn set(&self, test_id: TestId, session_id: SessionId);

    /// Forget the cached session for a test.
    fn clear(&self, test_id: TestId);
}

/// File-backed cache holding one namespaced JSON object
/// `{ "<testId>": "<sessionId>" }`.
///
/// The record is read lazily on first access and rewritten in full on each
/// mutation. Absent or malformed data degrades to an empty map. Concurrent
/// writers are last-writer-wins, which is acceptable for an advisory hint.
pub struct FileSessionCache {
    path: PathBuf,
    entries: Mutex<Option<HashMap<TestId, SessionId>>>,
}

impl FileSessionCache {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    /// Cache under the per-user data directory (`<data>/examtrail/active_sessions.json`).
    #[must_use]
    pub fn default_location() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("examtrail");
        Self::new(base.join("active_sessions.json"))
    }

    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn load(&self) -> HashMap<TestId, SessionId> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no session cache file yet");
                return HashMap::new();
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed to read session cache");
                return HashMap::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(map) => map,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "malformed session cache, starting empty");
                HashMap::new()
            }
        }
    }

    /// Rewrite the whole record through a temp file and rename.
    fn persist(&self, entries: &HashMap<TestId, SessionId>) {
        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), %err, "failed to create cache directory");
                return;
            }
        }

        let json = match serde_json::to_vec_pretty(entries) {
            Ok(json) => json,
            Err(err) => {
                warn!(%err, "failed to encode session cache");
                return;
            }
        };

        let tmp = self.path.with_extension("json.tmp");
        if let Err(err) = fs::write(&tmp, json) {
            warn!(path = %tmp.display(), %err, "failed to write session cache");
            return;
        }
        if let Err(err) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            warn!(path = %self.path.display(), %err, "failed to replace session cache");
        }
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<TestId, SessionId>) -> R) -> R {
        let mut guard = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entries = guard.get_or_insert_with(|| self.load());
        f(entries)
    }
}

impl SessionCache for FileSessionCache {
    fn get(&self, test_id: TestId) -> Option<SessionId> {
        self.with_entries(|entries| entries.get(&test_id).copied())
    }

    fn set(&self, test_id: TestId, session_id: SessionId) {
        self.with_entries(|entries| {
            entries.insert(test_id, session_id);
            debug!(%test_id, %session_id, "cached session for test");
            self.persist(entries);
        });
    }

    fn clear(&self, test_id: TestId) {
        self.with_entries(|entries| {
            if entries.remove(&test_id).is_some() {
                debug!(%test_id, "purged cached session");
                self.persist(entries);
            }
        });
    }
}

/// In-memory cache for testing and prototyping.
#[derive(Clone, Default)]
pub struct MemorySessionCache {
    entries: std::sync::Arc<Mutex<HashMap<TestId, SessionId>>>,
}

impl MemorySessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionCache for MemorySessionCache {
    fn get(&self, test_id: TestId) -> Option<SessionId> {
        match self.entries.lock() {
            Ok(guard) => guard.get(&test_id).copied(),
            Err(poisoned) => poisoned.into_inner().get(&test_id).copied(),
        }
    }

    fn set(&self, test_id: TestId, session_id: SessionId) {
        match self.entries.lock() {
            Ok(mut guard) => {
                guard.insert(test_id, session_id);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(test_id, session_id);
            }
        }
    }

    fn clear(&self, test_id: TestId) {
        match self.entries.lock() {
            Ok(mut guard) => {
                guard.remove(&test_id);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(&test_id);
            }
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
