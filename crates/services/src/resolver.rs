//! Resolution of the one active session for a test.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::debug;

use exam_core::model::{TestId, TestingSession};
use storage::cache::SessionCache;

use crate::error::{GatewayError, ResolveError};
use crate::gateway::{PageRequest, SessionGateway};

/// Whether a resolved session was created by this call or discovered
/// pre-existing. Carried as data so callers can decide whether to prompt
/// the user about resuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    Created,
    Resumed,
}

/// A session together with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSession {
    pub session: TestingSession,
    pub origin: SessionOrigin,
}

const DISCOVERY_PAGE_SIZE: u32 = 50;
const DEFAULT_CREATION_LINGER: Duration = Duration::from_secs(2);

struct SettledCreation {
    session: TestingSession,
    origin: SessionOrigin,
    settled_at: Instant,
}

type CreationSlot = Arc<AsyncMutex<Option<SettledCreation>>>;

/// Discovers or creates the one active session for a test.
///
/// Resolution order: the advisory local cache, then remote discovery, then
/// creation as a last resort. Creation is single-flight per test: callers
/// overlapping an outstanding attempt wait on its slot and share the settled
/// outcome for a short linger window instead of issuing a second create.
#[derive(Clone)]
pub struct SessionResolver {
    gateway: Arc<dyn SessionGateway>,
    cache: Arc<dyn SessionCache>,
    creations: Arc<Mutex<HashMap<TestId, CreationSlot>>>,
    creation_linger: Duration,
}

impl SessionResolver {
    #[must_use]
    pub fn new(gateway: Arc<dyn SessionGateway>, cache: Arc<dyn SessionCache>) -> Self {
        Self {
            gateway,
            cache,
            creations: Arc::new(Mutex::new(HashMap::new())),
            creation_linger: DEFAULT_CREATION_LINGER,
        }
    }

    /// Override how long a settled creation outcome is shared with late
    /// overlapping callers.
    #[must_use]
    pub fn with_creation_linger(mut self, linger: Duration) -> Self {
        self.creation_linger = linger;
        self
    }

    /// Resolve the session to use for a test.
    ///
    /// 1. A cached session id is fetched and used while still in progress;
    ///    stale or vanished entries are purged.
    /// 2. Remote discovery looks for an in-progress session for the test.
    /// 3. Otherwise a session is created; a `Conflict` (lost race against a
    ///    concurrent creation) falls back to one more discovery pass.
    ///
    /// # Errors
    ///
    /// Any non-recovered gateway failure, unchanged. The cache is left
    /// untouched on failure.
    pub async fn resolve(&self, test_id: TestId) -> Result<ResolvedSession, ResolveError> {
        if let Some(session_id) = self.cache.get(test_id) {
            match self.gateway.get(session_id).await {
                Ok(session) if session.is_in_progress() => {
                    return Ok(ResolvedSession {
                        session,
                        origin: SessionOrigin::Resumed,
                    });
                }
                Ok(_) => {
                    debug!(%test_id, %session_id, "cached session is terminal, purging");
                    self.cache.clear(test_id);
                }
                Err(GatewayError::NotFound) => {
                    debug!(%test_id, %session_id, "cached session is gone, purging");
                    self.cache.clear(test_id);
                }
                Err(err) => return Err(err.into()),
            }
        }

        if let Some(session) = self.discover(test_id).await? {
            self.cache.set(test_id, session.id);
            return Ok(ResolvedSession {
                session,
                origin: SessionOrigin::Resumed,
            });
        }

        self.guarded_create(test_id, false).await
    }

    /// Create a fresh session, bypassing the cache and discovery.
    ///
    /// Used after the previous session was explicitly closed (restart). The
    /// `Conflict` fallback still applies in case another tab recreated one
    /// in the meantime.
    ///
    /// # Errors
    ///
    /// Any non-recovered gateway failure, unchanged.
    pub async fn resolve_fresh(&self, test_id: TestId) -> Result<ResolvedSession, ResolveError> {
        self.guarded_create(test_id, true).await
    }

    /// Serialize creation per test id and share settled outcomes briefly.
    ///
    /// `force` skips outcome reuse (restart must mint a new session even if
    /// a previous creation settled moments ago) but still serializes on the
    /// same slot.
    async fn guarded_create(
        &self,
        test_id: TestId,
        force: bool,
    ) -> Result<ResolvedSession, ResolveError> {
        let slot = self.creation_slot(test_id);
        let mut settled = slot.lock().await;

        if !force {
            if let Some(previous) = settled.as_ref() {
                if previous.settled_at.elapsed() <= self.creation_linger {
                    debug!(%test_id, "reusing recently settled session creation");
                    return Ok(ResolvedSession {
                        session: previous.session.clone(),
                        origin: previous.origin,
                    });
                }
            }
        }
        *settled = None;

        let resolved = self.create_or_rediscover(test_id).await?;
        self.cache.set(test_id, resolved.session.id);
        *settled = Some(SettledCreation {
            session: resolved.session.clone(),
            origin: resolved.origin,
            settled_at: Instant::now(),
        });
        Ok(resolved)
    }

    async fn create_or_rediscover(
        &self,
        test_id: TestId,
    ) -> Result<ResolvedSession, ResolveError> {
        match self.gateway.create(test_id).await {
            Ok(session) => Ok(ResolvedSession {
                session,
                origin: SessionOrigin::Created,
            }),
            Err(GatewayError::Conflict) => {
                debug!(%test_id, "session creation conflicted, re-running discovery");
                match self.discover(test_id).await? {
                    Some(session) => Ok(ResolvedSession {
                        session,
                        origin: SessionOrigin::Resumed,
                    }),
                    None => Err(GatewayError::Conflict.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Page through the session listing looking for an in-progress session
    /// of the given test.
    async fn discover(&self, test_id: TestId) -> Result<Option<TestingSession>, ResolveError> {
        let mut offset = 0;
        loop {
            let page = self
                .gateway
                .list(PageRequest {
                    offset,
                    limit: DISCOVERY_PAGE_SIZE,
                })
                .await?;

            let found = page
                .items
                .iter()
                .find(|s| s.test_id == test_id && s.is_in_progress());
            if let Some(session) = found {
                return Ok(Some(session.clone()));
            }

            if page.items.is_empty() {
                return Ok(None);
            }
            offset += page.items.len() as u32;
            if offset >= page.total {
                return Ok(None);
            }
        }
    }

    fn creation_slot(&self, test_id: TestId) -> CreationSlot {
        let mut creations = match self.creations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        creations.entry(test_id).or_default().clone()
    }
}
