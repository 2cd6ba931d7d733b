//! Session state machine: navigation, persistence timing, resume/restart.

use std::sync::Arc;

use tracing::debug;

use exam_core::initial_resume_index;
use exam_core::model::{
    QuestionResponse, SessionStatus, TestId, TestResult, TestingSession,
};
use storage::cache::SessionCache;

use crate::error::{ControllerError, GatewayError};
use crate::gateway::SessionGateway;
use crate::resolver::{ResolvedSession, SessionOrigin, SessionResolver};

/// Where the user entered the test from.
///
/// `SessionList` is an explicit continuation: the resume prompt is skipped
/// and the user lands directly on the next open question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryPoint {
    #[default]
    Catalogue,
    SessionList,
}

/// Controller states. `Saving`, `Completing` and `Restarting` are transient:
/// they are only ever observed while the corresponding remote call is in
/// flight, and a failed call rolls back to the prior non-transient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Resolving,
    AwaitingResumeChoice,
    Active { index: usize },
    Saving { index: usize },
    Completing,
    Restarting,
    Completed,
    Closed,
    Failed,
}

impl ControllerState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Closed)
    }
}

/// Outcome of a forward navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Snapshot persisted, now on the next question.
    Advanced { index: usize },
    /// Final question persisted and the session completed.
    Completed,
    /// The current question has no selection; nothing was sent remotely.
    Rejected,
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

/// Drives one user's run through a test.
///
/// All methods take `&mut self`, so a persistence call for question `i`
/// settles before `Active(i + 1)` can be entered; writes never race ahead of
/// navigation. Dropping the controller (view teardown) drops any in-flight
/// future with it, so a late result is never applied to stale state.
pub struct SessionController {
    test_id: TestId,
    entry: EntryPoint,
    resolver: SessionResolver,
    gateway: Arc<dyn SessionGateway>,
    cache: Arc<dyn SessionCache>,
    state: ControllerState,
    session: Option<TestingSession>,
}

impl SessionController {
    #[must_use]
    pub fn new(
        test_id: TestId,
        resolver: SessionResolver,
        gateway: Arc<dyn SessionGateway>,
        cache: Arc<dyn SessionCache>,
    ) -> Self {
        Self {
            test_id,
            entry: EntryPoint::default(),
            resolver,
            gateway,
            cache,
            state: ControllerState::Resolving,
            session: None,
        }
    }

    #[must_use]
    pub fn test_id(&self) -> TestId {
        self.test_id
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    #[must_use]
    pub fn session(&self) -> Option<&TestingSession> {
        self.session.as_ref()
    }

    /// The computed result, present once the session completed.
    #[must_use]
    pub fn result(&self) -> Option<&TestResult> {
        self.session.as_ref()?.result.as_ref()
    }

    /// The question currently shown, while on one.
    #[must_use]
    pub fn current_question(&self) -> Option<&QuestionResponse> {
        let index = match self.state {
            ControllerState::Active { index } | ControllerState::Saving { index } => index,
            _ => return None,
        };
        self.session.as_ref()?.responses.get(index)
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let responses = self
            .session
            .as_ref()
            .map_or(&[][..], |s| s.responses.as_slice());
        let total = responses.len();
        let answered = responses
            .iter()
            .filter(|r| r.content.is_answered())
            .count();
        SessionProgress {
            total,
            answered,
            remaining: total - answered,
            is_complete: self.state == ControllerState::Completed,
        }
    }

    /// Resolve a session and enter the test.
    ///
    /// A freshly created session, or any entry from the session list, goes
    /// straight to the open question. A discovered session entered from the
    /// catalogue pauses on the resume/restart choice instead.
    ///
    /// # Errors
    ///
    /// Resolution failures move the controller to `Failed`; `retry` re-runs
    /// resolution from there.
    pub async fn start(&mut self, entry: EntryPoint) -> Result<(), ControllerError> {
        self.entry = entry;
        self.state = ControllerState::Resolving;
        let resolved = match self.resolver.resolve(self.test_id).await {
            Ok(resolved) => resolved,
            Err(err) => {
                self.state = ControllerState::Failed;
                return Err(err.into());
            }
        };
        self.enter_resolved(resolved)
    }

    /// Re-run resolution after a failure.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::NotFailed` unless the controller is in the
    /// `Failed` state; otherwise behaves like `start`.
    pub async fn retry(&mut self) -> Result<(), ControllerError> {
        if self.state != ControllerState::Failed {
            return Err(ControllerError::NotFailed);
        }
        self.start(self.entry).await
    }

    /// Continue the pending session where the user left off. Purely local.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::NoChoicePending` outside the resume prompt.
    pub fn resume(&mut self) -> Result<usize, ControllerError> {
        if self.state != ControllerState::AwaitingResumeChoice {
            return Err(ControllerError::NoChoicePending);
        }
        let session = self
            .session
            .as_ref()
            .ok_or(ControllerError::NoChoicePending)?;
        let index = initial_resume_index(&session.responses);
        self.state = ControllerState::Active { index };
        Ok(index)
    }

    /// Discard the pending session and start the test over.
    ///
    /// Closes the current session remotely, forgets its cache entry, forces
    /// a fresh creation and lands on question 0. A failure rolls back to the
    /// resume prompt with local state intact.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::NoChoicePending` outside the resume prompt,
    /// or a retryable gateway error.
    pub async fn restart(&mut self) -> Result<(), ControllerError> {
        if self.state != ControllerState::AwaitingResumeChoice {
            return Err(ControllerError::NoChoicePending);
        }
        let previous_id = self
            .session
            .as_ref()
            .ok_or(ControllerError::NoChoicePending)?
            .id;

        self.state = ControllerState::Restarting;
        match self.gateway.close(previous_id).await {
            // a session that already vanished remotely needs no closing
            Ok(()) | Err(GatewayError::NotFound) => {}
            Err(err) => {
                self.state = ControllerState::AwaitingResumeChoice;
                return Err(err.into());
            }
        }
        self.cache.clear(self.test_id);
        debug!(test_id = %self.test_id, %previous_id, "closed session for restart");

        match self.resolver.resolve_fresh(self.test_id).await {
            Ok(resolved) => {
                let mut session = resolved.session;
                session.sort_responses();
                if session.responses.is_empty() {
                    self.state = ControllerState::Failed;
                    return Err(ControllerError::EmptySession);
                }
                self.session = Some(session);
                self.state = ControllerState::Active { index: 0 };
                Ok(())
            }
            Err(err) => {
                self.state = ControllerState::AwaitingResumeChoice;
                Err(err.into())
            }
        }
    }

    /// Apply a selection to the current question. Purely local; persistence
    /// happens on forward navigation.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::NotActive` outside an active question, or
    /// `AnswerError` for an unknown option index.
    pub fn select_option(&mut self, option_index: u32) -> Result<(), ControllerError> {
        let ControllerState::Active { index } = self.state else {
            return Err(ControllerError::NotActive);
        };
        let session = self.session.as_mut().ok_or(ControllerError::NotActive)?;
        let response = session
            .responses
            .get_mut(index)
            .ok_or(ControllerError::NotActive)?;
        response.content.select(option_index)?;
        Ok(())
    }

    /// Move forward past the current question.
    ///
    /// An unanswered question is rejected locally and nothing is sent. An
    /// answered non-final question persists the full snapshot and advances;
    /// the final question persists, completes the session remotely and
    /// purges the cache entry.
    ///
    /// # Errors
    ///
    /// Gateway failures roll back to the same question and are retryable;
    /// local edits are preserved.
    pub async fn advance(&mut self) -> Result<AdvanceOutcome, ControllerError> {
        let ControllerState::Active { index } = self.state else {
            return Err(ControllerError::NotActive);
        };
        let session = self.session.as_ref().ok_or(ControllerError::NotActive)?;

        let answered = session
            .responses
            .get(index)
            .is_some_and(|r| r.content.is_answered());
        if !answered {
            debug!(index, "blocked forward navigation from unanswered question");
            return Ok(AdvanceOutcome::Rejected);
        }

        let session_id = session.id;
        let snapshot = session.responses.clone();
        let final_question = index + 1 == snapshot.len();

        if !final_question {
            self.state = ControllerState::Saving { index };
            if let Err(err) = self.gateway.update_answers(session_id, &snapshot).await {
                self.state = ControllerState::Active { index };
                return Err(err.into());
            }
            let next = index + 1;
            self.state = ControllerState::Active { index: next };
            return Ok(AdvanceOutcome::Advanced { index: next });
        }

        self.state = ControllerState::Completing;
        if let Err(err) = self.gateway.update_answers(session_id, &snapshot).await {
            self.state = ControllerState::Active { index };
            return Err(err.into());
        }
        match self.gateway.complete(session_id).await {
            Ok(mut completed) => {
                completed.sort_responses();
                self.cache.clear(self.test_id);
                self.session = Some(completed);
                self.state = ControllerState::Completed;
                Ok(AdvanceOutcome::Completed)
            }
            Err(err) => {
                self.state = ControllerState::Active { index };
                Err(err.into())
            }
        }
    }

    /// Step back to the previous question. Purely local; prior edits stay.
    /// On the first question this is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::NotActive` outside an active question.
    pub fn previous(&mut self) -> Result<usize, ControllerError> {
        let ControllerState::Active { index } = self.state else {
            return Err(ControllerError::NotActive);
        };
        let previous = index.saturating_sub(1);
        self.state = ControllerState::Active { index: previous };
        Ok(previous)
    }

    /// Walk away from the session without completing it.
    ///
    /// Closes the session remotely and purges the cache entry. On failure
    /// the controller stays where it was and the error is retryable.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::AlreadyTerminal` once terminal, or
    /// `ControllerError::NotActive` before a session was resolved.
    pub async fn abandon(&mut self) -> Result<(), ControllerError> {
        if self.state.is_terminal() {
            return Err(ControllerError::AlreadyTerminal);
        }
        let allowed = matches!(
            self.state,
            ControllerState::Active { .. } | ControllerState::AwaitingResumeChoice
        );
        if !allowed {
            return Err(ControllerError::NotActive);
        }
        let session_id = self.session.as_ref().ok_or(ControllerError::NotActive)?.id;

        match self.gateway.close(session_id).await {
            Ok(()) | Err(GatewayError::NotFound) => {
                self.cache.clear(self.test_id);
                if let Some(session) = self.session.as_mut() {
                    session.status = SessionStatus::Closed;
                }
                self.state = ControllerState::Closed;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn enter_resolved(&mut self, resolved: ResolvedSession) -> Result<(), ControllerError> {
        let mut session = resolved.session;
        session.sort_responses();
        if session.responses.is_empty() {
            self.state = ControllerState::Failed;
            return Err(ControllerError::EmptySession);
        }

        let direct = resolved.origin == SessionOrigin::Created
            || self.entry == EntryPoint::SessionList;
        let index = initial_resume_index(&session.responses);
        self.session = Some(session);
        self.state = if direct {
            ControllerState::Active { index }
        } else {
            ControllerState::AwaitingResumeChoice
        };
        Ok(())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{AnswerOption, QuestionContent, Test};
    use storage::cache::MemorySessionCache;

    use crate::gateway::InMemoryGateway;

    fn seeded(test_id: TestId) -> (InMemoryGateway, MemorySessionCache, SessionController) {
        let gateway = InMemoryGateway::new();
        gateway.register_test(
            Test {
                id: test_id,
                name: "Unit".into(),
                category: "unit".into(),
                question_count: 2,
                duration_minutes: 5,
            },
            vec![
                QuestionContent::single(
                    "Q1",
                    vec![AnswerOption::new(0, "a"), AnswerOption::new(1, "b")],
                ),
                QuestionContent::single(
                    "Q2",
                    vec![AnswerOption::new(0, "a"), AnswerOption::new(1, "b")],
                ),
            ],
        );
        let cache = MemorySessionCache::new();
        let resolver = SessionResolver::new(
            Arc::new(gateway.clone()),
            Arc::new(cache.clone()),
        );
        let controller = SessionController::new(
            test_id,
            resolver,
            Arc::new(gateway.clone()),
            Arc::new(cache.clone()),
        );
        (gateway, cache, controller)
    }

    #[tokio::test]
    async fn resume_outside_prompt_is_rejected() {
        let (_gateway, _cache, mut controller) = seeded(TestId::random());
        controller.start(EntryPoint::Catalogue).await.unwrap();
        assert!(matches!(controller.state(), ControllerState::Active { index: 0 }));
        assert!(matches!(
            controller.resume(),
            Err(ControllerError::NoChoicePending)
        ));
    }

    #[tokio::test]
    async fn previous_on_first_question_stays_put() {
        let (_gateway, _cache, mut controller) = seeded(TestId::random());
        controller.start(EntryPoint::Catalogue).await.unwrap();
        assert_eq!(controller.previous().unwrap(), 0);
        assert_eq!(controller.state(), ControllerState::Active { index: 0 });
    }

    #[tokio::test]
    async fn select_option_requires_active_state() {
        let (_gateway, _cache, mut controller) = seeded(TestId::random());
        assert!(matches!(
            controller.select_option(0),
            Err(ControllerError::NotActive)
        ));
    }

    #[tokio::test]
    async fn progress_counts_answered_questions() {
        let (_gateway, _cache, mut controller) = seeded(TestId::random());
        controller.start(EntryPoint::Catalogue).await.unwrap();
        controller.select_option(0).unwrap();

        let progress = controller.progress();
        assert_eq!(progress.total, 2);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.remaining, 1);
        assert!(!progress.is_complete);
    }

    #[tokio::test]
    async fn abandon_closes_and_purges() {
        let test_id = TestId::random();
        let (gateway, cache, mut controller) = seeded(test_id);
        controller.start(EntryPoint::Catalogue).await.unwrap();
        let session_id = controller.session().unwrap().id;

        controller.abandon().await.unwrap();
        assert_eq!(controller.state(), ControllerState::Closed);
        assert_eq!(
            gateway.session_status(session_id),
            Some(SessionStatus::Closed)
        );
        assert_eq!(cache.get(test_id), None);
        assert!(matches!(
            controller.abandon().await,
            Err(ControllerError::AlreadyTerminal)
        ));
    }
}
