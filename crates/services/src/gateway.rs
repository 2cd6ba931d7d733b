//! Remote session gateway contract and an in-memory double.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use exam_core::model::{
    QuestionContent, QuestionId, QuestionResponse, SessionId, SessionStatus, Test, TestId,
    TestResult, TestingSession,
};

use crate::error::GatewayError;

/// Window of results requested from the session listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: u32,
}

/// One window of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u32,
}

/// Backend session API consumed by the resolver and controller.
///
/// The service owns all lifecycle transitions; the client only ever asks.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Create a fresh in-progress session for a test.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Conflict` if an in-progress session for the
    /// (user, test) pair already exists.
    async fn create(&self, test_id: TestId) -> Result<TestingSession, GatewayError>;

    /// Fetch a session by id.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` if absent or not owned by the caller.
    async fn get(&self, id: SessionId) -> Result<TestingSession, GatewayError>;

    /// One page of the caller's sessions.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the listing cannot be fetched.
    async fn list(&self, page: PageRequest) -> Result<Page<TestingSession>, GatewayError>;

    /// Replace the full answer payload of a session.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` for unknown sessions and
    /// `GatewayError::Conflict` for sessions no longer in progress.
    async fn update_answers(
        &self,
        id: SessionId,
        responses: &[QuestionResponse],
    ) -> Result<(), GatewayError>;

    /// Complete a session; the returned session carries the computed result.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` for unknown sessions and
    /// `GatewayError::Conflict` for sessions no longer in progress.
    async fn complete(&self, id: SessionId) -> Result<TestingSession, GatewayError>;

    /// Close a session (restart or abandonment).
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::NotFound` for unknown sessions and
    /// `GatewayError::Conflict` for completed sessions.
    async fn close(&self, id: SessionId) -> Result<(), GatewayError>;
}

#[derive(Default)]
struct GatewayState {
    templates: HashMap<TestId, (Test, Vec<QuestionContent>)>,
    sessions: HashMap<SessionId, TestingSession>,
}

/// In-memory gateway implementation for testing and prototyping.
///
/// Enforces the same invariant as the real service: at most one in-progress
/// session per test. Call counters let tests assert how often the remote
/// side was actually hit.
#[derive(Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<Mutex<GatewayState>>,
    create_calls: Arc<AtomicUsize>,
    list_calls: Arc<AtomicUsize>,
    update_calls: Arc<AtomicUsize>,
}

impl InMemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a test and the question content sessions for it start from.
    pub fn register_test(&self, test: Test, questions: Vec<QuestionContent>) {
        let mut state = self.lock_state();
        state.templates.insert(test.id, (test, questions));
    }

    /// Insert a session directly, bypassing `create`. Useful for seeding
    /// pre-existing state in tests.
    pub fn insert_session(&self, session: TestingSession) {
        let mut state = self.lock_state();
        state.sessions.insert(session.id, session);
    }

    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Current status of a stored session, if present.
    #[must_use]
    pub fn session_status(&self, id: SessionId) -> Option<SessionStatus> {
        self.lock_state().sessions.get(&id).map(|s| s.status)
    }

    fn lock_state(&self) -> MutexGuard<'_, GatewayState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn blank_responses(test_id: TestId, questions: &[QuestionContent]) -> Vec<QuestionResponse> {
        questions
            .iter()
            .enumerate()
            .map(|(position, content)| {
                let mut content = content.clone();
                for option in content.options_mut() {
                    option.is_selected = false;
                }
                QuestionResponse {
                    id: QuestionId::random(),
                    test_id,
                    position: position as u32,
                    content,
                }
            })
            .collect()
    }
}

#[async_trait]
impl SessionGateway for InMemoryGateway {
    async fn create(&self, test_id: TestId) -> Result<TestingSession, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock_state();

        let duplicate = state
            .sessions
            .values()
            .any(|s| s.test_id == test_id && s.is_in_progress());
        if duplicate {
            return Err(GatewayError::Conflict);
        }

        let questions = state
            .templates
            .get(&test_id)
            .map(|(_, questions)| questions.clone())
            .ok_or(GatewayError::NotFound)?;

        let session = TestingSession {
            id: SessionId::random(),
            test_id,
            status: SessionStatus::InProgress,
            responses: Self::blank_responses(test_id, &questions),
            result: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get(&self, id: SessionId) -> Result<TestingSession, GatewayError> {
        self.lock_state()
            .sessions
            .get(&id)
            .cloned()
            .ok_or(GatewayError::NotFound)
    }

    async fn list(&self, page: PageRequest) -> Result<Page<TestingSession>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.lock_state();

        let mut items: Vec<TestingSession> = state.sessions.values().cloned().collect();
        items.sort_by_key(|s| (s.started_at, s.id));
        let total = items.len() as u32;

        let items = items
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();
        Ok(Page { items, total })
    }

    async fn update_answers(
        &self,
        id: SessionId,
        responses: &[QuestionResponse],
    ) -> Result<(), GatewayError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock_state();
        let session = state.sessions.get_mut(&id).ok_or(GatewayError::NotFound)?;
        if !session.is_in_progress() {
            return Err(GatewayError::Conflict);
        }
        session.responses = responses.to_vec();
        Ok(())
    }

    async fn complete(&self, id: SessionId) -> Result<TestingSession, GatewayError> {
        let mut state = self.lock_state();
        let session = state.sessions.get_mut(&id).ok_or(GatewayError::NotFound)?;
        if !session.is_in_progress() {
            return Err(GatewayError::Conflict);
        }

        // The double does not grade; it scores answered questions.
        let total = session.responses.len() as u32;
        let answered = session
            .responses
            .iter()
            .filter(|r| r.content.is_answered())
            .count() as u32;
        let score = if total == 0 {
            0.0
        } else {
            answered as f32 * 100.0 / total as f32
        };

        session.status = SessionStatus::Completed;
        session.completed_at = Some(Utc::now());
        session.result = Some(TestResult {
            correct_count: answered,
            total_count: total,
            score_percent: score,
        });
        Ok(session.clone())
    }

    async fn close(&self, id: SessionId) -> Result<(), GatewayError> {
        let mut state = self.lock_state();
        let session = state.sessions.get_mut(&id).ok_or(GatewayError::NotFound)?;
        match session.status {
            SessionStatus::InProgress | SessionStatus::Closed => {
                session.status = SessionStatus::Closed;
                Ok(())
            }
            SessionStatus::Completed => Err(GatewayError::Conflict),
        }
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::AnswerOption;

    fn sample_test(id: TestId) -> Test {
        Test {
            id,
            name: "Sample".into(),
            category: "general".into(),
            question_count: 2,
            duration_minutes: 10,
        }
    }

    fn sample_questions() -> Vec<QuestionContent> {
        vec![
            QuestionContent::single("Q1", vec![AnswerOption::new(0, "a"), AnswerOption::new(1, "b")]),
            QuestionContent::multiple("Q2", vec![AnswerOption::new(0, "a"), AnswerOption::new(1, "b")]),
        ]
    }

    #[tokio::test]
    async fn create_mints_blank_ordered_responses() {
        let gateway = InMemoryGateway::new();
        let test_id = TestId::random();
        gateway.register_test(sample_test(test_id), sample_questions());

        let session = gateway.create(test_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.responses.len(), 2);
        let positions: Vec<u32> = session.responses.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1]);
        assert!(session.responses.iter().all(|r| !r.content.is_answered()));
    }

    #[tokio::test]
    async fn second_create_for_same_test_conflicts() {
        let gateway = InMemoryGateway::new();
        let test_id = TestId::random();
        gateway.register_test(sample_test(test_id), sample_questions());

        gateway.create(test_id).await.unwrap();
        let err = gateway.create(test_id).await.unwrap_err();
        assert!(matches!(err, GatewayError::Conflict));
    }

    #[tokio::test]
    async fn close_is_idempotent_but_rejects_completed() {
        let gateway = InMemoryGateway::new();
        let test_id = TestId::random();
        gateway.register_test(sample_test(test_id), sample_questions());

        let session = gateway.create(test_id).await.unwrap();
        gateway.close(session.id).await.unwrap();
        gateway.close(session.id).await.unwrap();
        assert_eq!(
            gateway.session_status(session.id),
            Some(SessionStatus::Closed)
        );

        let second = gateway.create(test_id).await.unwrap();
        gateway.complete(second.id).await.unwrap();
        let err = gateway.close(second.id).await.unwrap_err();
        assert!(matches!(err, GatewayError::Conflict));
    }

    #[tokio::test]
    async fn update_answers_replaces_payload() {
        let gateway = InMemoryGateway::new();
        let test_id = TestId::random();
        gateway.register_test(sample_test(test_id), sample_questions());

        let mut session = gateway.create(test_id).await.unwrap();
        session.responses[0].content.select(1).unwrap();
        gateway
            .update_answers(session.id, &session.responses)
            .await
            .unwrap();

        let stored = gateway.get(session.id).await.unwrap();
        assert!(stored.responses[0].content.is_answered());
        assert_eq!(gateway.update_calls(), 1);
    }

    #[tokio::test]
    async fn list_pages_through_sessions() {
        let gateway = InMemoryGateway::new();
        for _ in 0..3 {
            let test_id = TestId::random();
            gateway.register_test(sample_test(test_id), sample_questions());
            gateway.create(test_id).await.unwrap();
        }

        let first = gateway
            .list(PageRequest { offset: 0, limit: 2 })
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.total, 3);

        let rest = gateway
            .list(PageRequest { offset: 2, limit: 2 })
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 1);
    }
}
