use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{QuestionResponse, SessionId, TestId};

/// Lifecycle state of a testing session.
///
/// Transitions only move forward: `InProgress` into `Completed` or `Closed`
/// through an explicit complete/close call, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Closed,
}

impl SessionStatus {
    /// Returns true once the session can no longer be worked on.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Closed)
    }
}

/// Score computed by the remote service when a session completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub correct_count: u32,
    pub total_count: u32,
    pub score_percent: f32,
}

/// One attempt at taking a test, owned by the remote service.
///
/// The client never assigns the identifier and never moves `status` on its
/// own; it only mirrors what gateway calls report back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestingSession {
    pub id: SessionId,
    pub test_id: TestId,
    pub status: SessionStatus,
    #[serde(default)]
    pub responses: Vec<QuestionResponse>,
    pub result: Option<TestResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TestingSession {
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.status == SessionStatus::InProgress
    }

    /// Normalize response ordering by `position`.
    ///
    /// The listing endpoint does not guarantee ordering, so this is applied
    /// once at the resolution boundary.
    pub fn sort_responses(&mut self) {
        self.responses.sort_by_key(|r| r.position);
    }

    /// The response at a given ordering slot, if present.
    #[must_use]
    pub fn response_at(&self, index: usize) -> Option<&QuestionResponse> {
        self.responses.get(index)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
