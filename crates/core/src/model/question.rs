use serde::{Deserialize, Serialize};

use crate::model::{QuestionId, TestId};

/// One selectable answer within a question.
///
/// `index` is stable within the owning question and is the handle callers
/// use to select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub index: u32,
    pub text: String,
    pub is_selected: bool,
}

impl AnswerOption {
    #[must_use]
    pub fn new(index: u32, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            is_selected: false,
        }
    }
}

/// Question body plus its selection mode.
///
/// The mode is part of the type rather than a loose string field, so callers
/// never have to default a missing discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuestionContent {
    #[serde(rename = "SINGLE")]
    Single {
        text: String,
        options: Vec<AnswerOption>,
    },
    #[serde(rename = "MULTIPLE")]
    Multiple {
        text: String,
        options: Vec<AnswerOption>,
    },
}

impl QuestionContent {
    #[must_use]
    pub fn single(text: impl Into<String>, options: Vec<AnswerOption>) -> Self {
        Self::Single {
            text: text.into(),
            options,
        }
    }

    #[must_use]
    pub fn multiple(text: impl Into<String>, options: Vec<AnswerOption>) -> Self {
        Self::Multiple {
            text: text.into(),
            options,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Single { text, .. } | Self::Multiple { text, .. } => text,
        }
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        match self {
            Self::Single { options, .. } | Self::Multiple { options, .. } => options,
        }
    }

    #[must_use]
    pub fn options_mut(&mut self) -> &mut [AnswerOption] {
        match self {
            Self::Single { options, .. } | Self::Multiple { options, .. } => options,
        }
    }

    /// Returns true for questions that accept more than one selected option.
    #[must_use]
    pub fn is_multiple(&self) -> bool {
        matches!(self, Self::Multiple { .. })
    }
}

/// A question as it appears inside a session, carrying the user's selections.
///
/// `position` defines the stable question ordering within the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub id: QuestionId,
    pub test_id: TestId,
    pub position: u32,
    pub content: QuestionContent,
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
