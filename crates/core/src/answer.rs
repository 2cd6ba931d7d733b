//! Pure answer-selection logic for single- and multiple-choice questions.

use crate::error::AnswerError;
use crate::model::{QuestionContent, QuestionResponse};

impl QuestionContent {
    /// Apply a selection to the option with the given index.
    ///
    /// - Single-choice: the targeted option becomes selected and every other
    ///   option is cleared. Re-selecting the already-selected option is a
    ///   no-op rather than a deselect.
    /// - Multiple-choice: only the targeted option's flag is inverted.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::UnknownOption` if no option carries the index.
    pub fn select(&mut self, option_index: u32) -> Result<(), AnswerError> {
        if !self.options().iter().any(|o| o.index == option_index) {
            return Err(AnswerError::UnknownOption {
                index: option_index,
            });
        }

        let multiple = self.is_multiple();
        for option in self.options_mut() {
            if option.index == option_index {
                if multiple {
                    option.is_selected = !option.is_selected;
                } else {
                    option.is_selected = true;
                }
            } else if !multiple {
                option.is_selected = false;
            }
        }
        Ok(())
    }

    /// True iff at least one option is selected.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.options().iter().any(|o| o.is_selected)
    }
}

/// Ordering slot the user should land on when re-entering a session.
///
/// The first unanswered question in order, or the last question when every
/// question already has a selection, so a finished-but-unsubmitted session
/// reopens on the final answer for review.
#[must_use]
pub fn initial_resume_index(responses: &[QuestionResponse]) -> usize {
    responses
        .iter()
        .position(|r| !r.content.is_answered())
        .unwrap_or_else(|| responses.len().saturating_sub(1))
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
