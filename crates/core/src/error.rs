use thiserror::Error;

/// Errors emitted by answer mutation on a question.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question has no option with index {index}")]
    UnknownOption { index: u32 },
}
