mod ids;
mod question;
mod session;

pub use ids::{ParseIdError, QuestionId, SessionId, TestId};
pub use question::{AnswerOption, QuestionContent, QuestionResponse};
pub use session::{SessionStatus, TestResult, TestingSession};
pub use test::Test;
