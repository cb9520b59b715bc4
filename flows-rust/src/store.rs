use crate::{types::QuizQuestion, BoxedError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A generated quiz ready to be saved under a course topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewQuiz {
    pub topic_id: Uuid,
    pub title: String,
    pub summary: String,
    pub questions: Vec<QuizQuestion>,
}

/// Persistence for generated quizzes. The flow layer never writes anything
/// itself; the host application provides an implementation.
#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Save the quiz and return its identifier.
    async fn create_quiz_for_topic(&self, quiz: NewQuiz) -> Result<String, BoxedError>;
}
