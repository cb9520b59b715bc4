use crate::{
    schema::{Field, FieldKind},
    FlowError,
};
use codeverse_genai::{Message, Part};
use serde::{Deserialize, Serialize};

/// A multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl QuizQuestion {
    pub const MIN_OPTIONS: usize = 3;
    pub const MAX_OPTIONS: usize = 4;

    /// A question is kept only if it has text, 3 or 4 options, and its
    /// correct answer is one of them.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.question.trim().is_empty()
            && (Self::MIN_OPTIONS..=Self::MAX_OPTIONS).contains(&self.options.len())
            && self.options.iter().any(|option| option == &self.correct_answer)
    }

    pub(crate) fn field_kind() -> FieldKind {
        FieldKind::Object(vec![
            Field::string("question", "The question text."),
            Field::array(
                "options",
                FieldKind::String,
                "Three or four answer options.",
            )
            .items_between(Self::MIN_OPTIONS, Self::MAX_OPTIONS),
            Field::string(
                "correctAnswer",
                "The correct answer. Must exactly match one of the options.",
            ),
        ])
    }
}

/// Keep the well-formed questions, in order, up to `limit`.
pub(crate) fn retain_well_formed(questions: Vec<QuizQuestion>, limit: usize) -> Vec<QuizQuestion> {
    let total = questions.len();
    let kept: Vec<QuizQuestion> = questions
        .into_iter()
        .filter(QuizQuestion::is_well_formed)
        .take(limit)
        .collect();
    if kept.len() < total.min(limit) {
        tracing::debug!(total, kept = kept.len(), "discarded malformed quiz questions");
    }
    kept
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub content_type: String,
    /// An `http(s)` URL or a `data:` URI.
    pub url: String,
}

/// A piece of a chat message. At least one of `text` and `media` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            media: None,
        }
    }

    pub fn media(content_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: None,
            media: Some(Media {
                content_type: content_type.into(),
                url: url.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: Vec<MessagePart>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: vec![MessagePart::text(text)],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: vec![MessagePart::text(text)],
        }
    }
}

impl TryFrom<ChatMessage> for Message {
    type Error = FlowError;

    fn try_from(message: ChatMessage) -> Result<Self, Self::Error> {
        let mut parts = Vec::with_capacity(message.content.len());
        for part in message.content {
            if part.text.is_none() && part.media.is_none() {
                return Err(FlowError::InvalidInput(
                    "message part must have text or media".to_string(),
                ));
            }
            if let Some(text) = part.text {
                parts.push(Part::text(text));
            }
            if let Some(media) = part.media {
                parts.push(Part::media(media.content_type, media.url));
            }
        }
        if parts.is_empty() {
            return Err(FlowError::InvalidInput(
                "message must have at least one part".to_string(),
            ));
        }

        Ok(match message.role {
            ChatRole::User => Self::user(parts),
            ChatRole::Model => Self::assistant(parts),
        })
    }
}

/// A quiz saved through the [`QuizStore`](crate::QuizStore).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuiz {
    pub quiz_id: String,
    pub question_count: usize,
}

/// Result envelope for UI callers of the quiz flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizGenerationOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<GeneratedQuiz, FlowError>> for QuizGenerationOutcome {
    fn from(result: Result<GeneratedQuiz, FlowError>) -> Self {
        match result {
            Ok(quiz) => Self {
                success: true,
                quiz_id: Some(quiz.quiz_id),
                error: None,
            },
            Err(error) => Self {
                success: false,
                quiz_id: None,
                error: Some(error.to_string()),
            },
        }
    }
}
