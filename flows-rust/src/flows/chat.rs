use super::with_context;
use crate::{
    client::GenerativeClient,
    schema::{validate_record, Field, FieldKind, FlowSchema, ObjectSchema, StringFormat},
    types::{ChatMessage, ChatRole},
    FlowError,
};
use bytes::Bytes;
use codeverse_genai::{BoxedStream, Message};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// The tutor's reply as UTF-8 chunks. A failure is the last item; text
/// already yielded stays valid.
pub type ChatStream = BoxedStream<'static, Result<Bytes, FlowError>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatInput {
    /// The conversation so far, oldest first. Must end with a user message.
    pub messages: Vec<ChatMessage>,
}

impl FlowSchema for ChatInput {
    fn schema() -> ObjectSchema {
        let media = FieldKind::Object(vec![
            Field::string("contentType", "MIME type of the media."),
            Field::string("url", "An http(s) URL or a data: URI.").with_format(StringFormat::Uri),
        ]);
        let part = FieldKind::Object(vec![
            Field::string("text", "").optional(),
            Field::new("media", media, "").optional(),
        ]);
        let message = FieldKind::Object(vec![
            Field::enumeration("role", vec!["user", "model"], ""),
            Field::array("content", part, ""),
        ]);
        ObjectSchema::new(
            "ChatInput",
            "",
            vec![Field::array("messages", message, "The conversation so far.")],
        )
    }
}

const SYSTEM_PROMPT: &str = "You are CodeVerse AI, a friendly programming tutor on an online platform for learning to code. Help students understand programming concepts, debug their code and learn good practices. Prefer guiding questions and explanations over handing out complete solutions to exercises. Use markdown, with fenced code blocks for code.";

pub(super) async fn run(client: &GenerativeClient, input: ChatInput) -> Result<ChatStream, FlowError> {
    validate_record(&input)?;
    match input.messages.last() {
        None => {
            return Err(FlowError::InvalidInput(
                "the conversation must not be empty".to_string(),
            ))
        }
        Some(last) if last.role != ChatRole::User => {
            return Err(FlowError::InvalidInput(
                "the last message must come from the user".to_string(),
            ))
        }
        Some(_) => {}
    }

    let messages = input
        .messages
        .into_iter()
        .map(Message::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let text = client
        .stream_text(Some(SYSTEM_PROMPT.to_string()), messages)
        .await;

    Ok(ChatStream::from_stream(text.map(|chunk| {
        chunk
            .map(Bytes::from)
            .map_err(with_context("The chat response failed"))
    })))
}
