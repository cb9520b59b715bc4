use crate::{
    schema::{decode_record, FlowSchema},
    tool::FlowTool,
    FlowError,
};
use codeverse_genai::{
    BoxedStream, ContentDelta, LanguageModel, LanguageModelError, LanguageModelInput, Message,
    ModelResponse, Part, PartDelta, PartialModelResponse, ResponseFormatJson,
    ResponseFormatOption, Tool, ToolCallPart, ToolResultPart,
};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_MAX_TOOL_TURNS: usize = 5;

/// Text chunks of a streamed response. A failure is the last item.
pub type TextStream = BoxedStream<'static, Result<String, FlowError>>;

/// Generation settings applied to every request a client sends.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    /// How many rounds of tool calls the model may make before the request
    /// fails.
    pub max_tool_turns: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: None,
            max_output_tokens: None,
            max_tool_turns: DEFAULT_MAX_TOOL_TURNS,
        }
    }
}

/// A single-prompt generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub tools: Vec<Arc<dyn FlowTool>>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    #[must_use]
    pub fn tool(mut self, tool: Arc<dyn FlowTool>) -> Self {
        self.tools.push(tool);
        self
    }
}

/// Invokes a [`LanguageModel`] in structured, text, streaming and
/// tool-augmented modes. Cheap to clone; construct one and pass it to
/// [`Flows`](crate::Flows).
#[derive(Clone)]
pub struct GenerativeClient {
    model: Arc<dyn LanguageModel>,
    settings: GenerationSettings,
}

impl GenerativeClient {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            settings: GenerationSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    /// Ask for JSON conforming to `T`'s schema, then validate and decode it.
    pub async fn generate_structured<T>(&self, request: GenerateRequest) -> Result<T, FlowError>
    where
        T: DeserializeOwned + FlowSchema,
    {
        let schema = T::schema();
        let json_schema = schema.to_json_schema();

        // Gemini rejects function calling combined with a JSON response type,
        // so with tools bound the schema travels in the prompt instead.
        let (prompt, response_format) = if request.tools.is_empty() {
            let format = ResponseFormatOption::Json(ResponseFormatJson {
                name: schema.name.to_string(),
                description: (!schema.description.is_empty())
                    .then(|| schema.description.to_string()),
                schema: Some(json_schema),
            });
            (request.prompt, Some(format))
        } else {
            let prompt = format!(
                "{}\n\nOutput should be in JSON format and conform to the following schema:\n\n```\n{}\n```",
                request.prompt, json_schema
            );
            (prompt, None)
        };

        debug!(schema = schema.name, "requesting structured output");
        let response = self
            .run(request.system_prompt, prompt, &request.tools, response_format)
            .await?;

        let value = parse_json_output(&response.text())?;
        decode_record(value)
    }

    /// Plain text generation for host-defined prompts. The result is trimmed
    /// and must not be empty.
    pub async fn generate_text(&self, request: GenerateRequest) -> Result<String, FlowError> {
        let response = self
            .run(request.system_prompt, request.prompt, &request.tools, None)
            .await?;

        let text = response.text().trim().to_string();
        if text.is_empty() {
            return Err(FlowError::EmptyResult(
                "the model returned no text".to_string(),
            ));
        }
        Ok(text)
    }

    /// Stream the reply to a conversation as text chunks, in emission order.
    /// Errors, whether the stream fails to start or breaks midway, arrive as
    /// the final item.
    pub async fn stream_text(
        &self,
        system_prompt: Option<String>,
        messages: Vec<Message>,
    ) -> TextStream {
        let input = self.input(system_prompt, messages, None, None);
        let started = self.model.stream(input).await;

        let stream = async_stream::stream! {
            match started {
                Err(error) => {
                    yield Err(map_model_error(error));
                }
                Ok(mut model_stream) => {
                    while let Some(item) = model_stream.next().await {
                        match item {
                            Ok(PartialModelResponse {
                                delta: Some(ContentDelta {
                                    part: PartDelta::Text(delta),
                                    ..
                                }),
                                ..
                            }) => {
                                if !delta.text.is_empty() {
                                    yield Ok(delta.text);
                                }
                            }
                            Ok(_) => {}
                            Err(error) => {
                                warn!(error = %error, "model stream failed");
                                yield Err(map_model_error(error));
                                break;
                            }
                        }
                    }
                }
            }
        };

        BoxedStream::from_stream(stream)
    }

    fn input(
        &self,
        system_prompt: Option<String>,
        messages: Vec<Message>,
        tools: Option<Vec<Tool>>,
        response_format: Option<ResponseFormatOption>,
    ) -> LanguageModelInput {
        LanguageModelInput {
            system_prompt,
            messages,
            tools,
            response_format,
            max_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
            ..LanguageModelInput::default()
        }
    }

    /// Generate, executing tool calls until the model answers without one.
    async fn run(
        &self,
        system_prompt: Option<String>,
        prompt: String,
        tools: &[Arc<dyn FlowTool>],
        response_format: Option<ResponseFormatOption>,
    ) -> Result<ModelResponse, FlowError> {
        let declared_tools: Option<Vec<Tool>> = (!tools.is_empty())
            .then(|| tools.iter().map(|tool| Tool::from(tool.as_ref())).collect());
        let max_tool_turns = self.settings.max_tool_turns;

        let mut messages = vec![Message::user(vec![Part::text(prompt)])];

        for turn in 0..=max_tool_turns {
            let input = self.input(
                system_prompt.clone(),
                messages.clone(),
                declared_tools.clone(),
                response_format.clone(),
            );
            let response = self.model.generate(input).await.map_err(map_model_error)?;

            let tool_calls: Vec<ToolCallPart> =
                response.tool_calls().into_iter().cloned().collect();
            if tool_calls.is_empty() {
                return Ok(response);
            }
            if turn == max_tool_turns {
                break;
            }

            debug!(turn, count = tool_calls.len(), "executing tool calls");
            messages.push(Message::assistant(response.content));

            let mut results = Vec::with_capacity(tool_calls.len());
            for tool_call in tool_calls {
                results.push(execute_tool(tools, tool_call).await?);
            }
            messages.push(Message::tool(results));
        }

        Err(FlowError::GenerationFailed(format!(
            "the model was still calling tools after {max_tool_turns} turns"
        )))
    }
}

impl std::fmt::Debug for GenerativeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeClient")
            .field("provider", &self.model.provider())
            .field("model_id", &self.model.model_id())
            .field("settings", &self.settings)
            .finish()
    }
}

async fn execute_tool(
    tools: &[Arc<dyn FlowTool>],
    tool_call: ToolCallPart,
) -> Result<ToolResultPart, FlowError> {
    let ToolCallPart {
        tool_call_id,
        tool_name,
        args,
    } = tool_call;

    let tool = tools
        .iter()
        .find(|tool| tool.name() == tool_name)
        .ok_or_else(|| {
            FlowError::GenerationFailed(format!("the model called unknown tool `{tool_name}`"))
        })?;

    debug!(tool = %tool_name, "executing tool");
    match tool.execute(args).await {
        Ok(output) => Ok(ToolResultPart::new(
            tool_call_id,
            tool_name,
            vec![Part::text(output)],
        )),
        Err(error) => {
            warn!(tool = %tool_name, error = %error, "tool execution failed");
            Ok(
                ToolResultPart::new(tool_call_id, tool_name, vec![Part::text(error.to_string())])
                    .with_is_error(true),
            )
        }
    }
}

fn map_model_error(error: LanguageModelError) -> FlowError {
    match error {
        LanguageModelError::Refusal(reason) => {
            FlowError::GenerationFailed(format!("the model declined to respond: {reason}"))
        }
        other => FlowError::LanguageModel(other),
    }
}

/// Parse model output as JSON, tolerating a surrounding markdown code fence
/// or prose around a single object.
pub(crate) fn parse_json_output(text: &str) -> Result<Value, FlowError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FlowError::GenerationFailed(
            "the model returned an empty response".to_string(),
        ));
    }

    let body = strip_code_fence(trimmed);
    match serde_json::from_str::<Value>(body) {
        Ok(value) => Ok(value),
        Err(error) => match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str::<Value>(&body[start..=end])
            }
            _ => Err(error),
        }
        .map_err(|error| {
            FlowError::GenerationFailed(format!("the model returned unparsable output: {error}"))
        }),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string, e.g. "json".
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_json() {
        assert_eq!(
            parse_json_output(r#"{"hint": "check the loop bound"}"#).unwrap(),
            json!({ "hint": "check the loop bound" })
        );
    }

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"explanation\": \"prints hi\"}\n```";
        assert_eq!(
            parse_json_output(text).unwrap(),
            json!({ "explanation": "prints hi" })
        );

        let text = "```\n{\"a\": 1}\n```\n";
        assert_eq!(parse_json_output(text).unwrap(), json!({ "a": 1 }));
    }

    #[test]
    fn parses_object_wrapped_in_prose() {
        let text = "Here is the result:\n{\"feedback\": \"good\"}\nHope it helps.";
        assert_eq!(
            parse_json_output(text).unwrap(),
            json!({ "feedback": "good" })
        );
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(
            parse_json_output("  \n"),
            Err(FlowError::GenerationFailed(_))
        ));
        assert!(matches!(
            parse_json_output("I cannot help with that."),
            Err(FlowError::GenerationFailed(_))
        ));
    }
}
