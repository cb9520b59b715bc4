use super::api::{
    Blob, Content, FileData, FinishReason as GoogleFinishReason, FunctionCall, FunctionDeclaration,
    FunctionResponse, GenerateContentConfig, GenerateContentParameters, GenerateContentResponse,
    Part as GooglePart, Tool, UsageMetadata,
};
use crate::{
    client_utils, id_utils, opentelemetry, stream_utils, ContentDelta, FinishReason,
    LanguageModel, LanguageModelError, LanguageModelInput, LanguageModelResult,
    LanguageModelStream, MediaPart, Message, ModelResponse, ModelUsage, Part, PartDelta,
    PartialModelResponse, ResponseFormatOption, TextPartDelta, ToolCallPart, ToolCallPartDelta,
};
use async_stream::try_stream;
use futures::StreamExt;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client,
};
use serde_json::json;
use std::collections::HashMap;

const PROVIDER: &str = "google";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini model served from the Generative Language REST API.
pub struct GoogleModel {
    model_id: String,
    api_key: String,
    base_url: String,
    client: Client,
    headers: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct GoogleModelOptions {
    pub api_key: String,
    pub base_url: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub client: Option<Client>,
}

impl GoogleModel {
    #[must_use]
    pub fn new(model_id: impl Into<String>, options: GoogleModelOptions) -> Self {
        let GoogleModelOptions {
            api_key,
            base_url,
            headers,
            client,
        } = options;

        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            model_id: model_id.into(),
            api_key,
            base_url,
            client: client.unwrap_or_default(),
            headers: headers.unwrap_or_default(),
        }
    }

    fn request_headers(&self) -> LanguageModelResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.api_key).map_err(|error| {
            LanguageModelError::InvalidInput(format!("Invalid Google API key: {error}"))
        })?;
        headers.insert(HeaderName::from_static("x-goog-api-key"), api_key);

        for (key, value) in &self.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|error| {
                LanguageModelError::InvalidInput(format!(
                    "Invalid Google header name '{key}': {error}"
                ))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|error| {
                LanguageModelError::InvalidInput(format!(
                    "Invalid Google header value for '{key}': {error}"
                ))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }
}

#[async_trait::async_trait]
impl LanguageModel for GoogleModel {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    async fn generate(&self, input: LanguageModelInput) -> LanguageModelResult<ModelResponse> {
        opentelemetry::trace_generate(PROVIDER, &self.model_id, input, |input| async move {
            let params = convert_to_generate_content_parameters(input)?;
            let url = format!("{}/models/{}:generateContent", self.base_url, self.model_id);
            let headers = self.request_headers()?;

            let response: GenerateContentResponse =
                client_utils::send_json(&self.client, &url, &params, headers).await?;

            map_google_response(response)
        })
        .await
    }

    async fn stream(&self, input: LanguageModelInput) -> LanguageModelResult<LanguageModelStream> {
        opentelemetry::trace_stream(PROVIDER, &self.model_id, input, |input| async move {
            let params = convert_to_generate_content_parameters(input)?;
            let url = format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.base_url, self.model_id
            );
            let headers = self.request_headers()?;

            let mut chunk_stream = client_utils::send_sse_stream::<_, GenerateContentResponse>(
                &self.client,
                &url,
                &params,
                headers,
                PROVIDER,
            )
            .await?;

            let stream = try_stream! {
                let mut all_content_deltas: Vec<ContentDelta> = Vec::new();

                while let Some(chunk) = chunk_stream.next().await {
                    let response = chunk?;
                    let refusal = stream_chunk_refusal(&response);

                    let parts = response
                        .candidates
                        .and_then(|c| c.into_iter().next())
                        .and_then(|candidate| candidate.content)
                        .and_then(|content| content.parts);

                    if let Some(parts) = parts {
                        let incoming = map_google_content_to_delta(parts, &all_content_deltas)?;
                        all_content_deltas.extend(incoming.iter().cloned());

                        for delta in incoming {
                            yield PartialModelResponse {
                                delta: Some(delta),
                                usage: None,
                            };
                        }
                    }

                    if let Some(usage_metadata) = response.usage_metadata {
                        yield PartialModelResponse {
                            delta: None,
                            usage: Some(map_google_usage_metadata(&usage_metadata)),
                        };
                    }

                    // Deltas already yielded stay valid; the block ends the stream.
                    if let Some(error) = refusal {
                        Err(error)?;
                    }
                }
            };

            Ok(LanguageModelStream::from_stream(stream))
        })
        .await
    }
}

fn convert_to_generate_content_parameters(
    input: LanguageModelInput,
) -> LanguageModelResult<GenerateContentParameters> {
    if input.messages.is_empty() {
        return Err(LanguageModelError::InvalidInput(
            "At least one message is required".to_string(),
        ));
    }

    let mut params = GenerateContentParameters {
        contents: convert_to_google_contents(input.messages),
        ..Default::default()
    };

    if let Some(system_prompt) = input.system_prompt {
        params.system_instruction = Some(Content {
            role: None,
            parts: Some(vec![GooglePart {
                text: Some(system_prompt),
                ..Default::default()
            }]),
        });
    }

    if let Some(tools) = input.tools.filter(|tools| !tools.is_empty()) {
        let function_declarations = tools
            .into_iter()
            .map(|tool| FunctionDeclaration {
                name: Some(tool.name),
                description: Some(tool.description),
                parameters_json_schema: Some(tool.parameters),
            })
            .collect();

        params.tools = Some(vec![Tool {
            function_declarations: Some(function_declarations),
        }]);
    }

    let mut config = GenerateContentConfig {
        temperature: input.temperature,
        max_output_tokens: input.max_tokens,
        ..Default::default()
    };

    if let Some(ResponseFormatOption::Json(json_format)) = input.response_format {
        config.response_mime_type = Some("application/json".to_string());
        config.response_json_schema = json_format.schema;
    }

    params.generation_config = Some(config);

    Ok(params)
}

fn convert_to_google_contents(messages: Vec<Message>) -> Vec<Content> {
    messages
        .into_iter()
        .map(|message| {
            let (role, parts) = match message {
                Message::User(user_message) => ("user", user_message.content),
                Message::Assistant(assistant_message) => ("model", assistant_message.content),
                // Function responses are sent back with the user role.
                Message::Tool(tool_message) => ("user", tool_message.content),
            };
            Content {
                role: Some(role.to_string()),
                parts: Some(parts.into_iter().map(convert_to_google_part).collect()),
            }
        })
        .collect()
}

fn convert_to_google_part(part: Part) -> GooglePart {
    match part {
        Part::Text(text_part) => GooglePart {
            text: Some(text_part.text),
            ..Default::default()
        },
        Part::Media(media_part) => convert_media_part(&media_part),
        Part::ToolCall(tool_call_part) => GooglePart {
            function_call: Some(FunctionCall {
                id: Some(tool_call_part.tool_call_id),
                name: Some(tool_call_part.tool_name),
                args: Some(tool_call_part.args),
            }),
            ..Default::default()
        },
        Part::ToolResult(tool_result_part) => GooglePart {
            function_response: Some(FunctionResponse {
                id: Some(tool_result_part.tool_call_id),
                name: Some(tool_result_part.tool_name),
                response: Some(convert_to_google_function_response(
                    tool_result_part.content,
                    tool_result_part.is_error.unwrap_or(false),
                )),
            }),
            ..Default::default()
        },
    }
}

fn convert_media_part(media_part: &MediaPart) -> GooglePart {
    if let Some((mime_type, data)) = media_part.inline_data() {
        GooglePart {
            inline_data: Some(Blob {
                data: Some(data.to_string()),
                mime_type: Some(mime_type.to_string()),
            }),
            ..Default::default()
        }
    } else {
        GooglePart {
            file_data: Some(FileData {
                file_uri: Some(media_part.url.clone()),
                mime_type: Some(media_part.content_type.clone()),
            }),
            ..Default::default()
        }
    }
}

fn convert_to_google_function_response(
    parts: Vec<Part>,
    is_error: bool,
) -> HashMap<String, serde_json::Value> {
    let text: String = parts
        .into_iter()
        .filter_map(|part| match part {
            Part::Text(text_part) => Some(text_part.text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    let value = serde_json::from_str(&text).unwrap_or_else(|_| json!({ "data": text }));
    let key = if is_error { "error" } else { "output" };

    HashMap::from([(key.to_string(), value)])
}

fn map_google_response(response: GenerateContentResponse) -> LanguageModelResult<ModelResponse> {
    let usage = response.usage_metadata.as_ref().map(map_google_usage_metadata);

    let Some(candidate) = response.candidates.and_then(|c| c.into_iter().next()) else {
        return Err(match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => prompt_blocked(&reason),
            None => LanguageModelError::Invariant(PROVIDER, "No candidate in response".to_string()),
        });
    };

    let finish_reason = candidate.finish_reason.map(map_google_finish_reason);
    let content = map_google_content(candidate.content.and_then(|c| c.parts).unwrap_or_default())?;

    if content.is_empty() && finish_reason == Some(FinishReason::Blocked) {
        return Err(response_blocked());
    }

    Ok(ModelResponse {
        content,
        usage,
        finish_reason,
    })
}

/// A streamed chunk that blocks the prompt or stops a candidate for safety
/// ends the stream as a refusal.
fn stream_chunk_refusal(response: &GenerateContentResponse) -> Option<LanguageModelError> {
    match response.candidates.as_ref().and_then(|c| c.first()) {
        None => response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
            .map(prompt_blocked),
        Some(candidate) => candidate
            .finish_reason
            .map(map_google_finish_reason)
            .filter(|reason| *reason == FinishReason::Blocked)
            .map(|_| response_blocked()),
    }
}

fn prompt_blocked(reason: &str) -> LanguageModelError {
    LanguageModelError::Refusal(format!("Prompt blocked: {reason}"))
}

fn response_blocked() -> LanguageModelError {
    LanguageModelError::Refusal("Response blocked by provider safety settings".to_string())
}

fn map_google_finish_reason(reason: GoogleFinishReason) -> FinishReason {
    match reason {
        GoogleFinishReason::Stop => FinishReason::Stop,
        GoogleFinishReason::MaxTokens => FinishReason::MaxTokens,
        GoogleFinishReason::Safety
        | GoogleFinishReason::Blocklist
        | GoogleFinishReason::ProhibitedContent
        | GoogleFinishReason::Spii
        | GoogleFinishReason::ImageSafety
        | GoogleFinishReason::Recitation => FinishReason::Blocked,
        _ => FinishReason::Other,
    }
}

fn map_google_content(parts: Vec<GooglePart>) -> LanguageModelResult<Vec<Part>> {
    parts
        .into_iter()
        .filter_map(|part| {
            if let Some(text) = part.text {
                // Thought summaries are not part of the answer.
                if part.thought.unwrap_or(false) {
                    None
                } else {
                    Some(Ok(Part::text(text)))
                }
            } else if let Some(inline_data) = part.inline_data {
                match (inline_data.data, inline_data.mime_type) {
                    (Some(data), Some(mime_type)) => {
                        let url = format!("data:{mime_type};base64,{data}");
                        Some(Ok(Part::media(mime_type, url)))
                    }
                    _ => Some(Err(LanguageModelError::Invariant(
                        PROVIDER,
                        "Inline data missing data or mime type".to_string(),
                    ))),
                }
            } else if let Some(function_call) = part.function_call {
                match function_call.name {
                    Some(name) => Some(Ok(Part::ToolCall(ToolCallPart {
                        // Gemini does not always return an id.
                        tool_call_id: function_call
                            .id
                            .unwrap_or_else(|| id_utils::generate_string(10)),
                        tool_name: name,
                        args: function_call.args.unwrap_or_else(|| json!({})),
                    }))),
                    None => Some(Err(LanguageModelError::Invariant(
                        PROVIDER,
                        "Function call missing name".to_string(),
                    ))),
                }
            } else {
                None
            }
        })
        .collect()
}

fn map_google_content_to_delta(
    parts: Vec<GooglePart>,
    existing_deltas: &[ContentDelta],
) -> LanguageModelResult<Vec<ContentDelta>> {
    let mut deltas: Vec<ContentDelta> = Vec::new();

    for part in map_google_content(parts)? {
        let part_delta = match part {
            Part::Text(text_part) => PartDelta::Text(TextPartDelta::new(text_part.text)),
            Part::ToolCall(tool_call) => PartDelta::ToolCall(ToolCallPartDelta {
                tool_call_id: Some(tool_call.tool_call_id),
                tool_name: Some(tool_call.tool_name),
                args: Some(tool_call.args.to_string()),
            }),
            Part::Media(_) | Part::ToolResult(_) => {
                return Err(LanguageModelError::Unsupported(
                    PROVIDER,
                    "Streaming media output is not supported".to_string(),
                ));
            }
        };

        let all_content_deltas = existing_deltas.iter().chain(deltas.iter()).collect::<Vec<_>>();
        let index = stream_utils::guess_delta_index(&part_delta, &all_content_deltas);
        deltas.push(ContentDelta {
            index,
            part: part_delta,
        });
    }

    Ok(deltas)
}

fn map_google_usage_metadata(usage: &UsageMetadata) -> ModelUsage {
    ModelUsage {
        input_tokens: usage.prompt_token_count.unwrap_or(0),
        output_tokens: usage.candidates_token_count.unwrap_or(0),
    }
}
