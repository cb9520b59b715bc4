use crate::{
    LanguageModelInput, LanguageModelResult, LanguageModelStream, ModelResponse, ModelUsage,
    PartialModelResponse,
};
use futures::StreamExt;
use opentelemetry::trace::Status;
use std::time::Instant;
use tracing::{info_span, Span};
use tracing_futures::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Span around one model call. Usage and request settings are recorded as
/// `gen_ai.*` attributes when the call ends.
struct ModelCallSpan {
    span: Span,
    usage: Option<ModelUsage>,
    start_time: Instant,
    time_to_first_token: Option<f64>,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    tool_count: usize,
    ended: bool,
}

impl ModelCallSpan {
    fn new(provider: &str, model_id: &str, method: &str, input: &LanguageModelInput) -> Self {
        let span = if method == "stream" {
            info_span!("genai.stream", provider, model_id)
        } else {
            info_span!("genai.generate", provider, model_id)
        };
        span.set_attribute("gen_ai.operation.name", "generate_content");
        span.set_attribute("gen_ai.provider.name", provider.to_string());
        span.set_attribute("gen_ai.request.model", model_id.to_string());

        Self {
            span,
            usage: None,
            start_time: Instant::now(),
            time_to_first_token: None,
            max_tokens: input.max_tokens,
            temperature: input.temperature,
            tool_count: input.tools.as_ref().map_or(0, Vec::len),
            ended: false,
        }
    }

    fn on_response(&mut self, response: &ModelResponse) {
        self.usage.clone_from(&response.usage);
    }

    fn on_stream_partial(&mut self, partial: &PartialModelResponse) {
        if let Some(usage) = &partial.usage {
            // Gemini reports cumulative usage on every chunk.
            self.usage = Some(usage.clone());
        }
        if partial.delta.is_some() && self.time_to_first_token.is_none() {
            self.time_to_first_token = Some(self.start_time.elapsed().as_secs_f64());
        }
    }

    fn on_error(&self, error: &(dyn std::error::Error + 'static)) {
        tracing::warn!(parent: &self.span, error = %error, "model call failed");
        self.span
            .set_attribute("exception.message", error.to_string());
        self.span.set_status(Status::error(error.to_string()));
    }

    fn on_end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        if let Some(usage) = &self.usage {
            self.span
                .set_attribute("gen_ai.usage.input_tokens", i64::from(usage.input_tokens));
            self.span
                .set_attribute("gen_ai.usage.output_tokens", i64::from(usage.output_tokens));
        }
        if let Some(time_to_first_token) = self.time_to_first_token {
            self.span
                .set_attribute("gen_ai.server.time_to_first_token", time_to_first_token);
        }
        if let Some(max_tokens) = self.max_tokens {
            self.span
                .set_attribute("gen_ai.request.max_tokens", i64::from(max_tokens));
        }
        if let Some(temperature) = self.temperature {
            self.span
                .set_attribute("gen_ai.request.temperature", temperature);
        }
        if self.tool_count > 0 {
            self.span.set_attribute(
                "genai.request.tool_count",
                i64::try_from(self.tool_count).unwrap_or(i64::MAX),
            );
        }

        tracing::debug!(
            parent: &self.span,
            elapsed_ms = self.start_time.elapsed().as_millis(),
            "model call finished"
        );
    }
}

impl Drop for ModelCallSpan {
    fn drop(&mut self) {
        self.on_end();
    }
}

pub async fn trace_generate<F, Fut>(
    provider: &str,
    model_id: &str,
    input: LanguageModelInput,
    f: F,
) -> LanguageModelResult<ModelResponse>
where
    F: FnOnce(LanguageModelInput) -> Fut,
    Fut: std::future::Future<Output = LanguageModelResult<ModelResponse>>,
{
    let mut span = ModelCallSpan::new(provider, model_id, "generate", &input);
    let result = f(input).instrument(span.span.clone()).await;

    match &result {
        Ok(response) => span.on_response(response),
        Err(error) => span.on_error(error),
    }

    span.on_end();
    result
}

pub async fn trace_stream<F, Fut>(
    provider: &str,
    model_id: &str,
    input: LanguageModelInput,
    f: F,
) -> LanguageModelResult<LanguageModelStream>
where
    F: FnOnce(LanguageModelInput) -> Fut,
    Fut: std::future::Future<Output = LanguageModelResult<LanguageModelStream>>,
{
    let mut span = ModelCallSpan::new(provider, model_id, "stream", &input);
    let stream_result = f(input).instrument(span.span.clone()).await;

    match stream_result {
        Ok(mut stream) => {
            let span_handle = span.span.clone();
            let instrumented = async_stream::try_stream! {
                let mut span_state = span;

                while let Some(item) = stream.next().await {
                    match item {
                        Ok(partial) => {
                            span_state.on_stream_partial(&partial);
                            yield partial;
                        }
                        Err(err) => {
                            span_state.on_error(&err);
                            Err(err)?;
                        }
                    }
                }

                span_state.on_end();
            }
            .instrument(span_handle);

            Ok(LanguageModelStream::from_stream(instrumented))
        }
        Err(error) => {
            span.on_error(&error);
            span.on_end();
            Err(error)
        }
    }
}
