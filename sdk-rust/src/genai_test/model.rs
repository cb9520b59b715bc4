use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use futures::stream;

use crate::{
    errors::{LanguageModelError, LanguageModelResult},
    language_model::{LanguageModel, LanguageModelStream},
    ContentDelta, LanguageModelInput, ModelResponse, Part, PartDelta, PartialModelResponse,
    TextPartDelta,
};

/// Result for a mocked `generate` call.
pub enum MockGenerateResult {
    Response(ModelResponse),
    Error(LanguageModelError),
}

impl MockGenerateResult {
    pub fn response(response: ModelResponse) -> Self {
        Self::Response(response)
    }

    /// A response made of a single text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Response(ModelResponse {
            content: vec![Part::text(text)],
            ..ModelResponse::default()
        })
    }

    /// A response whose text is the serialized JSON value, the way a model in
    /// JSON mode answers.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::text(value.to_string())
    }

    pub fn error(error: LanguageModelError) -> Self {
        Self::Error(error)
    }
}

impl From<ModelResponse> for MockGenerateResult {
    fn from(response: ModelResponse) -> Self {
        Self::response(response)
    }
}

impl From<LanguageModelResult<ModelResponse>> for MockGenerateResult {
    fn from(result: LanguageModelResult<ModelResponse>) -> Self {
        match result {
            Ok(response) => Self::Response(response),
            Err(error) => Self::Error(error),
        }
    }
}

/// Result for a mocked `stream` call.
pub enum MockStreamResult {
    /// The stream yields every partial and ends.
    Partials(Vec<PartialModelResponse>),
    /// The stream yields every partial and then fails.
    PartialsThenError(Vec<PartialModelResponse>, LanguageModelError),
    /// The `stream` call itself fails.
    Error(LanguageModelError),
}

impl MockStreamResult {
    pub fn partials(partials: Vec<PartialModelResponse>) -> Self {
        Self::Partials(partials)
    }

    /// One text delta per chunk, all at content index 0.
    pub fn text_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Partials(chunks.into_iter().map(text_partial).collect())
    }

    pub fn partials_then_error(
        partials: Vec<PartialModelResponse>,
        error: LanguageModelError,
    ) -> Self {
        Self::PartialsThenError(partials, error)
    }

    pub fn error(error: LanguageModelError) -> Self {
        Self::Error(error)
    }
}

impl From<Vec<PartialModelResponse>> for MockStreamResult {
    fn from(partials: Vec<PartialModelResponse>) -> Self {
        Self::partials(partials)
    }
}

/// A partial response carrying a single text delta at index 0.
pub(crate) fn text_partial(text: impl Into<String>) -> PartialModelResponse {
    PartialModelResponse {
        delta: Some(ContentDelta {
            index: 0,
            part: PartDelta::Text(TextPartDelta::new(text)),
        }),
        usage: None,
    }
}

#[derive(Default)]
struct MockLanguageModelState {
    mocked_generate_results: VecDeque<MockGenerateResult>,
    mocked_stream_results: VecDeque<MockStreamResult>,
    tracked_generate_inputs: Vec<LanguageModelInput>,
    tracked_stream_inputs: Vec<LanguageModelInput>,
}

impl MockLanguageModelState {
    fn reset(&mut self) {
        self.tracked_generate_inputs.clear();
        self.tracked_stream_inputs.clear();
    }

    fn restore(&mut self) {
        self.mocked_generate_results.clear();
        self.mocked_stream_results.clear();
        self.reset();
    }
}

/// A language model that records its inputs and replays enqueued outputs in
/// FIFO order.
pub struct MockLanguageModel {
    provider: &'static str,
    model_id: String,
    state: Mutex<MockLanguageModelState>,
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self {
            provider: "mock",
            model_id: "mock-model".to_string(),
            state: Mutex::new(MockLanguageModelState::default()),
        }
    }
}

impl MockLanguageModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_provider(&mut self, provider: &'static str) {
        self.provider = provider;
    }

    pub fn set_model_id<S: Into<String>>(&mut self, model_id: S) {
        self.model_id = model_id.into();
    }

    fn state(&self) -> MutexGuard<'_, MockLanguageModelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a mocked generate result.
    pub fn enqueue_generate<R>(&self, result: R) -> &Self
    where
        R: Into<MockGenerateResult>,
    {
        self.state()
            .mocked_generate_results
            .push_back(result.into());
        self
    }

    /// Enqueue a mocked stream result.
    pub fn enqueue_stream<R>(&self, result: R) -> &Self
    where
        R: Into<MockStreamResult>,
    {
        self.state().mocked_stream_results.push_back(result.into());
        self
    }

    #[must_use]
    pub fn tracked_generate_inputs(&self) -> Vec<LanguageModelInput> {
        self.state().tracked_generate_inputs.clone()
    }

    #[must_use]
    pub fn tracked_stream_inputs(&self) -> Vec<LanguageModelInput> {
        self.state().tracked_stream_inputs.clone()
    }

    /// Reset tracked inputs without touching enqueued results.
    pub fn reset(&self) {
        self.state().reset();
    }

    /// Clear both tracked inputs and enqueued results.
    pub fn restore(&self) {
        self.state().restore();
    }
}

#[async_trait::async_trait]
impl LanguageModel for MockLanguageModel {
    fn provider(&self) -> &'static str {
        self.provider
    }

    fn model_id(&self) -> String {
        self.model_id.clone()
    }

    async fn generate(&self, input: LanguageModelInput) -> LanguageModelResult<ModelResponse> {
        let mut state = self.state();
        state.tracked_generate_inputs.push(input);

        let result = state.mocked_generate_results.pop_front().ok_or_else(|| {
            LanguageModelError::Invariant(
                self.provider,
                "no mocked generate results available".into(),
            )
        })?;

        match result {
            MockGenerateResult::Response(response) => Ok(response),
            MockGenerateResult::Error(error) => Err(error),
        }
    }

    async fn stream(&self, input: LanguageModelInput) -> LanguageModelResult<LanguageModelStream> {
        let mut state = self.state();
        state.tracked_stream_inputs.push(input);

        let result = state.mocked_stream_results.pop_front().ok_or_else(|| {
            LanguageModelError::Invariant(self.provider, "no mocked stream results available".into())
        })?;

        match result {
            MockStreamResult::Error(error) => Err(error),
            MockStreamResult::Partials(partials) => Ok(LanguageModelStream::from_stream(
                stream::iter(partials.into_iter().map(Ok)),
            )),
            MockStreamResult::PartialsThenError(partials, error) => {
                let items = partials
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error)))
                    .collect::<Vec<_>>();
                Ok(LanguageModelStream::from_stream(stream::iter(items)))
            }
        }
    }
}
