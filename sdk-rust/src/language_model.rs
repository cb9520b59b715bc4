use crate::{
    boxed_stream::BoxedStream, LanguageModelInput, LanguageModelResult, ModelResponse,
    PartialModelResponse,
};

/// A hosted model that can answer a `LanguageModelInput` either in one piece
/// or as a stream of partial responses.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    fn provider(&self) -> &'static str;
    fn model_id(&self) -> String;
    async fn generate(&self, input: LanguageModelInput) -> LanguageModelResult<ModelResponse>;
    async fn stream(&self, input: LanguageModelInput) -> LanguageModelResult<LanguageModelStream>;
}

/// Partial responses in emission order. An `Err` item terminates the stream.
pub type LanguageModelStream = BoxedStream<'static, LanguageModelResult<PartialModelResponse>>;
