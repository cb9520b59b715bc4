//! The tutoring flows. Each one validates its input, renders a prompt, calls
//! the model and checks the result before handing it back.
mod chat;
mod code_task;
mod course_description;
mod distractors;
mod explain;
mod hint;
mod quiz_from_transcript;
mod review;
mod video_insights;

pub use chat::{ChatInput, ChatStream};
pub use code_task::{GenerateCodeTaskInput, GenerateCodeTaskOutput};
pub use course_description::{GenerateCourseDescriptionInput, GenerateCourseDescriptionOutput};
pub use distractors::{GenerateDistractorsInput, GenerateDistractorsOutput, MAX_DISTRACTORS};
pub use explain::{ExplainCodeSnippetInput, ExplainCodeSnippetOutput};
pub use hint::{ProvideHintInput, ProvideHintOutput};
pub use quiz_from_transcript::{
    GenerateQuizFromTranscriptInput, MAX_QUIZ_QUESTIONS, MIN_QUIZ_QUESTIONS,
};
pub use review::{ReviewCodeInput, ReviewCodeOutput};
pub use video_insights::{
    ExtractVideoInsightsInput, ExtractVideoInsightsOutput, INSIGHT_QUESTION_COUNT,
};

use crate::{
    client::GenerativeClient,
    errors::TranscriptError,
    schema::{validate_record, Field, FlowSchema, ObjectSchema},
    store::QuizStore,
    template::PromptTemplate,
    transcript::{normalize_video_url, TranscriptFetcher, YoutubeTranscriptFetcher},
    types::{GeneratedQuiz, QuizGenerationOutcome},
    FlowError,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Entry point to every flow. Stateless and cheap to clone; one value can
/// serve concurrent requests.
#[derive(Clone)]
pub struct Flows {
    client: GenerativeClient,
    transcripts: Arc<dyn TranscriptFetcher>,
    quiz_store: Option<Arc<dyn QuizStore>>,
}

pub struct FlowsBuilder {
    client: GenerativeClient,
    transcripts: Option<Arc<dyn TranscriptFetcher>>,
    quiz_store: Option<Arc<dyn QuizStore>>,
}

impl FlowsBuilder {
    /// Set the transcript source. Defaults to [`YoutubeTranscriptFetcher`].
    #[must_use]
    pub fn transcript_fetcher(mut self, fetcher: Arc<dyn TranscriptFetcher>) -> Self {
        self.transcripts = Some(fetcher);
        self
    }

    /// Set where generated quizzes are saved. Required by
    /// [`Flows::generate_quiz_from_transcript`].
    #[must_use]
    pub fn quiz_store(mut self, store: Arc<dyn QuizStore>) -> Self {
        self.quiz_store = Some(store);
        self
    }

    #[must_use]
    pub fn build(self) -> Flows {
        Flows {
            client: self.client,
            transcripts: self
                .transcripts
                .unwrap_or_else(|| Arc::new(YoutubeTranscriptFetcher::new(reqwest::Client::new()))),
            quiz_store: self.quiz_store,
        }
    }
}

impl Flows {
    #[must_use]
    pub fn builder(client: GenerativeClient) -> FlowsBuilder {
        FlowsBuilder {
            client,
            transcripts: None,
            quiz_store: None,
        }
    }

    pub fn client(&self) -> &GenerativeClient {
        &self.client
    }

    /// Explain what a code snippet does, for a learner.
    #[tracing::instrument(skip_all)]
    pub async fn explain_code_snippet(
        &self,
        input: ExplainCodeSnippetInput,
    ) -> Result<ExplainCodeSnippetOutput, FlowError> {
        explain::run(&self.client, &input).await
    }

    /// Compare a learner's code against the reference solution.
    #[tracing::instrument(skip_all, fields(language = %input.programming_language))]
    pub async fn review_code(&self, input: ReviewCodeInput) -> Result<ReviewCodeOutput, FlowError> {
        review::run(&self.client, &input).await
    }

    /// A nudge toward the solution of a practice problem, without giving it
    /// away.
    #[tracing::instrument(skip_all)]
    pub async fn provide_hint(&self, input: ProvideHintInput) -> Result<ProvideHintOutput, FlowError> {
        hint::run(&self.client, &input).await
    }

    #[tracing::instrument(skip_all, fields(course = %input.course_title))]
    pub async fn generate_course_description(
        &self,
        input: GenerateCourseDescriptionInput,
    ) -> Result<GenerateCourseDescriptionOutput, FlowError> {
        course_description::run(&self.client, &input).await
    }

    /// A markdown coding exercise for a topic.
    #[tracing::instrument(skip_all, fields(topic = %input.topic_title, language = %input.programming_language))]
    pub async fn generate_code_task(
        &self,
        input: GenerateCodeTaskInput,
    ) -> Result<GenerateCodeTaskOutput, FlowError> {
        code_task::run(&self.client, &input).await
    }

    /// Plausible wrong code tokens for the drag-and-drop game mode.
    #[tracing::instrument(skip_all, fields(language = %input.language, count = input.count))]
    pub async fn generate_distractors(
        &self,
        input: GenerateDistractorsInput,
    ) -> Result<GenerateDistractorsOutput, FlowError> {
        distractors::run(&self.client, &input).await
    }

    /// A summary and five quiz questions from a video's transcript.
    #[tracing::instrument(skip_all, fields(video_url = %input.video_url))]
    pub async fn extract_video_insights(
        &self,
        input: ExtractVideoInsightsInput,
    ) -> Result<ExtractVideoInsightsOutput, FlowError> {
        video_insights::run(&self.client, self.transcripts.as_ref(), &input).await
    }

    /// Generate a quiz from a video's transcript and save it under a topic.
    #[tracing::instrument(skip_all, fields(video_url = %input.video_url, topic_id = %input.topic_id))]
    pub async fn generate_quiz_from_transcript(
        &self,
        input: GenerateQuizFromTranscriptInput,
    ) -> Result<GeneratedQuiz, FlowError> {
        let store = self.quiz_store.as_deref().ok_or_else(|| {
            FlowError::PersistenceFailed("no quiz store is configured".to_string())
        })?;
        quiz_from_transcript::run(&self.client, self.transcripts.as_ref(), store, &input).await
    }

    /// [`Flows::generate_quiz_from_transcript`] folded into the envelope UI
    /// callers render.
    pub async fn generate_quiz_from_transcript_outcome(
        &self,
        input: GenerateQuizFromTranscriptInput,
    ) -> QuizGenerationOutcome {
        self.generate_quiz_from_transcript(input).await.into()
    }

    /// Stream the tutor's reply to a conversation as UTF-8 bytes.
    #[tracing::instrument(skip_all, fields(messages = input.messages.len()))]
    pub async fn chat(&self, input: ChatInput) -> Result<ChatStream, FlowError> {
        chat::run(&self.client, input).await
    }
}

impl std::fmt::Debug for Flows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flows")
            .field("client", &self.client)
            .field("quiz_store", &self.quiz_store.is_some())
            .finish_non_exhaustive()
    }
}

/// Validate `input` and render `source` with it. The template may only read
/// fields the input schema declares.
fn render_prompt<T: Serialize + FlowSchema>(source: &str, input: &T) -> Result<String, FlowError> {
    let value = validate_record(input)?;
    let template = PromptTemplate::parse_for(source, &T::schema())?;
    Ok(template.render_value(&value)?)
}

/// Give model and transport failures a message naming what the flow was
/// doing. Other errors pass through.
fn with_context(context: &'static str) -> impl FnOnce(FlowError) -> FlowError {
    move |error| match error {
        FlowError::LanguageModel(source) => {
            FlowError::GenerationFailed(format!("{context}: {source}"))
        }
        other => other,
    }
}

/// Normalize the URL and fetch the transcript. A malformed URL is the
/// caller's mistake; every other failure is reported as the transcript being
/// unavailable.
async fn fetch_transcript(
    fetcher: &dyn TranscriptFetcher,
    video_url: &str,
) -> Result<String, FlowError> {
    let video_url = normalize_video_url(video_url)
        .map_err(|error| FlowError::InvalidInput(error.to_string()))?;

    match fetcher.fetch_transcript(&video_url).await {
        Ok(transcript) => {
            debug!(chars = transcript.len(), "fetched transcript");
            Ok(transcript)
        }
        Err(TranscriptError::InvalidUrl(url)) => Err(FlowError::InvalidInput(format!(
            "Invalid video URL: {url}"
        ))),
        Err(error) => {
            warn!(error = %error, "transcript unavailable");
            Err(FlowError::TranscriptUnavailable(error))
        }
    }
}

/// Template context for the transcript-based flows.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptPrompt<'a> {
    transcript: &'a str,
    min_questions: usize,
    max_questions: usize,
}

impl FlowSchema for TranscriptPrompt<'_> {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "TranscriptPrompt",
            "",
            vec![
                Field::string("transcript", ""),
                Field::integer("minQuestions", ""),
                Field::integer("maxQuestions", ""),
            ],
        )
    }
}

fn require_text(field: &str, value: &str) -> Result<(), FlowError> {
    if value.trim().is_empty() {
        return Err(FlowError::EmptyResult(format!(
            "the model returned an empty {field}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, ObjectSchema};
    use codeverse_genai::LanguageModelError;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Greeting {
        user_name: String,
    }

    impl FlowSchema for Greeting {
        fn schema() -> ObjectSchema {
            ObjectSchema::new("Greeting", "", vec![Field::string("userName", "")])
        }
    }

    #[test]
    fn render_prompt_checks_fields() {
        let input = Greeting {
            user_name: "Ada".to_string(),
        };
        assert_eq!(render_prompt("Hi {{userName}}!", &input).unwrap(), "Hi Ada!");
        assert!(matches!(
            render_prompt("Hi {{name}}!", &input),
            Err(FlowError::Template(_))
        ));
    }

    #[test]
    fn context_wraps_model_errors_only() {
        let error = with_context("Failed to explain the code")(FlowError::LanguageModel(
            LanguageModelError::InvalidInput("bad".to_string()),
        ));
        let FlowError::GenerationFailed(message) = error else {
            panic!("expected generation failure");
        };
        assert!(message.starts_with("Failed to explain the code: "));

        let error = with_context("ctx")(FlowError::EmptyResult("x".to_string()));
        assert!(matches!(error, FlowError::EmptyResult(_)));
    }

    #[test]
    fn require_text_rejects_blank() {
        assert!(require_text("hint", "use a loop").is_ok());
        assert!(matches!(
            require_text("hint", " \n"),
            Err(FlowError::EmptyResult(_))
        ));
    }
}
