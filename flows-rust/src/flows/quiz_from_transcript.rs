use super::{fetch_transcript, render_prompt, with_context, TranscriptPrompt};
use crate::{
    client::{GenerateRequest, GenerativeClient},
    schema::{validate_record, Field, FlowSchema, ObjectSchema, StringFormat},
    store::{NewQuiz, QuizStore},
    transcript::TranscriptFetcher,
    types::{retain_well_formed, GeneratedQuiz, QuizQuestion},
    FlowError,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

pub const MIN_QUIZ_QUESTIONS: usize = 5;
pub const MAX_QUIZ_QUESTIONS: usize = 7;
const DEFAULT_QUIZ_TITLE: &str = "Video Quiz";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizFromTranscriptInput {
    pub video_url: String,
    /// The course topic the quiz is saved under.
    pub topic_id: Uuid,
}

impl FlowSchema for GenerateQuizFromTranscriptInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "GenerateQuizFromTranscriptInput",
            "",
            vec![
                Field::string(
                    "videoUrl",
                    "A YouTube video link, with or without the scheme.",
                ),
                Field::string("topicId", "The topic to attach the quiz to.")
                    .with_format(StringFormat::Uuid),
            ],
        )
    }
}

/// What the model produces before the quiz is saved.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizDraft {
    title: String,
    summary: String,
    questions: Vec<QuizQuestion>,
}

impl FlowSchema for QuizDraft {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "QuizDraft",
            "",
            vec![
                Field::string("title", "A short title for the quiz."),
                Field::string("summary", "A one-paragraph summary of the video."),
                Field::array(
                    "questions",
                    QuizQuestion::field_kind(),
                    "Multiple-choice questions testing the video's key points.",
                )
                .items_between(MIN_QUIZ_QUESTIONS, MAX_QUIZ_QUESTIONS),
            ],
        )
    }
}

const PROMPT: &str = r"You are an educational assistant on CodeVerse, an online platform for learning to code. Below is the transcript of a programming video that belongs to a course topic.

Create a quiz for students who watched the video:
- a short title
- a one-paragraph summary of the video
- between {{minQuestions}} and {{maxQuestions}} multiple-choice questions covering its key concepts. Each question must have 3 or 4 options, and its correctAnswer must be exactly one of the options.

Transcript:
{{transcript}}";

pub(super) async fn run(
    client: &GenerativeClient,
    transcripts: &dyn TranscriptFetcher,
    store: &dyn QuizStore,
    input: &GenerateQuizFromTranscriptInput,
) -> Result<GeneratedQuiz, FlowError> {
    validate_record(input)?;
    let transcript = fetch_transcript(transcripts, &input.video_url).await?;

    let prompt = render_prompt(
        PROMPT,
        &TranscriptPrompt {
            transcript: &transcript,
            min_questions: MIN_QUIZ_QUESTIONS,
            max_questions: MAX_QUIZ_QUESTIONS,
        },
    )?;
    let draft: QuizDraft = client
        .generate_structured(GenerateRequest::new(prompt))
        .await
        .map_err(with_context("Failed to generate the quiz"))?;

    let questions = retain_well_formed(draft.questions, MAX_QUIZ_QUESTIONS);
    if questions.is_empty() {
        return Err(FlowError::EmptyResult(
            "the model did not generate any valid quiz questions".to_string(),
        ));
    }

    let title = if draft.title.trim().is_empty() {
        DEFAULT_QUIZ_TITLE.to_string()
    } else {
        draft.title
    };
    let question_count = questions.len();

    let quiz_id = store
        .create_quiz_for_topic(NewQuiz {
            topic_id: input.topic_id,
            title,
            summary: draft.summary,
            questions,
        })
        .await
        .map_err(|error| FlowError::PersistenceFailed(error.to_string()))?;
    if quiz_id.trim().is_empty() {
        return Err(FlowError::PersistenceFailed(
            "the quiz store returned an empty quiz id".to_string(),
        ));
    }

    info!(quiz_id = %quiz_id, question_count, "saved generated quiz");
    Ok(GeneratedQuiz {
        quiz_id,
        question_count,
    })
}
