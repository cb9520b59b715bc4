use super::{fetch_transcript, render_prompt, require_text, with_context, TranscriptPrompt};
use crate::{
    client::{GenerateRequest, GenerativeClient},
    schema::{validate_record, Field, FlowSchema, ObjectSchema},
    transcript::TranscriptFetcher,
    types::{retain_well_formed, QuizQuestion},
    FlowError,
};
use serde::{Deserialize, Serialize};

/// Number of questions in a video's insights.
pub const INSIGHT_QUESTION_COUNT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractVideoInsightsInput {
    pub video_url: String,
}

impl FlowSchema for ExtractVideoInsightsInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "ExtractVideoInsightsInput",
            "",
            vec![Field::string(
                "videoUrl",
                "A YouTube video link, with or without the scheme.",
            )],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractVideoInsightsOutput {
    pub summary: String,
    pub questions: Vec<QuizQuestion>,
}

impl FlowSchema for ExtractVideoInsightsOutput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "ExtractVideoInsightsOutput",
            "",
            vec![
                Field::string("summary", "A one-paragraph summary of the video."),
                Field::array(
                    "questions",
                    QuizQuestion::field_kind(),
                    "Multiple-choice questions testing the video's key points.",
                )
                .items_between(INSIGHT_QUESTION_COUNT, INSIGHT_QUESTION_COUNT),
            ],
        )
    }
}

const PROMPT: &str = r"You are an educational assistant on CodeVerse, an online platform for learning to code. Below is the transcript of a programming video a student has just watched.

1. Summarize the video in one paragraph, focusing on the concepts it teaches.
2. Write exactly {{maxQuestions}} multiple-choice questions that test understanding of the video's key points. Each question must have 3 or 4 options, and its correctAnswer must be exactly one of the options.

Transcript:
{{transcript}}";

pub(super) async fn run(
    client: &GenerativeClient,
    transcripts: &dyn TranscriptFetcher,
    input: &ExtractVideoInsightsInput,
) -> Result<ExtractVideoInsightsOutput, FlowError> {
    validate_record(input)?;
    let transcript = fetch_transcript(transcripts, &input.video_url).await?;

    let prompt = render_prompt(
        PROMPT,
        &TranscriptPrompt {
            transcript: &transcript,
            min_questions: INSIGHT_QUESTION_COUNT,
            max_questions: INSIGHT_QUESTION_COUNT,
        },
    )?;
    let output: ExtractVideoInsightsOutput = client
        .generate_structured(GenerateRequest::new(prompt))
        .await
        .map_err(with_context("Failed to extract insights from the video"))?;

    require_text("summary", &output.summary)?;

    let questions = retain_well_formed(output.questions, INSIGHT_QUESTION_COUNT);
    if questions.len() < INSIGHT_QUESTION_COUNT {
        return Err(FlowError::GenerationFailed(format!(
            "expected {INSIGHT_QUESTION_COUNT} quiz questions but the model produced {} valid ones",
            questions.len()
        )));
    }

    Ok(ExtractVideoInsightsOutput {
        summary: output.summary,
        questions,
    })
}
