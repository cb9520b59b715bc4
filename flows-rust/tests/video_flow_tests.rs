mod common;

use codeverse_flows::{
    ExtractVideoInsightsInput, ExtractVideoInsightsOutput, FlowError, Flows,
    GenerateQuizFromTranscriptInput, GenerativeClient, QuizGenerationOutcome, TranscriptError,
};
use codeverse_genai::genai_test::{MockGenerateResult, MockLanguageModel};
use common::{
    flows_with, question, questions, questions_json, FakeQuizStore, FakeTranscriptFetcher,
    TRANSCRIPT,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

const VIDEO_URL: &str = "https://youtu.be/ABC123?t=10";
const CANONICAL_URL: &str = "https://www.youtube.com/watch?v=ABC123";

fn topic_id() -> Uuid {
    Uuid::parse_str("6f1c1d7e-3c7b-4b5e-9a59-0d7d4c1f2a10").unwrap()
}

fn insights_input() -> ExtractVideoInsightsInput {
    ExtractVideoInsightsInput {
        video_url: VIDEO_URL.to_string(),
    }
}

fn quiz_input() -> GenerateQuizFromTranscriptInput {
    GenerateQuizFromTranscriptInput {
        video_url: VIDEO_URL.to_string(),
        topic_id: topic_id(),
    }
}

fn flows_for_quiz(
    model: &Arc<MockLanguageModel>,
    fetcher: Arc<FakeTranscriptFetcher>,
    store: Arc<FakeQuizStore>,
) -> Flows {
    Flows::builder(GenerativeClient::new(model.clone()))
        .transcript_fetcher(fetcher)
        .quiz_store(store)
        .build()
}

#[tokio::test]
async fn extract_video_insights_returns_model_output() {
    let model = Arc::new(MockLanguageModel::new());
    let expected = ExtractVideoInsightsOutput {
        summary: "The video introduces ownership.".to_string(),
        questions: questions(5),
    };
    model.enqueue_generate(MockGenerateResult::json(&json!(expected)));

    let fetcher = FakeTranscriptFetcher::returning(TRANSCRIPT);
    let flows = Flows::builder(GenerativeClient::new(model.clone()))
        .transcript_fetcher(fetcher.clone())
        .build();

    let output = flows
        .extract_video_insights(insights_input())
        .await
        .expect("insights succeed");

    assert_eq!(output, expected);
    assert_eq!(fetcher.requested(), vec![CANONICAL_URL.to_string()]);

    let prompt = serde_json::to_string(&model.tracked_generate_inputs()[0].messages).unwrap();
    assert!(prompt.contains(TRANSCRIPT));
}

#[tokio::test]
async fn video_flows_accept_links_without_scheme() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(MockGenerateResult::json(&json!({
        "summary": "The video introduces ownership.",
        "questions": questions_json(&questions(5)),
    })));
    model.enqueue_generate(MockGenerateResult::json(&json!({
        "title": "Ownership",
        "summary": "Ownership basics.",
        "questions": questions_json(&questions(3)),
    })));

    let fetcher = FakeTranscriptFetcher::returning(TRANSCRIPT);
    let store = FakeQuizStore::returning("quiz-1");
    let flows = flows_for_quiz(&model, fetcher.clone(), store);

    flows
        .extract_video_insights(ExtractVideoInsightsInput {
            video_url: "youtu.be/ABC123".to_string(),
        })
        .await
        .expect("insights succeed");
    flows
        .generate_quiz_from_transcript(GenerateQuizFromTranscriptInput {
            video_url: "www.youtube.com/watch?v=ABC123".to_string(),
            topic_id: topic_id(),
        })
        .await
        .expect("quiz is saved");

    assert_eq!(
        fetcher.requested(),
        vec![CANONICAL_URL.to_string(), CANONICAL_URL.to_string()]
    );
}

#[tokio::test]
async fn extract_video_insights_reports_disabled_subtitles() {
    let model = Arc::new(MockLanguageModel::new());
    let flows = Flows::builder(GenerativeClient::new(model.clone()))
        .transcript_fetcher(FakeTranscriptFetcher::failing(
            TranscriptError::CaptionsDisabled,
        ))
        .build();

    let error = flows
        .extract_video_insights(insights_input())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        FlowError::TranscriptUnavailable(TranscriptError::CaptionsDisabled)
    ));
    assert!(error.to_string().contains("subtitles are disabled"));
    assert!(model.tracked_generate_inputs().is_empty());
}

#[tokio::test]
async fn extract_video_insights_reports_generic_transcript_failure() {
    let model = Arc::new(MockLanguageModel::new());
    let flows = Flows::builder(GenerativeClient::new(model.clone()))
        .transcript_fetcher(FakeTranscriptFetcher::failing(
            TranscriptError::Unavailable("connection reset".to_string()),
        ))
        .build();

    let error = flows
        .extract_video_insights(insights_input())
        .await
        .unwrap_err();

    let message = error.to_string();
    assert!(matches!(error, FlowError::TranscriptUnavailable(_)));
    assert!(message.contains("Could not retrieve the transcript"));
    assert!(!message.contains("subtitles are disabled"));
}

#[tokio::test]
async fn extract_video_insights_rejects_non_youtube_urls() {
    let model = Arc::new(MockLanguageModel::new());
    let error = flows_with(&model)
        .extract_video_insights(ExtractVideoInsightsInput {
            video_url: "https://vimeo.com/1234".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(error, FlowError::InvalidInput(_)), "{error:?}");
}

#[tokio::test]
async fn extract_video_insights_truncates_extra_questions() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(MockGenerateResult::json(&json!({
        "summary": "Ownership.",
        "questions": questions_json(&questions(7)),
    })));

    let output = flows_with(&model)
        .extract_video_insights(insights_input())
        .await
        .expect("insights succeed");

    assert_eq!(output.questions, questions(5));
}

#[tokio::test]
async fn extract_video_insights_needs_five_valid_questions() {
    let mut generated = questions(5);
    generated[2].correct_answer = "Delta".to_string();

    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(MockGenerateResult::json(&json!({
        "summary": "Ownership.",
        "questions": questions_json(&generated),
    })));

    let error = flows_with(&model)
        .extract_video_insights(insights_input())
        .await
        .unwrap_err();

    assert!(matches!(error, FlowError::GenerationFailed(_)), "{error:?}");
}

#[tokio::test]
async fn quiz_from_transcript_saves_quiz() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(MockGenerateResult::json(&json!({
        "title": "Ownership basics",
        "summary": "The video introduces ownership.",
        "questions": questions_json(&questions(6)),
    })));
    let store = FakeQuizStore::returning("quiz-42");
    let flows = flows_for_quiz(
        &model,
        FakeTranscriptFetcher::returning(TRANSCRIPT),
        store.clone(),
    );

    let outcome = flows.generate_quiz_from_transcript_outcome(quiz_input()).await;

    assert_eq!(
        outcome,
        QuizGenerationOutcome {
            success: true,
            quiz_id: Some("quiz-42".to_string()),
            error: None,
        }
    );

    let saved = store.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].topic_id, topic_id());
    assert_eq!(saved[0].title, "Ownership basics");
    assert_eq!(saved[0].questions, questions(6));
}

#[tokio::test]
async fn quiz_from_transcript_reports_question_count() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(MockGenerateResult::json(&json!({
        "title": "Ownership",
        "summary": "",
        "questions": questions_json(&questions(9)),
    })));
    let store = FakeQuizStore::returning("quiz-7");
    let flows = flows_for_quiz(
        &model,
        FakeTranscriptFetcher::returning(TRANSCRIPT),
        store.clone(),
    );

    let quiz = flows
        .generate_quiz_from_transcript(quiz_input())
        .await
        .expect("quiz succeeds");

    assert_eq!(quiz.quiz_id, "quiz-7");
    assert_eq!(quiz.question_count, 7);
    assert_eq!(store.saved()[0].questions.len(), 7);
}

#[tokio::test]
async fn quiz_from_transcript_outcome_on_transcript_failure() {
    let model = Arc::new(MockLanguageModel::new());
    let store = FakeQuizStore::returning("unused");
    let flows = flows_for_quiz(
        &model,
        FakeTranscriptFetcher::failing(TranscriptError::CaptionsDisabled),
        store.clone(),
    );

    let outcome = flows.generate_quiz_from_transcript_outcome(quiz_input()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.quiz_id, None);
    assert!(outcome.error.as_deref().is_some_and(|e| !e.is_empty()));
    assert!(store.saved().is_empty());
}

#[tokio::test]
async fn quiz_from_transcript_outcome_on_empty_generation() {
    let mut malformed = question(1);
    malformed.options.truncate(2);

    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(MockGenerateResult::json(&json!({
        "title": "Ownership",
        "summary": "Ownership.",
        "questions": questions_json(&[malformed]),
    })));
    let store = FakeQuizStore::returning("unused");
    let flows = flows_for_quiz(
        &model,
        FakeTranscriptFetcher::returning(TRANSCRIPT),
        store.clone(),
    );

    let result = flows.generate_quiz_from_transcript(quiz_input()).await;
    assert!(matches!(result, Err(FlowError::EmptyResult(_))), "{result:?}");

    let outcome = QuizGenerationOutcome::from(result);
    assert!(!outcome.success);
    assert!(outcome.error.as_deref().is_some_and(|e| !e.is_empty()));
    assert!(store.saved().is_empty());
}

#[tokio::test]
async fn quiz_from_transcript_outcome_on_persistence_failure() {
    let model = Arc::new(MockLanguageModel::new());
    model.enqueue_generate(MockGenerateResult::json(&json!({
        "title": "Ownership",
        "summary": "Ownership.",
        "questions": questions_json(&questions(5)),
    })));
    let flows = flows_for_quiz(
        &model,
        FakeTranscriptFetcher::returning(TRANSCRIPT),
        FakeQuizStore::failing("duplicate key value violates unique constraint"),
    );

    let result = flows.generate_quiz_from_transcript(quiz_input()).await;
    let Err(FlowError::PersistenceFailed(message)) = &result else {
        panic!("expected persistence failure, got {result:?}");
    };
    assert!(message.contains("duplicate key"));

    let outcome = QuizGenerationOutcome::from(result);
    assert!(!outcome.success);
    assert!(outcome.error.as_deref().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn quiz_from_transcript_requires_a_store() {
    let model = Arc::new(MockLanguageModel::new());
    let error = flows_with(&model)
        .generate_quiz_from_transcript(quiz_input())
        .await
        .unwrap_err();

    assert!(matches!(error, FlowError::PersistenceFailed(_)), "{error:?}");
    assert!(model.tracked_generate_inputs().is_empty());
}
