#![allow(dead_code)]

use async_trait::async_trait;
use codeverse_flows::{
    BoxedError, Flows, GenerativeClient, NewQuiz, QuizQuestion, QuizStore, TranscriptError,
    TranscriptFetcher,
};
use codeverse_genai::genai_test::MockLanguageModel;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const TRANSCRIPT: &str = "Today we learn about ownership in Rust. Every value has a single owner.";

/// Returns a fixed transcript or error and records the URLs it was asked for.
pub struct FakeTranscriptFetcher {
    result: Result<String, TranscriptError>,
    requested: Mutex<Vec<String>>,
}

impl FakeTranscriptFetcher {
    pub fn returning(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(transcript.to_string()),
            requested: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: TranscriptError) -> Arc<Self> {
        Arc::new(Self {
            result: Err(error),
            requested: Mutex::new(Vec::new()),
        })
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptFetcher for FakeTranscriptFetcher {
    async fn fetch_transcript(&self, video_url: &str) -> Result<String, TranscriptError> {
        self.requested.lock().unwrap().push(video_url.to_string());
        self.result.clone()
    }
}

/// Records saved quizzes and answers with a fixed id or error message.
pub struct FakeQuizStore {
    result: Result<String, String>,
    saved: Mutex<Vec<NewQuiz>>,
}

impl FakeQuizStore {
    pub fn returning(quiz_id: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(quiz_id.to_string()),
            saved: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            saved: Mutex::new(Vec::new()),
        })
    }

    pub fn saved(&self) -> Vec<NewQuiz> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuizStore for FakeQuizStore {
    async fn create_quiz_for_topic(&self, quiz: NewQuiz) -> Result<String, BoxedError> {
        self.saved.lock().unwrap().push(quiz);
        self.result.clone().map_err(Into::into)
    }
}

pub fn flows_with(model: &Arc<MockLanguageModel>) -> Flows {
    Flows::builder(GenerativeClient::new(model.clone()))
        .transcript_fetcher(FakeTranscriptFetcher::returning(TRANSCRIPT))
        .build()
}

pub fn question(n: usize) -> QuizQuestion {
    QuizQuestion {
        question: format!("Question {n}?"),
        options: vec!["Alpha".to_string(), "Beta".to_string(), "Gamma".to_string()],
        correct_answer: "Beta".to_string(),
    }
}

pub fn questions(count: usize) -> Vec<QuizQuestion> {
    (1..=count).map(question).collect()
}

pub fn questions_json(questions: &[QuizQuestion]) -> Value {
    json!(questions)
}
