mod client;
mod config;
mod errors;
mod flows;
pub mod schema;
mod store;
pub mod template;
mod tool;
pub mod transcript;
mod types;

pub use client::{
    GenerateRequest, GenerationSettings, GenerativeClient, TextStream, DEFAULT_MAX_TOOL_TURNS,
};
pub use config::{FlowsConfig, DEFAULT_MODEL_ID};
pub use errors::{BoxedError, FlowError, TemplateError, TranscriptError};
pub use flows::*;
pub use store::{NewQuiz, QuizStore};
pub use tool::FlowTool;
pub use transcript::{TranscriptFetcher, TranscriptTool, YoutubeTranscriptFetcher};
pub use types::*;
