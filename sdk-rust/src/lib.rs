mod boxed_stream;
mod client_utils;
mod errors;
pub mod genai_test;
pub mod google;
mod id_utils;
mod language_model;
mod opentelemetry;
mod stream_utils;
mod types;
mod types_ext;

pub use boxed_stream::BoxedStream;
pub use errors::*;
pub use language_model::{LanguageModel, LanguageModelStream};
pub use types::*;
