use thiserror::Error;

#[derive(Error, Debug)]
pub enum LanguageModelError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The HTTP request failed or its body could not be decoded.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The provider answered with a non-success status code.
    #[error("Status error: {1} (Status {0})")]
    StatusCode(reqwest::StatusCode, String),
    /// The input cannot be expressed for this provider.
    #[error("Unsupported by {0}: {1}")]
    Unsupported(&'static str, String),
    /// The provider answered with something we did not expect (e.g. no
    /// candidates at all).
    #[error("Invariant from {0}: {1}")]
    Invariant(&'static str, String),
    /// The provider declined to produce output (safety block, blocklist).
    #[error("Refusal: {0}")]
    Refusal(String),
}

pub type LanguageModelResult<T> = Result<T, LanguageModelError>;
