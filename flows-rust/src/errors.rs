use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Schema mismatch in {schema} at `{path}`: {reason}")]
    SchemaMismatch {
        schema: String,
        path: String,
        reason: String,
    },
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
    #[error("Empty result: {0}")]
    EmptyResult(String),
    #[error("{0}")]
    TranscriptUnavailable(#[from] TranscriptError),
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),
    #[error("Language model error: {0}")]
    LanguageModel(#[from] codeverse_genai::LanguageModelError),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlowError {
    pub(crate) fn schema_mismatch(
        schema: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaMismatch {
            schema: schema.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unresolved placeholder `{0}`")]
    UnresolvedPlaceholder(String),
    #[error("`{0}` is not an array")]
    NotIterable(String),
    #[error("unterminated tag at byte {0}")]
    UnterminatedTag(usize),
    #[error("empty tag at byte {0}")]
    EmptyTag(usize),
    #[error("unclosed `#{0}` block")]
    UnclosedBlock(String),
    #[error("unexpected `{0}` tag")]
    UnexpectedTag(String),
    #[error("unknown block helper `#{0}`")]
    UnknownHelper(String),
    #[error("template references `{field}` which {schema} does not declare")]
    UnknownField { schema: String, field: String },
    #[error("cannot bind template input: {0}")]
    Bind(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Could not retrieve the transcript: subtitles are disabled for this video")]
    CaptionsDisabled,
    #[error("Could not retrieve the transcript for this video: {0}")]
    Unavailable(String),
    #[error("Invalid video URL: {0}")]
    InvalidUrl(String),
}

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;
