use crate::{
    client::{GenerationSettings, GenerativeClient, DEFAULT_MAX_TOOL_TURNS},
    flows::FlowsBuilder,
    transcript::{YoutubeTranscriptFetcher, DEFAULT_TRANSCRIPT_LANGUAGE},
    Flows, FlowError,
};
use codeverse_genai::google::{GoogleModel, GoogleModelOptions};
use serde::Deserialize;
use std::{collections::HashMap, fmt, str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, warn};

pub const DEFAULT_MODEL_ID: &str = "gemini-2.0-flash";

/// Settings for the Gemini model, generation defaults and transcript fetching.
///
/// Load it with [`FlowsConfig::from_env`] or deserialize it from any serde
/// source; missing fields take their defaults.
#[derive(Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlowsConfig {
    pub api_key: String,
    pub model_id: String,
    /// Overrides the Gemini API base URL.
    pub base_url: Option<String>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub max_tool_turns: usize,
    /// Timeout for every outgoing HTTP request. No timeout when unset.
    pub request_timeout_secs: Option<u64>,
    pub transcript_language: String,
}

impl Default for FlowsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            base_url: None,
            temperature: None,
            max_output_tokens: None,
            max_tool_turns: DEFAULT_MAX_TOOL_TURNS,
            request_timeout_secs: None,
            transcript_language: DEFAULT_TRANSCRIPT_LANGUAGE.to_string(),
        }
    }
}

impl fmt::Debug for FlowsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowsConfig")
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("max_tool_turns", &self.max_tool_turns)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("transcript_language", &self.transcript_language)
            .finish()
    }
}

impl FlowsConfig {
    /// Read the configuration from the process environment, loading a `.env`
    /// file first if there is one.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `GOOGLE_API_KEY` or `GEMINI_API_KEY` | `api_key` (required) |
    /// | `CODEVERSE_MODEL` | `model_id` |
    /// | `CODEVERSE_BASE_URL` | `base_url` |
    /// | `CODEVERSE_TEMPERATURE` | `temperature` |
    /// | `CODEVERSE_MAX_OUTPUT_TOKENS` | `max_output_tokens` |
    /// | `CODEVERSE_MAX_TOOL_TURNS` | `max_tool_turns` |
    /// | `CODEVERSE_REQUEST_TIMEOUT_SECS` | `request_timeout_secs` |
    /// | `CODEVERSE_TRANSCRIPT_LANGUAGE` | `transcript_language` |
    pub fn from_env() -> Result<Self, FlowError> {
        if let Err(error) = dotenvy::dotenv() {
            if !error.not_found() {
                warn!(error = %error, "failed to load .env file");
            }
        }
        Self::from_vars(std::env::vars())
    }

    /// Same as [`FlowsConfig::from_env`] but reads the given variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, FlowError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .filter(|(_, value)| !value.trim().is_empty())
            .collect();

        let defaults = Self::default();
        let config = Self {
            api_key: vars
                .get("GOOGLE_API_KEY")
                .or_else(|| vars.get("GEMINI_API_KEY"))
                .cloned()
                .unwrap_or_default(),
            model_id: vars
                .get("CODEVERSE_MODEL")
                .cloned()
                .unwrap_or(defaults.model_id),
            base_url: vars.get("CODEVERSE_BASE_URL").cloned(),
            temperature: parse_var(&vars, "CODEVERSE_TEMPERATURE")?,
            max_output_tokens: parse_var(&vars, "CODEVERSE_MAX_OUTPUT_TOKENS")?,
            max_tool_turns: parse_var(&vars, "CODEVERSE_MAX_TOOL_TURNS")?
                .unwrap_or(defaults.max_tool_turns),
            request_timeout_secs: parse_var(&vars, "CODEVERSE_REQUEST_TIMEOUT_SECS")?,
            transcript_language: vars
                .get("CODEVERSE_TRANSCRIPT_LANGUAGE")
                .cloned()
                .unwrap_or(defaults.transcript_language),
        };
        config.validate()?;

        debug!(config = ?config, "loaded flows configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if self.api_key.trim().is_empty() {
            return Err(FlowError::Config(
                "GOOGLE_API_KEY (or GEMINI_API_KEY) must be set".to_string(),
            ));
        }
        if self.model_id.trim().is_empty() {
            return Err(FlowError::Config("model id must not be empty".to_string()));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(FlowError::Config(format!(
                    "temperature must be between 0 and 2, got {temperature}"
                )));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            max_tool_turns: self.max_tool_turns,
        }
    }

    /// The HTTP client shared by the model and the transcript fetcher.
    pub fn http_client(&self) -> Result<reqwest::Client, FlowError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        builder
            .build()
            .map_err(|error| FlowError::Config(format!("failed to build HTTP client: {error}")))
    }

    pub fn build_client(&self, http: reqwest::Client) -> Result<GenerativeClient, FlowError> {
        self.validate()?;
        let model = GoogleModel::new(
            self.model_id.clone(),
            GoogleModelOptions {
                api_key: self.api_key.clone(),
                base_url: self.base_url.clone(),
                client: Some(http),
                ..GoogleModelOptions::default()
            },
        );
        Ok(GenerativeClient::new(Arc::new(model)).with_settings(self.generation_settings()))
    }

    #[must_use]
    pub fn build_transcript_fetcher(&self, http: reqwest::Client) -> YoutubeTranscriptFetcher {
        YoutubeTranscriptFetcher::new(http).with_language(self.transcript_language.clone())
    }

    /// A [`FlowsBuilder`] with the Gemini client and YouTube fetcher wired to
    /// one HTTP client. Add a quiz store before building if the quiz flow is
    /// used.
    pub fn flows_builder(&self) -> Result<FlowsBuilder, FlowError> {
        let http = self.http_client()?;
        let client = self.build_client(http.clone())?;
        Ok(Flows::builder(client).transcript_fetcher(Arc::new(self.build_transcript_fetcher(http))))
    }
}

fn parse_var<T>(vars: &HashMap<String, String>, name: &str) -> Result<Option<T>, FlowError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    vars.get(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|error| FlowError::Config(format!("invalid {name} `{value}`: {error}")))
        })
        .transpose()
}
