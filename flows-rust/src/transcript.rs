//! Video transcript retrieval.
//!
//! [`YoutubeTranscriptFetcher`] reads the caption track list embedded in the
//! watch page, downloads the preferred track as timed-text XML and flattens
//! it into a single line of text.
use crate::{errors::TranscriptError, tool::FlowTool, BoxedError};
use async_trait::async_trait;
use codeverse_genai::JSONSchema;
use regex::{Captures, Regex};
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_TRANSCRIPT_LANGUAGE: &str = "en";
const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// Return the full transcript of the video as plain text.
    async fn fetch_transcript(&self, video_url: &str) -> Result<String, TranscriptError>;
}

/// Extract the video id from any of the common YouTube URL forms: `watch?v=`,
/// `youtu.be/`, `/embed/`, `/shorts/`, `/live/` and `m.youtube.com`.
pub fn video_id(video_url: &str) -> Result<String, TranscriptError> {
    let invalid = || TranscriptError::InvalidUrl(video_url.to_string());

    let trimmed = video_url.trim();
    let url = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("https://{trimmed}")))
        .map_err(|_| invalid())?;

    let host = url.host_str().ok_or_else(invalid)?.to_ascii_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .or_else(|| host.strip_prefix("music."))
        .unwrap_or(&host);

    let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
    let id = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            Some("embed" | "shorts" | "live" | "v") => segments.next().map(str::to_string),
            _ => None,
        },
        _ => None,
    };

    id.filter(|id| {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
    .ok_or_else(invalid)
}

/// The canonical `https://www.youtube.com/watch?v=<id>` form of a video URL.
/// Other query parameters, such as `t=`, are dropped.
pub fn normalize_video_url(video_url: &str) -> Result<String, TranscriptError> {
    Ok(format!("{YOUTUBE_BASE_URL}/watch?v={}", video_id(video_url)?))
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    /// `asr` for auto-generated captions.
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    fn matches_language(&self, language: &str) -> bool {
        self.language_code == language
            || self
                .language_code
                .split('-')
                .next()
                .is_some_and(|primary| primary == language)
    }
}

/// Fetches transcripts over HTTP from YouTube.
#[derive(Debug, Clone)]
pub struct YoutubeTranscriptFetcher {
    client: reqwest::Client,
    language: String,
    base_url: String,
}

impl YoutubeTranscriptFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            language: DEFAULT_TRANSCRIPT_LANGUAGE.to_string(),
            base_url: YOUTUBE_BASE_URL.to_string(),
        }
    }

    /// Preferred caption language. The first available track is used when
    /// no track matches.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_text(&self, url: &str) -> Result<String, TranscriptError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT_LANGUAGE, self.language.as_str())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await
            .map_err(|error| TranscriptError::Unavailable(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptError::Unavailable(format!(
                "YouTube responded with status {status}"
            )));
        }

        response
            .text()
            .await
            .map_err(|error| TranscriptError::Unavailable(error.to_string()))
    }
}

#[async_trait]
impl TranscriptFetcher for YoutubeTranscriptFetcher {
    async fn fetch_transcript(&self, video_url: &str) -> Result<String, TranscriptError> {
        let id = video_id(video_url)?;
        debug!(video_id = %id, language = %self.language, "fetching transcript");

        let page = self
            .get_text(&format!("{}/watch?v={id}", self.base_url))
            .await?;
        let tracks = parse_caption_tracks(&page)?;
        let track = pick_track(&tracks, &self.language).ok_or(TranscriptError::CaptionsDisabled)?;

        let track_url = if track.base_url.starts_with('/') {
            format!("{}{}", self.base_url, track.base_url)
        } else {
            track.base_url.clone()
        };
        let xml = self.get_text(&track_url).await?;

        let transcript = parse_caption_xml(&xml)?;
        if transcript.is_empty() {
            warn!(video_id = %id, "caption track has no text");
            return Err(TranscriptError::Unavailable(
                "the caption track is empty".to_string(),
            ));
        }

        debug!(video_id = %id, chars = transcript.len(), "fetched transcript");
        Ok(transcript)
    }
}

/// Read the `captionTracks` array embedded in a watch page.
fn parse_caption_tracks(page: &str) -> Result<Vec<CaptionTrack>, TranscriptError> {
    const MARKER: &str = "\"captionTracks\":";

    if page.contains("class=\"g-recaptcha\"") {
        return Err(TranscriptError::Unavailable(
            "YouTube is rate limiting transcript requests".to_string(),
        ));
    }

    let Some(start) = page.find(MARKER) else {
        if page.contains("\"playabilityStatus\":") {
            return Err(TranscriptError::CaptionsDisabled);
        }
        return Err(TranscriptError::Unavailable(
            "the video is unavailable".to_string(),
        ));
    };

    let tracks = serde_json::Deserializer::from_str(&page[start + MARKER.len()..])
        .into_iter::<Vec<CaptionTrack>>()
        .next()
        .ok_or(TranscriptError::CaptionsDisabled)?
        .map_err(|error| {
            TranscriptError::Unavailable(format!("could not read the caption track list: {error}"))
        })?;

    if tracks.is_empty() {
        return Err(TranscriptError::CaptionsDisabled);
    }
    Ok(tracks)
}

/// Manual captions in the preferred language, then generated ones, then
/// whatever comes first.
fn pick_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .find(|track| track.matches_language(language) && !track.is_generated())
        .or_else(|| tracks.iter().find(|track| track.matches_language(language)))
        .or_else(|| tracks.first())
}

type CachedPattern = OnceLock<Result<Regex, regex::Error>>;

fn compiled(cell: &'static CachedPattern, pattern: &str) -> Result<&'static Regex, TranscriptError> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(|error| TranscriptError::Unavailable(format!("invalid caption pattern: {error}")))
}

fn segment_pattern() -> Result<&'static Regex, TranscriptError> {
    static PATTERN: CachedPattern = OnceLock::new();
    compiled(&PATTERN, r"(?s)<text\b[^>]*>(.*?)</text>")
}

fn entity_pattern() -> Result<&'static Regex, TranscriptError> {
    static PATTERN: CachedPattern = OnceLock::new();
    compiled(&PATTERN, r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);")
}

fn decode_entities(entities: &Regex, text: &str) -> String {
    entities
        .replace_all(text, |captures: &Captures<'_>| {
            let entity = &captures[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(Result::ok)
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| captures[0].to_string(), String::from)
        })
        .into_owned()
}

/// Flatten timed-text XML into one line. Segment text is entity-decoded
/// twice since YouTube escapes the already-escaped caption text.
fn parse_caption_xml(xml: &str) -> Result<String, TranscriptError> {
    let entities = entity_pattern()?;
    Ok(segment_pattern()?
        .captures_iter(xml)
        .map(|captures| decode_entities(entities, &decode_entities(entities, &captures[1])))
        .map(|segment| segment.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(" "))
}

/// Exposes a [`TranscriptFetcher`] to the model as the `getYoutubeTranscript`
/// tool, for prompts that let the model decide when it needs a transcript.
/// The built-in video flows fetch the transcript up front instead.
///
/// ```no_run
/// # use codeverse_flows::{GenerateRequest, GenerativeClient, TranscriptTool, YoutubeTranscriptFetcher};
/// # use std::sync::Arc;
/// # async fn run(client: GenerativeClient) -> Result<(), codeverse_flows::FlowError> {
/// let fetcher = Arc::new(YoutubeTranscriptFetcher::new(reqwest::Client::new()));
/// let summary = client
///     .generate_text(
///         GenerateRequest::new("Summarize https://youtu.be/dQw4w9WgXcQ")
///             .tool(Arc::new(TranscriptTool::new(fetcher))),
///     )
///     .await?;
/// println!("{summary}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TranscriptTool {
    fetcher: Arc<dyn TranscriptFetcher>,
}

impl TranscriptTool {
    pub const NAME: &'static str = "getYoutubeTranscript";

    pub fn new(fetcher: Arc<dyn TranscriptFetcher>) -> Self {
        Self { fetcher }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptToolParams {
    video_url: String,
}

#[async_trait]
impl FlowTool for TranscriptTool {
    fn name(&self) -> String {
        Self::NAME.to_string()
    }

    fn description(&self) -> String {
        "Fetch the full transcript of a YouTube video as plain text.".to_string()
    }

    fn parameters(&self) -> JSONSchema {
        json!({
            "type": "object",
            "properties": {
                "videoUrl": {
                    "type": "string",
                    "description": "The URL of the YouTube video.",
                    "format": "uri"
                }
            },
            "required": ["videoUrl"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, BoxedError> {
        let params: TranscriptToolParams = serde_json::from_value(args)?;
        Ok(self.fetcher.fetch_transcript(&params.video_url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_short_links() {
        assert_eq!(
            normalize_video_url("https://youtu.be/ABC123?t=10").unwrap(),
            "https://www.youtube.com/watch?v=ABC123"
        );
    }

    #[test]
    fn normalizes_other_forms() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42s",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?start=3",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
            "youtu.be/dQw4w9WgXcQ",
        ] {
            assert_eq!(
                normalize_video_url(url).unwrap(),
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                "{url}"
            );
        }
    }

    #[test]
    fn rejects_non_video_urls() {
        for url in [
            "https://vimeo.com/12345",
            "https://www.youtube.com/",
            "https://www.youtube.com/watch?list=PL123",
            "https://youtu.be/",
            "https://youtu.be/abc$def",
            "not a url at all",
        ] {
            assert_eq!(
                normalize_video_url(url).unwrap_err(),
                TranscriptError::InvalidUrl(url.to_string()),
                "{url}"
            );
        }
    }

    const WATCH_PAGE: &str = r#"<script>var ytInitialPlayerResponse = {"playabilityStatus":{"status":"OK"},"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[{"baseUrl":"https://www.youtube.com/api/timedtext?v=ABC123&lang=de","name":{"simpleText":"German"},"languageCode":"de"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=ABC123&lang=en&kind=asr","languageCode":"en","kind":"asr"},{"baseUrl":"https://www.youtube.com/api/timedtext?v=ABC123&lang=en-GB","languageCode":"en-GB"}],"audioTracks":[]}}};</script>"#;

    #[test]
    fn reads_caption_tracks() {
        let tracks = parse_caption_tracks(WATCH_PAGE).unwrap();
        assert_eq!(tracks.len(), 3);
        assert_eq!(
            tracks[0].base_url,
            "https://www.youtube.com/api/timedtext?v=ABC123&lang=de"
        );
        assert!(tracks[1].is_generated());
    }

    #[test]
    fn picks_preferred_language() {
        let tracks = parse_caption_tracks(WATCH_PAGE).unwrap();
        assert_eq!(pick_track(&tracks, "en").unwrap().language_code, "en-GB");
        assert_eq!(pick_track(&tracks, "de").unwrap().language_code, "de");
        assert_eq!(pick_track(&tracks, "fr").unwrap().language_code, "de");
    }

    #[test]
    fn missing_tracks_mean_captions_disabled() {
        let page = r#"{"playabilityStatus":{"status":"OK"},"videoDetails":{}}"#;
        assert_eq!(
            parse_caption_tracks(page).unwrap_err(),
            TranscriptError::CaptionsDisabled
        );

        let page = r#"{"playabilityStatus":{"status":"OK"},"captions":{"playerCaptionsTracklistRenderer":{"captionTracks":[]}}}"#;
        assert_eq!(
            parse_caption_tracks(page).unwrap_err(),
            TranscriptError::CaptionsDisabled
        );
    }

    #[test]
    fn unavailable_pages() {
        assert!(matches!(
            parse_caption_tracks("<html>not found</html>"),
            Err(TranscriptError::Unavailable(_))
        ));
        assert!(matches!(
            parse_caption_tracks(r#"<div class="g-recaptcha"></div>"#),
            Err(TranscriptError::Unavailable(_))
        ));
    }

    #[test]
    fn flattens_caption_xml() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0" dur="1.5">Hello &amp;amp; welcome</text><text start="1.5" dur="2">it&amp;#39;s
a   &amp;quot;test&amp;quot;</text><text start="3.5" dur="1"> </text><text start="4.5" dur="1">a &amp;lt; b &#x2014; done</text></transcript>"#;
        assert_eq!(
            parse_caption_xml(xml).unwrap(),
            "Hello & welcome it's a \"test\" a < b \u{2014} done"
        );
    }

    #[test]
    fn unknown_entities_are_kept() {
        assert_eq!(
            decode_entities(entity_pattern().unwrap(), "&bogus; &#65;"),
            "&bogus; A"
        );
    }
}
