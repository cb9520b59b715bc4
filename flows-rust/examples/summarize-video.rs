use codeverse_flows::{FlowsConfig, GenerateRequest, TranscriptTool};
use std::{env, error::Error, sync::Arc};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let video_url = env::args()
        .nth(1)
        .ok_or("usage: summarize-video <youtube-url>")?;

    let config = FlowsConfig::from_env()?;
    let http = config.http_client()?;
    let client = config.build_client(http.clone())?;
    let transcripts = Arc::new(config.build_transcript_fetcher(http));

    // The model decides when to fetch the transcript.
    let summary = client
        .generate_text(
            GenerateRequest::new(format!(
                "Summarize the YouTube video at {video_url} for a beginner programmer in three bullet points."
            ))
            .system_prompt("You are CodeVerse AI, a friendly programming tutor.")
            .tool(Arc::new(TranscriptTool::new(transcripts))),
        )
        .await?;

    println!("{summary}");
    Ok(())
}
