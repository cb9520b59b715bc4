use codeverse_flows::{ExtractVideoInsightsInput, FlowsConfig};
use std::{env, error::Error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let video_url = env::args()
        .nth(1)
        .ok_or("usage: video-insights <youtube-url>")?;

    let flows = FlowsConfig::from_env()?.flows_builder()?.build();
    let insights = flows
        .extract_video_insights(ExtractVideoInsightsInput { video_url })
        .await?;

    println!("{}\n", insights.summary);
    for (index, question) in insights.questions.iter().enumerate() {
        println!("{}. {}", index + 1, question.question);
        for option in &question.options {
            let marker = if *option == question.correct_answer { "*" } else { " " };
            println!("   {marker} {option}");
        }
    }
    Ok(())
}
