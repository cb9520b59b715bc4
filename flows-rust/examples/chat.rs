use codeverse_flows::{ChatInput, ChatMessage, FlowsConfig};
use futures::StreamExt;
use std::{
    error::Error,
    io::{self, BufRead, Write},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let flows = FlowsConfig::from_env()?.flows_builder()?.build();
    let mut messages = Vec::new();

    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            break;
        }
        messages.push(ChatMessage::user(line));

        let mut stream = flows
            .chat(ChatInput {
                messages: messages.clone(),
            })
            .await?;

        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let text = String::from_utf8_lossy(&chunk);
            print!("{text}");
            io::stdout().flush()?;
            reply.push_str(&text);
        }
        println!();
        messages.push(ChatMessage::model(reply));

        print!("> ");
        io::stdout().flush()?;
    }
    Ok(())
}
