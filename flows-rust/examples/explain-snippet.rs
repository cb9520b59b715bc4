use codeverse_flows::{ExplainCodeSnippetInput, FlowsConfig};
use std::error::Error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = FlowsConfig::from_env()?;
    let flows = config.flows_builder()?.build();

    let output = flows
        .explain_code_snippet(ExplainCodeSnippetInput {
            code_snippet: "fn main() {\n    let v: Vec<i32> = (1..=5).map(|x| x * x).collect();\n    println!(\"{v:?}\");\n}"
                .to_string(),
        })
        .await?;

    println!("{}", output.explanation);
    Ok(())
}
