use super::{render_prompt, require_text, with_context};
use crate::{
    client::{GenerateRequest, GenerativeClient},
    schema::{Field, FlowSchema, ObjectSchema},
    FlowError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExplainCodeSnippetInput {
    pub code_snippet: String,
}

impl FlowSchema for ExplainCodeSnippetInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "ExplainCodeSnippetInput",
            "A code snippet a learner wants explained.",
            vec![Field::string("codeSnippet", "The code snippet to explain.")],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExplainCodeSnippetOutput {
    pub explanation: String,
}

impl FlowSchema for ExplainCodeSnippetOutput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "ExplainCodeSnippetOutput",
            "",
            vec![Field::string(
                "explanation",
                "A clear, beginner-friendly explanation of the code snippet.",
            )],
        )
    }
}

const PROMPT: &str = r"You are an expert programming tutor on CodeVerse, an online platform for learning to code.

Explain the following code snippet to a student. Describe what it does step by step, point out the important language features it uses, and mention any pitfalls a beginner should watch for. Keep the explanation clear and concise.

Code snippet:
```
{{codeSnippet}}
```";

pub(super) async fn run(
    client: &GenerativeClient,
    input: &ExplainCodeSnippetInput,
) -> Result<ExplainCodeSnippetOutput, FlowError> {
    let prompt = render_prompt(PROMPT, input)?;
    let output: ExplainCodeSnippetOutput = client
        .generate_structured(GenerateRequest::new(prompt))
        .await
        .map_err(with_context("Failed to explain the code snippet"))?;

    require_text("explanation", &output.explanation)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::PromptTemplate;

    #[test]
    fn prompt_reads_declared_fields() {
        PromptTemplate::parse_for(PROMPT, &ExplainCodeSnippetInput::schema()).unwrap();
    }
}
