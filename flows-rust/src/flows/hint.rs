use super::{render_prompt, require_text, with_context};
use crate::{
    client::{GenerateRequest, GenerativeClient},
    schema::{Field, FlowSchema, ObjectSchema},
    FlowError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvideHintInput {
    pub problem_statement: String,
    /// The learner's attempt so far, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
}

impl FlowSchema for ProvideHintInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "ProvideHintInput",
            "A practice problem and, optionally, the learner's current attempt.",
            vec![
                Field::string("problemStatement", "The practice problem."),
                Field::string("userCode", "The learner's current code.").optional(),
            ],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvideHintOutput {
    pub hint: String,
}

impl FlowSchema for ProvideHintOutput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "ProvideHintOutput",
            "",
            vec![Field::string(
                "hint",
                "A short hint that moves the learner forward without revealing the solution.",
            )],
        )
    }
}

const PROMPT: &str = r"You are a patient coding coach on CodeVerse. A student is stuck on a practice problem.

Give one helpful hint that guides the student toward the next step. Do not write the solution and do not include complete code.

Problem:
{{problemStatement}}
{{#if userCode}}
The student's current code:
```
{{userCode}}
```
Base the hint on what the student has written so far.
{{else}}
The student has not written any code yet. Help them get started.
{{/if}}";

pub(super) async fn run(
    client: &GenerativeClient,
    input: &ProvideHintInput,
) -> Result<ProvideHintOutput, FlowError> {
    let prompt = render_prompt(PROMPT, input)?;
    let output: ProvideHintOutput = client
        .generate_structured(GenerateRequest::new(prompt))
        .await
        .map_err(with_context("Failed to generate a hint"))?;

    require_text("hint", &output.hint)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_code_only_when_given() {
        let with_code = render_prompt(
            PROMPT,
            &ProvideHintInput {
                problem_statement: "Reverse a string.".to_string(),
                user_code: Some("fn reverse(s: &str) {}".to_string()),
            },
        )
        .unwrap();
        assert!(with_code.contains("fn reverse(s: &str) {}"));
        assert!(!with_code.contains("has not written any code"));

        let without_code = render_prompt(
            PROMPT,
            &ProvideHintInput {
                problem_statement: "Reverse a string.".to_string(),
                user_code: None,
            },
        )
        .unwrap();
        assert!(without_code.contains("has not written any code"));
    }
}
