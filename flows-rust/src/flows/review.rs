use super::{render_prompt, require_text, with_context};
use crate::{
    client::{GenerateRequest, GenerativeClient},
    schema::{Field, FlowSchema, ObjectSchema},
    FlowError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCodeInput {
    /// The learner's submission.
    pub code: String,
    /// The reference solution.
    pub solution: String,
    pub programming_language: String,
}

impl FlowSchema for ReviewCodeInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "ReviewCodeInput",
            "A learner's code and the reference solution for the same exercise.",
            vec![
                Field::string("code", "The code written by the learner."),
                Field::string("solution", "The reference solution."),
                Field::string("programmingLanguage", "The language of both programs."),
            ],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCodeOutput {
    pub feedback: String,
}

impl FlowSchema for ReviewCodeOutput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "ReviewCodeOutput",
            "",
            vec![Field::string(
                "feedback",
                "Constructive feedback on correctness, style and possible improvements.",
            )],
        )
    }
}

const PROMPT: &str = r"You are a senior {{programmingLanguage}} developer reviewing a student's code on CodeVerse.

Compare the student's code with the reference solution. Say whether the student's code is correct, explain any bugs or missing cases, and suggest improvements to readability and style. Be encouraging and do not paste the full solution back to the student.

Student's code:
```{{programmingLanguage}}
{{code}}
```

Reference solution:
```{{programmingLanguage}}
{{solution}}
```";

pub(super) async fn run(
    client: &GenerativeClient,
    input: &ReviewCodeInput,
) -> Result<ReviewCodeOutput, FlowError> {
    let prompt = render_prompt(PROMPT, input)?;
    let output: ReviewCodeOutput = client
        .generate_structured(GenerateRequest::new(prompt))
        .await
        .map_err(with_context("Failed to review the code"))?;

    require_text("feedback", &output.feedback)?;
    Ok(output)
}
