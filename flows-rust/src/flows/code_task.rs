use super::{render_prompt, require_text, with_context};
use crate::{
    client::{GenerateRequest, GenerativeClient},
    schema::{Field, FlowSchema, ObjectSchema},
    FlowError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeTaskInput {
    pub topic_title: String,
    pub programming_language: String,
}

impl FlowSchema for GenerateCodeTaskInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "GenerateCodeTaskInput",
            "",
            vec![
                Field::string("topicTitle", "The topic the exercise practices."),
                Field::string("programmingLanguage", "The language to solve it in."),
            ],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeTaskOutput {
    /// The exercise, in markdown.
    pub task: String,
}

impl FlowSchema for GenerateCodeTaskOutput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "GenerateCodeTaskOutput",
            "",
            vec![Field::string(
                "task",
                "The coding exercise in markdown: a title, the problem statement, input and output format, and one or two examples.",
            )],
        )
    }
}

const PROMPT: &str = r#"You design coding exercises for CodeVerse, an online platform for learning to code.

Create one self-contained practice exercise for the topic "{{topicTitle}}" to be solved in {{programmingLanguage}}. The exercise should be solvable in under 30 minutes by a student who has just studied the topic.

Format the task as markdown with:
- a short title as a level-2 heading
- the problem statement
- the expected input and output
- one or two examples in fenced code blocks

Do not include the solution."#;

pub(super) async fn run(
    client: &GenerativeClient,
    input: &GenerateCodeTaskInput,
) -> Result<GenerateCodeTaskOutput, FlowError> {
    let prompt = render_prompt(PROMPT, input)?;
    let output: GenerateCodeTaskOutput = client
        .generate_structured(GenerateRequest::new(prompt))
        .await
        .map_err(with_context("Failed to generate the code task"))?;

    require_text("task", &output.task)?;
    Ok(output)
}
