use super::{render_prompt, require_text, with_context};
use crate::{
    client::{GenerateRequest, GenerativeClient},
    schema::{Field, FlowSchema, ObjectSchema},
    FlowError,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCourseDescriptionInput {
    pub course_title: String,
}

impl FlowSchema for GenerateCourseDescriptionInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "GenerateCourseDescriptionInput",
            "",
            vec![Field::string("courseTitle", "The title of the course.")],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCourseDescriptionOutput {
    pub description: String,
}

impl FlowSchema for GenerateCourseDescriptionOutput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "GenerateCourseDescriptionOutput",
            "",
            vec![Field::string(
                "description",
                "An engaging course description of two or three short paragraphs.",
            )],
        )
    }
}

const PROMPT: &str = r#"You write course catalog copy for CodeVerse, an online platform for learning to code.

Write an engaging description for a course titled "{{courseTitle}}". Explain who the course is for, what the student will learn, and what they will be able to build by the end. Use two or three short paragraphs of plain text."#;

pub(super) async fn run(
    client: &GenerativeClient,
    input: &GenerateCourseDescriptionInput,
) -> Result<GenerateCourseDescriptionOutput, FlowError> {
    let prompt = render_prompt(PROMPT, input)?;
    let output: GenerateCourseDescriptionOutput = client
        .generate_structured(GenerateRequest::new(prompt))
        .await
        .map_err(with_context("Failed to generate the course description"))?;

    require_text("description", &output.description)?;
    Ok(output)
}
