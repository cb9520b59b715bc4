use super::{render_prompt, with_context};
use crate::{
    client::{GenerateRequest, GenerativeClient},
    schema::{Field, FieldKind, FlowSchema, ObjectSchema},
    FlowError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

pub const MAX_DISTRACTORS: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDistractorsInput {
    pub language: String,
    pub correct_snippets: Vec<String>,
    /// How many distractors to produce, between 1 and [`MAX_DISTRACTORS`].
    pub count: u32,
}

impl FlowSchema for GenerateDistractorsInput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "GenerateDistractorsInput",
            "",
            vec![
                Field::string("language", "The programming language of the snippets."),
                Field::array(
                    "correctSnippets",
                    FieldKind::String,
                    "The code tokens that belong in the answer.",
                ),
                Field::integer("count", "How many distractors to generate."),
            ],
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDistractorsOutput {
    pub distractors: Vec<String>,
}

impl FlowSchema for GenerateDistractorsOutput {
    fn schema() -> ObjectSchema {
        ObjectSchema::new(
            "GenerateDistractorsOutput",
            "",
            vec![Field::array(
                "distractors",
                FieldKind::String,
                "Short, plausible but incorrect code tokens.",
            )],
        )
    }
}

const PROMPT: &str = r"You create puzzles for a drag-and-drop coding game on CodeVerse. The player assembles a {{language}} program from code tokens. The correct tokens are:
{{#each correctSnippets}}- `{{this}}`
{{/each}}
Generate exactly {{count}} distractor tokens: short {{language}} code fragments that look like they could belong in the program but are wrong. Each distractor must resemble the style and length of the correct tokens, must not be identical to any correct token, and must be different from every other distractor.";

pub(super) async fn run(
    client: &GenerativeClient,
    input: &GenerateDistractorsInput,
) -> Result<GenerateDistractorsOutput, FlowError> {
    if !(1..=MAX_DISTRACTORS).contains(&input.count) {
        return Err(FlowError::InvalidInput(format!(
            "count must be between 1 and {MAX_DISTRACTORS}, got {}",
            input.count
        )));
    }
    if input.correct_snippets.is_empty() {
        return Err(FlowError::InvalidInput(
            "at least one correct snippet is required".to_string(),
        ));
    }

    let prompt = render_prompt(PROMPT, input)?;
    let output: GenerateDistractorsOutput = client
        .generate_structured(GenerateRequest::new(prompt))
        .await
        .map_err(with_context("Failed to generate distractors"))?;

    let generated = output.distractors.len();
    let distractors = clean_distractors(output.distractors, &input.correct_snippets, input.count);
    if distractors.is_empty() {
        return Err(FlowError::EmptyResult(
            "the model returned no usable distractors".to_string(),
        ));
    }
    if distractors.len() != generated {
        debug!(generated, kept = distractors.len(), "adjusted distractors");
    }

    Ok(GenerateDistractorsOutput { distractors })
}

/// Drop blanks, correct tokens and repeats, then cap at `count`.
fn clean_distractors(distractors: Vec<String>, correct: &[String], count: u32) -> Vec<String> {
    let correct: HashSet<&str> = correct.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    distractors
        .into_iter()
        .filter(|distractor| !distractor.trim().is_empty())
        .filter(|distractor| !correct.contains(distractor.as_str()))
        .filter(|distractor| seen.insert(distractor.clone()))
        .take(usize::try_from(count).unwrap_or(usize::MAX))
        .collect()
}
