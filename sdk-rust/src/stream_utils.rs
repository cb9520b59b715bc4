use crate::{ContentDelta, PartDelta};

/// Gemini stream chunks carry no part indexes, so one is guessed for each
/// incoming delta. Text deltas continue the last text delta; every tool call
/// gets a fresh index since several calls may share a tool name.
pub fn guess_delta_index(part: &PartDelta, all_content_deltas: &[&ContentDelta]) -> usize {
    if matches!(part, PartDelta::Text(_)) {
        if let Some(previous) = all_content_deltas
            .iter()
            .rev()
            .find(|delta| matches!(delta.part, PartDelta::Text(_)))
        {
            return previous.index;
        }
    }

    all_content_deltas
        .iter()
        .map(|delta| delta.index + 1)
        .max()
        .unwrap_or(0)
}
