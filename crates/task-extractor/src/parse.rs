//! Normalise raw model output into [`TaskProposal`]s.

use crate::error::ExtractorError;
use followup_core::types::TaskProposal;
use serde::Deserialize;
use serde_json::Value;

/// One task object as the model tends to emit it. Older prompts used other
/// key names; they are accepted as aliases.
#[derive(Debug, Default, Deserialize)]
struct RawTask {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, alias = "task_datetime", alias = "datetime")]
    date_time: Option<String>,
    #[serde(default, alias = "task_text")]
    task: Option<String>,
    #[serde(default, alias = "additional_comment", alias = "task_comment")]
    commentary: Option<String>,
    #[serde(default, alias = "marked_line")]
    source_line: Option<String>,
}

impl RawTask {
    fn into_proposal(self) -> TaskProposal {
        let action = self
            .task
            .filter(|t| !t.trim().is_empty())
            .or(self.kind)
            .unwrap_or_default();
        let mut proposal = TaskProposal::new(action.trim(), self.date_time.unwrap_or_default())
            .with_note(self.commentary.unwrap_or_default());
        if let Some(line) = self.source_line.filter(|l| !l.trim().is_empty()) {
            proposal = proposal.with_source_line(line);
        }
        proposal
    }
}

/// Strip a markdown fence and cut the outermost JSON array.
pub fn extract_json_array(raw: &str) -> Option<&str> {
    let mut body = raw.trim();
    if let Some(start) = body.find("```") {
        let after = &body[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        body = match after.find("```") {
            Some(end) => after[..end].trim(),
            None => after.trim(),
        };
    }
    let start = body.find('[')?;
    let end = body.rfind(']')?;
    (end > start).then(|| &body[start..=end])
}

/// Parse the model's answer. Anything that is not an array of objects is an
/// error; the caller turns it into "no tasks".
pub fn parse_proposals(raw: &str) -> Result<Vec<TaskProposal>, ExtractorError> {
    let json = extract_json_array(raw).ok_or_else(|| ExtractorError::NotAnArray(preview(raw)))?;
    let items: Vec<Value> = serde_json::from_str(json)?;

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            return Err(ExtractorError::NotAnObject(i));
        }
        let task: RawTask = serde_json::from_value(item)?;
        out.push(task.into_proposal());
    }
    Ok(out)
}

fn preview(raw: &str) -> String {
    raw.chars().take(120).collect()
}
