//! Slack conversation metadata schema.

use serde_json::{json, Value};

/// `{ summary, decisions[], action_items[{task, assignee}], sentiment }`.
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {"type": "string"},
            "decisions": {"type": "array", "items": {"type": "string"}},
            "action_items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "task": {"type": "string"},
                        "assignee": {"type": "string"}
                    },
                    "required": ["task"]
                }
            },
            "sentiment": {"type": "string"}
        },
        "required": ["summary", "sentiment"]
    })
}

pub const PROMPT: &str = "Analyze this Slack conversation and extract metadata.\n\n\
Provide:\n\
- summary: A brief summary of the conversation\n\
- decisions: List of decisions made in the conversation\n\
- action_items: List of action items with task and assignee (if mentioned)\n\
- sentiment: Overall sentiment of the conversation (positive, neutral, or negative)\n\n\
Slack conversation:\n{text}\n\n\
Respond with valid JSON matching this schema: {schema}";
