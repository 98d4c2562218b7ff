//! Meeting notes metadata schema.

use serde_json::{json, Value};

/// `{ decisions[], action_items[{task, assignee, deadline}], topic_segments[{topic, summary}] }`.
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "decisions": {"type": "array", "items": {"type": "string"}},
            "action_items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "task": {"type": "string"},
                        "assignee": {"type": "string"},
                        "deadline": {"type": "string"}
                    },
                    "required": ["task"]
                }
            },
            "topic_segments": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "topic": {"type": "string"},
                        "summary": {"type": "string"}
                    },
                    "required": ["topic", "summary"]
                }
            }
        },
        "required": []
    })
}

pub const PROMPT: &str = "Analyze these meeting notes and extract metadata.\n\n\
Provide:\n\
- decisions: List of decisions made in the meeting\n\
- action_items: List of action items with task, assignee, and deadline (if mentioned)\n\
- topic_segments: List of topics discussed with a summary for each\n\n\
Meeting notes:\n{text}\n\n\
Respond with valid JSON matching this schema: {schema}";
