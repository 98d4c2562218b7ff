//! Email message metadata schema.

use serde_json::{json, Value};

/// `{ urgency, intent, action_items[{task, assignee}], summary }`.
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "urgency": {"type": "string"},
            "intent": {"type": "string"},
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
            "summary": {"type": "string"}
        },
        "required": ["urgency", "intent", "summary"]
    })
}

pub const PROMPT: &str = "Analyze this email and extract metadata.\n\n\
Provide:\n\
- urgency: Urgency level (low, normal, high, or critical)\n\
- intent: Main intent (request, fyi, approval, or escalation)\n\
- action_items: List of action items mentioned with task and assignee if specified\n\
- summary: A brief summary of the email\n\n\
Email:\n{text}\n\n\
Respond with valid JSON matching this schema: {schema}";
