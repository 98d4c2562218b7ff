//! PDF document metadata schema.

use serde_json::{json, Value};

/// `{ summary, key_entities[], sections[{title, summary}] }`.
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {"type": "string"},
            "key_entities": {"type": "array", "items": {"type": "string"}},
            "sections": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string"},
                        "summary": {"type": "string"}
                    },
                    "required": ["title", "summary"]
                }
            }
        },
        "required": ["summary"]
    })
}

pub const PROMPT: &str = "Analyze this PDF document and extract metadata.\n\n\
Provide:\n\
- summary: An overall summary of the document\n\
- key_entities: List of key entities, names, or concepts mentioned\n\
- sections: List of major sections with title and summary\n\n\
PDF content:\n{text}\n\n\
Respond with valid JSON matching this schema: {schema}";
