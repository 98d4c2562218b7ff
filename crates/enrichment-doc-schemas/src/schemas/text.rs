//! Generic text document metadata schema — also the fallback for unknown
//! `docType` tags.

use serde_json::{json, Value};

/// JSON schema for [`DocType::Text`](enrichment_types::DocType) metadata:
/// `{ summary: string, key_entities: string[] }`.
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {"type": "string"},
            "key_entities": {"type": "array", "items": {"type": "string"}}
        },
        "required": ["summary"]
    })
}

pub const PROMPT: &str = "Analyze this text and extract metadata.\n\n\
Provide:\n\
- summary: A concise summary of the text\n\
- key_entities: List of key entities, names, or concepts mentioned\n\n\
Text:\n{text}\n\n\
Respond with valid JSON matching this schema: {schema}";
