//! Code document metadata schema.

use serde_json::{json, Value};

/// `{ summary: string, purpose: string, complexity: string }`.
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {"type": "string"},
            "purpose": {"type": "string"},
            "complexity": {"type": "string"}
        },
        "required": ["summary", "purpose", "complexity"]
    })
}

pub const PROMPT: &str = "Analyze this code and extract metadata.\n\n\
Provide:\n\
- summary: A 1-2 sentence summary of what this code does\n\
- purpose: The purpose of this code in the broader system\n\
- complexity: Rate the complexity as \"low\", \"medium\", or \"high\"\n\n\
Code:\n{text}\n\n\
Respond with valid JSON matching this schema: {schema}";
