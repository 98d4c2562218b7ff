//! Article/blog-post metadata schema.

use serde_json::{json, Value};

/// `{ summary, takeaways[], tags[], target_audience }`.
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {"type": "string"},
            "takeaways": {"type": "array", "items": {"type": "string"}},
            "tags": {"type": "array", "items": {"type": "string"}},
            "target_audience": {"type": "string"}
        },
        "required": ["summary"]
    })
}

pub const PROMPT: &str = "Analyze this article and extract metadata.\n\n\
Provide:\n\
- summary: A summary of the article\n\
- takeaways: List of key takeaways or main points\n\
- tags: List of relevant tags or topics\n\
- target_audience: Description of the intended audience\n\n\
Article:\n{text}\n\n\
Respond with valid JSON matching this schema: {schema}";
