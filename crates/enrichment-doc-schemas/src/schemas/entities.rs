//! Entity/relationship extraction schema shared by every adapter's
//! `extract_entities` call — not routed by `docType`.

use serde_json::{json, Value};

/// `{ entities[{name, type, description}], relationships[{source, target, type, description}] }`.
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "entities": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "type": {"type": "string"},
                        "description": {"type": "string"}
                    },
                    "required": ["name", "type", "description"]
                }
            },
            "relationships": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "source": {"type": "string"},
                        "target": {"type": "string"},
                        "type": {"type": "string"},
                        "description": {"type": "string"}
                    },
                    "required": ["source", "target", "type"]
                }
            }
        },
        "required": ["entities", "relationships"]
    })
}

pub const PROMPT: &str = "Extract entities and relationships from this text.\n\n\
Text:\n{text}\n\n\
For each entity, identify:\n\
- name: entity name\n\
- type: entity type (person, class, concept, project, org, etc.)\n\
- description: brief description\n\n\
For each relationship between entities:\n\
- source: source entity name\n\
- target: target entity name\n\
- type: relationship type (uses, depends-on, discusses, implements, etc.)\n\
- description: brief description\n\n\
Respond with valid JSON matching this schema: {schema}";
