#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Static registry of tier-3 JSON schemas and prompt templates, one pair
//! per [`DocType`], plus the shared entity/relationship schema and the
//! empty-value fallback used when a provider returns malformed output.

mod schemas;

use enrichment_types::DocType;
use serde_json::Value;

/// Resolve the `(schema, promptTemplate)` pair for a document type.
///
/// Total over every [`DocType`] variant; since unrecognized wire tags
/// already deserialize to [`DocType::Text`] upstream, this function needs
/// no separate "unknown" arm to stay total over strings.
pub fn schema_for_doctype(doc_type: DocType) -> (Value, &'static str) {
    match doc_type {
        DocType::Code => (schemas::code::schema(), schemas::code::PROMPT),
        DocType::Slack => (schemas::slack::schema(), schemas::slack::PROMPT),
        DocType::Email => (schemas::email::schema(), schemas::email::PROMPT),
        DocType::Meeting => (schemas::meeting::schema(), schemas::meeting::PROMPT),
        DocType::Image => (schemas::image::schema(), schemas::image::PROMPT),
        DocType::Pdf => (schemas::pdf::schema(), schemas::pdf::PROMPT),
        DocType::Article => (schemas::article::schema(), schemas::article::PROMPT),
        DocType::Text => (schemas::text::schema(), schemas::text::PROMPT),
    }
}

/// The shared entity/relationship extraction schema and prompt, used by
/// every adapter's `extract_entities` call regardless of `docType`.
pub fn entity_schema() -> (Value, &'static str) {
    (schemas::entities::schema(), schemas::entities::PROMPT)
}

/// Build the all-defaults object a provider's structured-output call
/// should fall back to when it can't produce (or can't parse) a real
/// response: strings become `""`, arrays become `[]`, objects recurse,
/// and anything else becomes `null`.
pub fn empty_value_for_schema(schema: &Value) -> Value {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Value::Object(Default::default());
    };

    let mut object = serde_json::Map::with_capacity(properties.len());
    for (key, prop) in properties {
        object.insert(key.clone(), empty_value_for_property(prop));
    }
    Value::Object(object)
}

fn empty_value_for_property(prop: &Value) -> Value {
    match prop.get("type").and_then(Value::as_str) {
        Some("array") => Value::Array(Vec::new()),
        Some("object") => empty_value_for_schema(prop),
        Some("number") => Value::from(0),
        Some("boolean") => Value::Bool(false),
        _ => Value::String(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_for_doctype_is_total_over_every_variant() {
        for dt in [
            DocType::Code,
            DocType::Slack,
            DocType::Email,
            DocType::Meeting,
            DocType::Image,
            DocType::Pdf,
            DocType::Article,
            DocType::Text,
        ] {
            let (schema, prompt) = schema_for_doctype(dt);
            assert!(schema.get("properties").is_some());
            assert!(prompt.contains("{text}"));
            assert!(prompt.contains("{schema}"));
        }
    }

    #[test]
    fn unknown_wire_tag_routes_through_text_fallback() {
        let dt: DocType = serde_json::from_str("\"unknown-format\"").unwrap();
        assert_eq!(dt, DocType::Text);
        let (schema, _) = schema_for_doctype(dt);
        assert_eq!(schema, schemas::text::schema());
    }

    #[test]
    fn empty_value_for_text_schema_has_defaults_for_every_property() {
        let empty = empty_value_for_schema(&schemas::text::schema());
        assert_eq!(empty["summary"], Value::String(String::new()));
        assert_eq!(empty["key_entities"], Value::Array(Vec::new()));
    }

    #[test]
    fn empty_value_for_meeting_schema_handles_nested_object_arrays() {
        let empty = empty_value_for_schema(&schemas::meeting::schema());
        assert_eq!(empty["decisions"], Value::Array(Vec::new()));
        assert_eq!(empty["action_items"], Value::Array(Vec::new()));
        assert_eq!(empty["topic_segments"], Value::Array(Vec::new()));
    }

    #[test]
    fn entity_schema_prompt_carries_required_placeholders() {
        let (schema, prompt) = entity_schema();
        assert!(schema["properties"]["entities"].is_object());
        assert!(schema["properties"]["relationships"].is_object());
        assert!(prompt.contains("{text}"));
    }
}
