//! Image metadata schema — also the shape of an adapter's
//! `describe_image` result.

use serde_json::{json, Value};

/// `{ description, detected_objects[], ocr_text, image_type }`.
pub fn schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "description": {"type": "string"},
            "detected_objects": {"type": "array", "items": {"type": "string"}},
            "ocr_text": {"type": "string"},
            "image_type": {"type": "string"}
        },
        "required": ["description", "image_type"]
    })
}

pub const PROMPT: &str = "Describe this image in detail.\n\n\
Provide:\n\
- description: A detailed description of the image\n\
- detected_objects: List of main objects/entities visible in the image\n\
- ocr_text: Any readable text visible in the image\n\
- image_type: Classification (photo, diagram, screenshot, or chart)\n\n\
{text}\n\n\
Respond with valid JSON matching this schema: {schema}";
