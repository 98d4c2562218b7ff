//! Anthropic Messages API adapter: tool use for structured extraction,
//! native image blocks for image description.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{render_prompt, AdapterConfig, ExtractorAdapter, ImageDescription};

const MAX_TOKENS: u32 = 4096;
const BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct AnthropicAdapter {
    http: reqwest::Client,
    api_key: String,
    fast_model: String,
    capable_model: String,
}

impl AnthropicAdapter {
    pub(crate) fn new(http: reqwest::Client, cfg: &AdapterConfig) -> Self {
        Self {
            http,
            api_key: cfg.anthropic_api_key.clone(),
            fast_model: cfg.model_fast.clone(),
            capable_model: cfg.model_capable.clone(),
        }
    }

    async fn send(&self, body: Value, timeout: Duration) -> anyhow::Result<Value> {
        let res = self
            .http
            .post(format!("{BASE_URL}/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("anthropic http {status}: {body}");
        }
        Ok(res.json().await?)
    }

    async fn extract_with_tool(
        &self,
        prompt: &str,
        schema: &Value,
        tool_name: &str,
        model: &str,
    ) -> Value {
        let body = json!({
            "model": model,
            "max_tokens": MAX_TOKENS,
            "tools": [{
                "name": tool_name,
                "description": format!("Extract structured data for {tool_name}"),
                "input_schema": schema
            }],
            "messages": [{"role": "user", "content": prompt}]
        });

        let response = match self.send(body, REQUEST_TIMEOUT).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(%err, "anthropic structured extraction request failed");
                return enrichment_doc_schemas::empty_value_for_schema(schema);
            }
        };

        response["content"]
            .as_array()
            .into_iter()
            .flatten()
            .find(|block| block["type"] == "tool_use")
            .map(|block| block["input"].clone())
            .unwrap_or_else(|| {
                tracing::warn!(tool_name, "no tool_use block in anthropic response");
                enrichment_doc_schemas::empty_value_for_schema(schema)
            })
    }
}

#[async_trait]
impl ExtractorAdapter for AnthropicAdapter {
    async fn extract_metadata(
        &self,
        text: &str,
        doc_type: &str,
        schema: &Value,
        prompt_template: &str,
    ) -> Value {
        let prompt = render_prompt(prompt_template, doc_type, text, schema);
        self.extract_with_tool(&prompt, schema, "metadata_extraction", &self.fast_model)
            .await
    }

    async fn extract_entities(&self, text: &str) -> Value {
        let (schema, prompt_template) = enrichment_doc_schemas::entity_schema();
        let prompt = render_prompt(prompt_template, "entities", text, &schema);
        self.extract_with_tool(&prompt, &schema, "entity_extraction", &self.capable_model)
            .await
    }

    async fn describe_image(&self, image_base64: &str, context: &str) -> ImageDescription {
        let mut prompt = "Describe this image in detail. Provide:\n\
            - description: A detailed description of the image\n\
            - detected_objects: List of main objects/entities visible in the image\n\
            - ocr_text: Any readable text visible in the image\n\
            - image_type: Classification (photo, diagram, screenshot, or chart)\n\n"
            .to_string();
        if !context.is_empty() {
            prompt.push_str(&format!("Context: {context}"));
        }

        let body = json!({
            "model": self.capable_model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {"type": "base64", "media_type": "image/jpeg", "data": image_base64}
                    },
                    {"type": "text", "text": prompt}
                ]
            }]
        });

        let response = match self.send(body, REQUEST_TIMEOUT).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(%err, "anthropic image description request failed");
                return ImageDescription::default();
            }
        };

        let text = response["content"][0]["text"].as_str().unwrap_or_default();
        parse_image_description(text)
    }

    async fn is_available(&self) -> bool {
        let body = json!({
            "model": self.fast_model,
            "max_tokens": 10,
            "messages": [{"role": "user", "content": "test"}]
        });
        match self.send(body, AVAILABILITY_TIMEOUT).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(%err, "anthropic availability check failed");
                false
            }
        }
    }
}

/// Parse an image description out of free-form response text: try a JSON
/// object embedded anywhere in the text first, falling back to treating
/// the whole response as the description.
fn parse_image_description(text: &str) -> ImageDescription {
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Ok(parsed) = serde_json::from_str::<ImageDescription>(&text[start..=end]) {
                return parsed;
            }
        }
    }
    ImageDescription {
        description: text.to_string(),
        ..ImageDescription::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_image_description_extracts_embedded_json() {
        let text = "Here you go:\n{\"description\": \"a cat\", \"image_type\": \"photo\"}\nok";
        let parsed = parse_image_description(text);
        assert_eq!(parsed.description, "a cat");
        assert_eq!(parsed.image_type, "photo");
    }

    #[test]
    fn parse_image_description_falls_back_to_raw_text() {
        let text = "just a plain sentence with no JSON";
        let parsed = parse_image_description(text);
        assert_eq!(parsed.description, text);
        assert!(parsed.detected_objects.is_empty());
    }
}
