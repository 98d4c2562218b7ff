//! OpenAI Chat Completions adapter: JSON mode for structured extraction,
//! vision input for image description.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{render_prompt, AdapterConfig, ExtractorAdapter, ImageDescription};

const MAX_TOKENS: u32 = 4096;
const BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct OpenAiAdapter {
    http: reqwest::Client,
    api_key: String,
    fast_model: String,
    capable_model: String,
}

impl OpenAiAdapter {
    pub(crate) fn new(http: reqwest::Client, cfg: &AdapterConfig) -> Self {
        Self {
            http,
            api_key: cfg.openai_api_key.clone(),
            fast_model: cfg.model_fast.clone(),
            capable_model: cfg.model_capable.clone(),
        }
    }

    async fn extract_structured(&self, prompt: &str, schema: &Value, model: &str) -> Value {
        let body = json!({
            "model": model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a helpful assistant that extracts structured data. Always respond with valid JSON."
                },
                {"role": "user", "content": prompt}
            ],
            "max_tokens": MAX_TOKENS,
            "response_format": {"type": "json_object"}
        });

        match self.chat_completion(body, REQUEST_TIMEOUT).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                tracing::error!(%err, "openai returned non-JSON structured response");
                enrichment_doc_schemas::empty_value_for_schema(schema)
            }),
            Err(err) => {
                tracing::error!(%err, "openai structured extraction request failed");
                enrichment_doc_schemas::empty_value_for_schema(schema)
            }
        }
    }

    async fn chat_completion(&self, body: Value, timeout: Duration) -> anyhow::Result<String> {
        let res = self
            .http
            .post(format!("{BASE_URL}/chat/completions"))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("openai http {status}: {body}");
        }

        let parsed: Value = res.json().await?;
        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("openai response missing choices[0].message.content"))
    }
}

#[async_trait]
impl ExtractorAdapter for OpenAiAdapter {
    async fn extract_metadata(
        &self,
        text: &str,
        doc_type: &str,
        schema: &Value,
        prompt_template: &str,
    ) -> Value {
        let prompt = render_prompt(prompt_template, doc_type, text, schema);
        self.extract_structured(&prompt, schema, &self.fast_model).await
    }

    async fn extract_entities(&self, text: &str) -> Value {
        let (schema, prompt_template) = enrichment_doc_schemas::entity_schema();
        let prompt = render_prompt(prompt_template, "entities", text, &schema);
        self.extract_structured(&prompt, &schema, &self.capable_model).await
    }

    async fn describe_image(&self, image_base64: &str, context: &str) -> ImageDescription {
        let mut prompt = "Describe this image in detail. Provide:\n\
            - description: A detailed description of the image\n\
            - detected_objects: List of main objects/entities visible\n\
            - ocr_text: Any text visible in the image\n\
            - image_type: Classification (photo, diagram, screenshot, chart)\n\n"
            .to_string();
        if !context.is_empty() {
            prompt.push_str(&format!("Context: {context}\n\n"));
        }
        prompt.push_str("Respond in JSON format.");

        let body = json!({
            "model": self.capable_model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {"url": format!("data:image/jpeg;base64,{image_base64}")}}
                ]
            }],
            "max_tokens": MAX_TOKENS,
            "response_format": {"type": "json_object"}
        });

        match self.chat_completion(body, REQUEST_TIMEOUT).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                tracing::error!(%err, "openai returned non-JSON image description");
                ImageDescription::default()
            }),
            Err(err) => {
                tracing::error!(%err, "openai image description request failed");
                ImageDescription::default()
            }
        }
    }

    async fn is_available(&self) -> bool {
        let body = json!({
            "model": self.fast_model,
            "messages": [{"role": "user", "content": "test"}],
            "max_tokens": 5
        });
        match self.chat_completion(body, AVAILABILITY_TIMEOUT).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(%err, "openai availability check failed");
                false
            }
        }
    }
}
