//! Local Ollama adapter. No native JSON-schema mode, so structured
//! extraction asks for `format: "json"` and retries a few times on a
//! parse failure before giving up and returning the schema's empty value.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{render_prompt, AdapterConfig, ExtractorAdapter, ImageDescription};

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) struct OllamaAdapter {
    http: reqwest::Client,
    base_url: String,
    fast_model: String,
    capable_model: String,
    vision_model: String,
}

impl OllamaAdapter {
    pub(crate) fn new(http: reqwest::Client, cfg: &AdapterConfig) -> Self {
        Self {
            http,
            base_url: cfg.ollama_url.clone(),
            fast_model: cfg.model_fast.clone(),
            capable_model: cfg.model_capable.clone(),
            vision_model: cfg.model_vision.clone(),
        }
    }

    async fn generate_structured(&self, prompt: &str, schema: &Value, model: &str) -> Value {
        for attempt in 1..=MAX_RETRIES {
            match self.generate(model, prompt, None).await {
                Ok(generated) => match serde_json::from_str::<Value>(&generated) {
                    Ok(parsed) if parsed.is_object() => return parsed,
                    Ok(_) => tracing::warn!(attempt, "ollama response was valid JSON but not an object"),
                    Err(err) => tracing::warn!(attempt, %err, "ollama response was not valid JSON"),
                },
                Err(err) => tracing::error!(attempt, %err, "ollama generate request failed"),
            }
        }
        enrichment_doc_schemas::empty_value_for_schema(schema)
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        images: Option<Vec<&str>>,
    ) -> anyhow::Result<String> {
        let mut body = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "format": "json"
        });
        if let Some(images) = images {
            body["images"] = json!(images);
        }

        let res = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("ollama http {status}: {body}");
        }

        let parsed: Value = res.json().await?;
        Ok(parsed["response"].as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl ExtractorAdapter for OllamaAdapter {
    async fn extract_metadata(
        &self,
        text: &str,
        doc_type: &str,
        schema: &Value,
        prompt_template: &str,
    ) -> Value {
        let prompt = render_prompt(prompt_template, doc_type, text, schema);
        self.generate_structured(&prompt, schema, &self.fast_model).await
    }

    async fn extract_entities(&self, text: &str) -> Value {
        let (schema, prompt_template) = enrichment_doc_schemas::entity_schema();
        let prompt = render_prompt(prompt_template, "entities", text, &schema);
        self.generate_structured(&prompt, &schema, &self.capable_model).await
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
        prompt.push_str(
            "Respond with valid JSON in this format:\n\
             {\"description\": \"...\", \"detected_objects\": [\"...\"], \"ocr_text\": \"...\", \"image_type\": \"...\"}",
        );

        match self.generate(&self.vision_model, &prompt, Some(vec![image_base64])).await {
            Ok(generated) => serde_json::from_str(&generated).unwrap_or_else(|err| {
                tracing::error!(%err, "ollama vision response was not valid JSON");
                ImageDescription::default()
            }),
            Err(err) => {
                tracing::error!(%err, "ollama vision request failed");
                ImageDescription::default()
            }
        }
    }

    async fn is_available(&self) -> bool {
        match self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(res) => res.status().is_success(),
            Err(err) => {
                tracing::warn!(%err, "ollama availability check failed");
                false
            }
        }
    }
}
