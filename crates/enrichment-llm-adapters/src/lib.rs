#![forbid(unsafe_code)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]

//! Pluggable tier-3 LLM extraction adapters.
//!
//! One [`ExtractorAdapter`] implementation per supported provider
//! (OpenAI-style JSON mode, Anthropic tool use, and a local Ollama/HTTP
//! backend), selected at startup from `EXTRACTOR_PROVIDER` by
//! [`build_adapter`]. Every extraction method is infallible from the
//! caller's perspective: network and parse failures are swallowed and
//! reported as the schema's empty value, mirroring the
//! try/except-to-empty-default shape every adapter in the original
//! implementation used.

mod anthropic;
mod ollama;
mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a `describe_image` call. Always fully populated — absent
/// fields default to empty rather than making the caller handle `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageDescription {
    /// Detailed description of the image.
    #[serde(default)]
    pub description: String,
    /// Main objects/entities visible in the image.
    #[serde(default)]
    pub detected_objects: Vec<String>,
    /// Any text recognized in the image.
    #[serde(default)]
    pub ocr_text: String,
    /// Classification: `photo`, `diagram`, `screenshot`, or `chart`.
    #[serde(default)]
    pub image_type: String,
}

/// Four-operation interface every LLM extraction backend implements.
#[async_trait]
pub trait ExtractorAdapter: Send + Sync {
    /// Extract type-specific metadata from `text` using the fast model,
    /// following `schema` and, if non-empty, `prompt_template`
    /// (`{text}`/`{schema}` placeholders substituted in).
    async fn extract_metadata(
        &self,
        text: &str,
        doc_type: &str,
        schema: &Value,
        prompt_template: &str,
    ) -> Value;

    /// Extract document-level entities and relationships using the
    /// capable model. Returns `{ "entities": [...], "relationships": [...] }`.
    async fn extract_entities(&self, text: &str) -> Value;

    /// Describe an image using the vision model.
    async fn describe_image(&self, image_base64: &str, context: &str) -> ImageDescription;

    /// Check whether the provider is currently reachable.
    async fn is_available(&self) -> bool;
}

/// Environment-driven adapter configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// `EXTRACTOR_PROVIDER`: one of `ollama`, `openai`, `anthropic`.
    pub provider: String,
    /// `EXTRACTOR_MODEL_FAST`: model used for per-chunk tier-2/3 metadata.
    pub model_fast: String,
    /// `EXTRACTOR_MODEL_CAPABLE`: model used for entity/relationship extraction.
    pub model_capable: String,
    /// `EXTRACTOR_MODEL_VISION`: model used for image description.
    pub model_vision: String,
    /// `OLLAMA_URL`: base URL of a local Ollama server.
    pub ollama_url: String,
    /// `OPENAI_API_KEY`, required when `provider == "openai"`.
    pub openai_api_key: String,
    /// `ANTHROPIC_API_KEY`, required when `provider == "anthropic"`.
    pub anthropic_api_key: String,
}

/// Build the configured [`ExtractorAdapter`], reusing the process-wide
/// `http` client the same way the control-plane client does.
///
/// Fails fast, matching the original per-adapter constructors, when the
/// selected provider's required API key is missing.
pub fn build_adapter(
    cfg: &AdapterConfig,
    http: reqwest::Client,
) -> anyhow::Result<Box<dyn ExtractorAdapter>> {
    match cfg.provider.as_str() {
        "openai" => {
            if cfg.openai_api_key.is_empty() {
                anyhow::bail!("OPENAI_API_KEY is required when EXTRACTOR_PROVIDER=openai");
            }
            Ok(Box::new(openai::OpenAiAdapter::new(http, cfg)))
        }
        "anthropic" => {
            if cfg.anthropic_api_key.is_empty() {
                anyhow::bail!(
                    "ANTHROPIC_API_KEY is required when EXTRACTOR_PROVIDER=anthropic"
                );
            }
            Ok(Box::new(anthropic::AnthropicAdapter::new(http, cfg)))
        }
        "ollama" => Ok(Box::new(ollama::OllamaAdapter::new(http, cfg))),
        other => anyhow::bail!("unknown EXTRACTOR_PROVIDER: {other}"),
    }
}

/// Substitute `{text}` (truncated to 8000 characters, matching every
/// reference adapter) and `{schema}` (pretty-printed) into a prompt
/// template, or build the generic fallback prompt when no template is
/// supplied.
pub(crate) fn render_prompt(template: &str, doc_type: &str, text: &str, schema: &Value) -> String {
    let truncated: String = text.chars().take(8000).collect();
    if template.is_empty() {
        return format!(
            "Analyze this {doc_type} document and extract metadata according to the schema.\n\n\
             Text:\n{truncated}\n\n\
             Schema:\n{}\n\n\
             Extract the metadata as JSON.",
            serde_json::to_string_pretty(schema).unwrap_or_default()
        );
    }
    template
        .replace("{text}", &truncated)
        .replace("{schema}", &serde_json::to_string_pretty(schema).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_prompt_substitutes_both_placeholders() {
        let schema = json!({"type": "object"});
        let rendered = render_prompt("Body: {text}\nSchema: {schema}", "text", "hello", &schema);
        assert!(rendered.contains("Body: hello"));
        assert!(rendered.contains("\"object\""));
    }

    #[test]
    fn render_prompt_truncates_to_8000_chars() {
        let long_text = "a".repeat(9000);
        let rendered = render_prompt("{text}", "text", &long_text, &json!({}));
        assert_eq!(rendered.chars().count(), 8000);
    }

    #[test]
    fn render_prompt_falls_back_when_template_empty() {
        let rendered = render_prompt("", "code", "fn main() {}", &json!({"type": "object"}));
        assert!(rendered.contains("code document"));
        assert!(rendered.contains("fn main() {}"));
    }

    #[test]
    fn build_adapter_rejects_unknown_provider() {
        let cfg = AdapterConfig {
            provider: "carrier-pigeon".to_string(),
            model_fast: String::new(),
            model_capable: String::new(),
            model_vision: String::new(),
            ollama_url: String::new(),
            openai_api_key: String::new(),
            anthropic_api_key: String::new(),
        };
        assert!(build_adapter(&cfg, reqwest::Client::new()).is_err());
    }

    #[test]
    fn build_adapter_requires_api_key_for_openai() {
        let cfg = AdapterConfig {
            provider: "openai".to_string(),
            model_fast: "gpt-4o-mini".to_string(),
            model_capable: "gpt-4o".to_string(),
            model_vision: "gpt-4o".to_string(),
            ollama_url: String::new(),
            openai_api_key: String::new(),
            anthropic_api_key: String::new(),
        };
        assert!(build_adapter(&cfg, reqwest::Client::new()).is_err());
    }
}
