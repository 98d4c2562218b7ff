use std::fmt;

use clap::{Parser, ValueEnum};
use reqwest::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// Local Ollama/HTTP backend (default).
    Ollama,
    /// OpenAI-style chat-completions JSON mode.
    Openai,
    /// Anthropic tool-use.
    Anthropic,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Ollama => "ollama",
            Provider::Openai => "openai",
            Provider::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "enrichment-worker", version, about = "Document enrichment worker")]
pub struct Cli {
    /// Control-API base URL.
    #[arg(long, env = "API_URL", default_value = "http://127.0.0.1:8080")]
    pub api_url: Url,

    /// Bearer token sent with every control-API call.
    #[arg(long, env = "API_TOKEN", default_value = "")]
    pub api_token: String,

    /// Which LLM backend to use for tier-3 extraction.
    #[arg(long, env = "EXTRACTOR_PROVIDER", value_enum, default_value_t = Provider::Ollama)]
    pub extractor_provider: Provider,

    /// Model used for per-chunk/document metadata extraction.
    #[arg(long, env = "EXTRACTOR_MODEL_FAST", default_value = "llama3.1")]
    pub extractor_model_fast: String,

    /// Model used for document-level entity/relationship extraction.
    #[arg(long, env = "EXTRACTOR_MODEL_CAPABLE", default_value = "llama3.1")]
    pub extractor_model_capable: String,

    /// Model used for image description.
    #[arg(long, env = "EXTRACTOR_MODEL_VISION", default_value = "llava")]
    pub extractor_model_vision: String,

    /// Base URL of a local Ollama server.
    #[arg(long, env = "OLLAMA_URL", default_value = "http://127.0.0.1:11434")]
    pub ollama_url: String,

    /// API key for the OpenAI provider.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    pub openai_api_key: String,

    /// API key for the Anthropic provider.
    #[arg(long, env = "ANTHROPIC_API_KEY", default_value = "")]
    pub anthropic_api_key: String,

    /// Number of consumer tasks to run concurrently.
    #[arg(long, env = "WORKER_CONCURRENCY", default_value_t = 4)]
    pub worker_concurrency: usize,

    /// Maximum delivery attempts before the control API dead-letters a task.
    ///
    /// Enforced server-side; accepted here only so deployments can set one
    /// env var across both processes. The worker reports failures the same
    /// way regardless of how many attempts remain.
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Queue name, echoed into structured log lines.
    #[arg(long, env = "QUEUE_NAME", default_value = "enrichment")]
    pub queue_name: String,
}
