//! Server configuration read from the environment.

use std::path::PathBuf;

use anyhow::{Context, bail};
use docqa_rag::RagConfig;
use docqa_rag::hashing::DEFAULT_DIMENSIONS;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token every protected route requires.
    pub api_key: String,
    pub groq_api_key: String,
    pub groq_model: Option<String>,
    pub groq_base_url: Option<String>,
    /// Directory of the persistent index; in-memory when unset.
    pub data_dir: Option<PathBuf>,
    pub embedding_dimensions: usize,
    pub rag: RagConfig,
}

impl ServerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a configuration from a variable lookup.
    ///
    /// `DOCQA_API_KEY` and `GROQ_API_KEY` are required; everything else has a
    /// default.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let Some(api_key) = non_empty("DOCQA_API_KEY") else {
            bail!("DOCQA_API_KEY must be set");
        };
        let Some(groq_api_key) = non_empty("GROQ_API_KEY") else {
            bail!("GROQ_API_KEY must be set");
        };

        let port = match non_empty("DOCQA_PORT") {
            Some(port) => port.parse::<u16>().with_context(|| format!("invalid DOCQA_PORT '{port}'"))?,
            None => 8000,
        };
        let embedding_dimensions = match non_empty("DOCQA_EMBEDDING_DIMENSIONS") {
            Some(dims) => dims
                .parse::<usize>()
                .with_context(|| format!("invalid DOCQA_EMBEDDING_DIMENSIONS '{dims}'"))?,
            None => DEFAULT_DIMENSIONS,
        };
        if embedding_dimensions == 0 {
            bail!("DOCQA_EMBEDDING_DIMENSIONS must be greater than zero");
        }

        Ok(Self {
            host: non_empty("DOCQA_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            api_key,
            groq_api_key,
            groq_model: non_empty("GROQ_MODEL"),
            groq_base_url: non_empty("GROQ_BASE_URL"),
            data_dir: non_empty("DOCQA_DATA_DIR").map(PathBuf::from),
            embedding_dimensions,
            rag: RagConfig::default(),
        })
    }
}
