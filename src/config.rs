use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub vector: VectorConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Relational database (titles, agencies, word counts, versions).
#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Vector store database. Kept in a separate file so the pre-load clear
/// stays outside the relational transaction, as the load semantics require.
#[derive(Debug, Deserialize, Clone)]
pub struct VectorConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_versioner_url")]
    pub versioner_url: String,
    #[serde(default = "default_admin_url")]
    pub admin_url: String,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_max_retries")]
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            versioner_url: default_versioner_url(),
            admin_url: default_admin_url(),
            timeout_secs: default_api_timeout_secs(),
            max_retries: default_api_max_retries(),
        }
    }
}

fn default_versioner_url() -> String {
    "https://www.ecfr.gov/api/versioner/v1".to_string()
}
fn default_admin_url() -> String {
    "https://www.ecfr.gov/api/admin/v1".to_string()
}
fn default_api_timeout_secs() -> u64 {
    30
}
fn default_api_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Approximate token budget per chunk; the character budget is four
    /// times this value.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    6000
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Only titles up to this number have their chapters indexed.
    #[serde(default = "default_max_indexed_title")]
    pub max_indexed_title: i64,
    /// Chapters whose cleaned text is at or below this many characters are
    /// skipped (logged, not an error).
    #[serde(default = "default_min_chapter_chars")]
    pub min_chapter_chars: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_indexed_title: default_max_indexed_title(),
            min_chapter_chars: default_min_chapter_chars(),
        }
    }
}

fn default_max_indexed_title() -> i64 {
    10
}
fn default_min_chapter_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimilarityConfig {
    /// Neighbors requested per probe document, before the
    /// `total_docs - 1` cap.
    #[serde(default = "default_neighbors_per_doc")]
    pub neighbors_per_doc: usize,
    /// How many top pairs to report.
    #[serde(default = "default_top_pairs")]
    pub top_pairs: usize,
    /// Distance convention of the stored vectors. Only `cosine` (distance
    /// in [0,2] over normalized embeddings) is supported; the value exists
    /// so the assumption is named rather than implied.
    #[serde(default = "default_distance_metric")]
    pub distance_metric: String,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            neighbors_per_doc: default_neighbors_per_doc(),
            top_pairs: default_top_pairs(),
            distance_metric: default_distance_metric(),
        }
    }
}

fn default_neighbors_per_doc() -> usize {
    10
}
fn default_top_pairs() -> usize {
    5
}
fn default_distance_metric() -> String {
    "cosine".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_embed_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_max_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_chunk_size == 0 {
        anyhow::bail!("chunking.max_chunk_size must be > 0");
    }

    if config.similarity.top_pairs == 0 {
        anyhow::bail!("similarity.top_pairs must be >= 1");
    }

    if config.similarity.distance_metric != "cosine" {
        anyhow::bail!(
            "Unsupported similarity.distance_metric: '{}'. Only 'cosine' is supported.",
            config.similarity.distance_metric
        );
    }

    if config.api.timeout_secs == 0 {
        anyhow::bail!("api.timeout_secs must be > 0");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(config)
}
