//! Embedding providers and vector utilities.
//!
//! Providers: `openai` (the original corpus was embedded with OpenAI
//! models), `ollama` (local instance), and `disabled`. Transient HTTP
//! failures (429, 5xx, network) are retried with exponential backoff up to
//! `embedding.max_retries`; other 4xx responses fail immediately.
//!
//! Vectors are stored as little-endian f32 BLOBs; [`vec_to_blob`] /
//! [`blob_to_vec`] convert, and [`cosine_distance`] /
//! [`similarity_from_distance`] implement the scanner's scoring convention.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Metadata interface for a configured embedding backend.
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
}

struct DisabledProvider;

impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
}

struct RemoteProvider {
    model: String,
    dims: usize,
}

impl EmbeddingProvider for RemoteProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

/// Instantiate the provider named in the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" | "ollama" => {
            let model = config.model.clone().ok_or_else(|| {
                anyhow::anyhow!("embedding.model required for provider '{}'", config.provider)
            })?;
            let dims = config.dims.ok_or_else(|| {
                anyhow::anyhow!("embedding.dims required for provider '{}'", config.provider)
            })?;
            if config.provider == "openai" && std::env::var("OPENAI_API_KEY").is_err() {
                bail!("OPENAI_API_KEY environment variable not set");
            }
            Ok(Box::new(RemoteProvider { model, dims }))
        }
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a batch of texts with the configured provider. Returns one vector
/// per input, in input order.
pub async fn embed_texts(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;
            let model = config
                .model
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;
            let body = serde_json::json!({ "model": model, "input": texts });
            let json = post_json_with_retry(
                config,
                "https://api.openai.com/v1/embeddings",
                Some(&api_key),
                &body,
            )
            .await?;
            parse_embedding_arrays(&json, "data", Some("embedding"))
        }
        "ollama" => {
            let model = config
                .model
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;
            let url = config.url.as_deref().unwrap_or("http://localhost:11434");
            let body = serde_json::json!({ "model": model, "input": texts });
            let json =
                post_json_with_retry(config, &format!("{}/api/embed", url), None, &body).await?;
            parse_embedding_arrays(&json, "embeddings", None)
        }
        "disabled" => bail!("Embedding provider is disabled"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// POST a JSON body, retrying 429/5xx/network errors with exponential
/// backoff (1s, 2s, 4s, ... capped at 32s).
async fn post_json_with_retry(
    config: &EmbeddingConfig,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(key) = bearer {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response.json().await?);
                }
                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow::anyhow!(
                        "Embedding API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }
                bail!("Embedding API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("Embedding request to {} failed: {}", url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
}

/// Pull embedding vectors out of a response: `field` is the top-level array;
/// `inner` selects a per-item object key (OpenAI) or, when `None`, each item
/// is itself the vector (Ollama).
fn parse_embedding_arrays(
    json: &serde_json::Value,
    field: &str,
    inner: Option<&str>,
) -> Result<Vec<Vec<f32>>> {
    let items = json
        .get(field)
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing '{}' array", field))?;

    let mut embeddings = Vec::with_capacity(items.len());
    for item in items {
        let arr = match inner {
            Some(key) => item.get(key).and_then(|e| e.as_array()),
            None => item.as_array(),
        }
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing vector"))?;

        embeddings.push(
            arr.iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }

    Ok(embeddings)
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in [-1, 1]. Returns 0.0 for empty or mismatched
/// vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance in [0, 2]: `1 - cos(a, b)`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b) as f64
}

/// Map a cosine distance in [0, 2] to a similarity score in [1, 0].
pub fn similarity_from_distance(distance: f64) -> f64 {
    (2.0 - distance) / 2.0
}
