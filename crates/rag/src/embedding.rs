use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::env;
use tracing::debug;

use crate::capability::Embedder;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";

#[derive(Debug, Clone, Copy)]
pub struct HashEmbedderConfig {
    pub dimensions: usize,
    pub seed: u64,
}

impl Default for HashEmbedderConfig {
    fn default() -> Self {
        Self {
            dimensions: 64,
            seed: 1337,
        }
    }
}

/// Bag-of-words hashing embedder for offline runs and tests.
#[derive(Clone)]
pub struct HashEmbedder {
    config: HashEmbedderConfig,
}

impl HashEmbedder {
    pub fn new(config: HashEmbedderConfig) -> Self {
        Self { config }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let dims = self.config.dimensions.max(1);
        let mut vector = vec![0f32; dims];
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            let bucket = self.bucket_for(token);
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        vector
    }

    /// Seeded FNV-1a, so stored vectors stay valid across toolchains.
    fn bucket_for(&self, token: &str) -> usize {
        let mut hash = FNV_OFFSET_BASIS;
        let seed = self.config.seed.to_le_bytes();
        for byte in seed.iter().chain(token.to_lowercase().as_bytes()) {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        (hash % self.config.dimensions.max(1) as u64) as usize
    }
}

#[derive(Clone)]
pub enum EmbeddingBackend {
    Hash(HashEmbedder),
    OpenAi(OpenAiEmbeddingClient),
}

#[derive(Clone)]
pub struct EmbeddingClient {
    backend: EmbeddingBackend,
}

impl EmbeddingClient {
    pub fn from_env() -> Result<Self> {
        let remote_configured =
            env::var("OPENAI_API_KEY").is_ok() || env::var("OPENAI_PROXY_URL").is_ok();
        let default_provider = if remote_configured { "openai" } else { "hash" };
        match env::var("EMBEDDING_PROVIDER")
            .unwrap_or_else(|_| default_provider.to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => {
                let model = env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());
                Ok(Self {
                    backend: EmbeddingBackend::OpenAi(OpenAiEmbeddingClient::new(&model)?),
                })
            }
            "hash" => {
                let dims = env::var("HASH_EMBED_DIMENSIONS")
                    .ok()
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(64);
                Ok(Self::hash_with(HashEmbedderConfig {
                    dimensions: dims,
                    ..HashEmbedderConfig::default()
                }))
            }
            other => Err(anyhow!("unknown EMBEDDING_PROVIDER '{other}' (openai|hash)")),
        }
    }

    pub fn hash() -> Self {
        Self::hash_with(HashEmbedderConfig::default())
    }

    pub fn hash_with(config: HashEmbedderConfig) -> Self {
        Self {
            backend: EmbeddingBackend::Hash(HashEmbedder::new(config)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            EmbeddingBackend::Hash(_) => "hash",
            EmbeddingBackend::OpenAi(_) => "openai",
        }
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        match &self.backend {
            EmbeddingBackend::Hash(embedder) => Ok(inputs
                .iter()
                .map(|text| embedder.embed_text(text))
                .collect()),
            EmbeddingBackend::OpenAi(client) => client.embed_batch(inputs),
        }
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inputs = vec![text.to_string()];
        let mut output = self.embed_batch(&inputs)?;
        output
            .pop()
            .ok_or_else(|| anyhow!("embedding provider returned no vectors"))
    }
}

impl Embedder for EmbeddingClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        EmbeddingClient::embed(self, text)
    }
}

#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    http: Client,
    model: String,
    url: String,
    api_key: Option<String>,
    team: Option<String>,
}

impl OpenAiEmbeddingClient {
    pub fn new(model: &str) -> Result<Self> {
        let team = env::var("MEDRAG_TEAM_ID").ok().filter(|v| !v.trim().is_empty());
        let (url, api_key) = match env::var("OPENAI_PROXY_URL") {
            Ok(proxy) => (
                format!("{}/v1/embeddings", proxy.trim_end_matches('/')),
                env::var("OPENAI_API_KEY").ok(),
            ),
            Err(_) => {
                let base = env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
                let key = env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow!("OPENAI_API_KEY is required for openai embeddings"))?;
                (
                    format!("{}/embeddings", base.trim_end_matches('/')),
                    Some(key),
                )
            }
        };
        Ok(Self {
            http: Client::new(),
            model: model.to_string(),
            url,
            api_key,
            team,
        })
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let payload = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });
        let mut request = self.http.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(team) = &self.team {
            request = request.header("X-Team", team);
        }
        debug!(model = %self.model, inputs = inputs.len(), "requesting embeddings");
        let response = request
            .send()
            .context("openai embeddings request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "openai embeddings request failed: {}",
                response.status()
            ));
        }
        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .context("failed to decode openai embeddings response")?;
        Ok(parsed.data.into_iter().map(|data| data.embedding).collect())
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}
