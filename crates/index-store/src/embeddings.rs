use crate::error::{IndexStoreError, Result};
use crate::types::Embedding;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Characters sent to the provider per text; longer inputs are cut on a char boundary.
pub const MAX_EMBED_CHARS: usize = 8_000;

const DEFAULT_DIMENSION: usize = 384;
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Text → vector collaborator. Treated as a remote call that may fail or be slow.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Stable identity used to tag stored vectors, e.g. `openai:text-embedding-3-small`
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Embed and tag with [`EmbeddingProvider::model_id`], checking the dimension.
    async fn embed_tagged(&self, text: &str) -> Result<Embedding> {
        let vector = self.embed(truncate_for_embedding(text)).await?;
        if vector.len() != self.dimension() {
            return Err(IndexStoreError::InvalidDimension {
                expected: self.dimension(),
                actual: vector.len(),
            });
        }
        Ok(Embedding::new(self.model_id(), vector))
    }
}

pub fn truncate_for_embedding(text: &str) -> &str {
    match text.char_indices().nth(MAX_EMBED_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum EmbeddingMode {
    Provider,
    Stub,
}

impl EmbeddingMode {
    fn from_env() -> Result<Self> {
        let raw = env::var("CONTEXT_EMBEDDING_MODE")
            .unwrap_or_else(|_| "provider".to_string())
            .to_ascii_lowercase();
        match raw.as_str() {
            "provider" => Ok(Self::Provider),
            "stub" => Ok(Self::Stub),
            other => Err(IndexStoreError::InvalidConfig(format!(
                "Unsupported CONTEXT_EMBEDDING_MODE '{other}' (expected 'provider' or 'stub')"
            ))),
        }
    }
}

/// Provider selection. Each kind carries its own settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    Stub {
        #[serde(default = "default_dimension")]
        dimension: usize,
    },
    #[serde(rename = "openai")]
    OpenAi(OpenAiSettings),
    Ollama(OllamaSettings),
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::Stub {
            dimension: DEFAULT_DIMENSION,
        }
    }
}

/// OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenAiSettings {
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    /// Falls back to `OPENAI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub dimension: usize,
}

/// Ollama `/api/embeddings` endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OllamaSettings {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
}

fn default_dimension() -> usize {
    DEFAULT_DIMENSION
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<()> {
        let (dimension, model, base_url) = match self {
            Self::Stub { dimension } => (*dimension, "stub", "stub"),
            Self::OpenAi(s) => (s.dimension, s.model.as_str(), s.base_url.as_str()),
            Self::Ollama(s) => (s.dimension, s.model.as_str(), s.base_url.as_str()),
        };
        if dimension == 0 {
            return Err(IndexStoreError::InvalidConfig(
                "dimension must be greater than 0".to_string(),
            ));
        }
        if model.trim().is_empty() {
            return Err(IndexStoreError::InvalidConfig("model must be set".to_string()));
        }
        if base_url.trim().is_empty() {
            return Err(IndexStoreError::InvalidConfig(
                "base_url must be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Build the configured provider. `CONTEXT_EMBEDDING_MODE=stub` forces the
/// offline hash embedder with the configured dimension.
pub fn provider_from_config(config: &ProviderConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;

    if EmbeddingMode::from_env()? == EmbeddingMode::Stub {
        let dimension = match config {
            ProviderConfig::Stub { dimension } => *dimension,
            ProviderConfig::OpenAi(s) => s.dimension,
            ProviderConfig::Ollama(s) => s.dimension,
        };
        log::debug!("CONTEXT_EMBEDDING_MODE=stub: using hash embedder ({dimension} dims)");
        return Ok(Arc::new(StubEmbedder::new(dimension)));
    }

    let provider: Arc<dyn EmbeddingProvider> = match config {
        ProviderConfig::Stub { dimension } => Arc::new(StubEmbedder::new(*dimension)),
        ProviderConfig::OpenAi(settings) => Arc::new(HttpEmbedder::openai(settings)?),
        ProviderConfig::Ollama(settings) => Arc::new(HttpEmbedder::ollama(settings)?),
    };
    log::info!("Embedding provider: {}", provider.model_id());
    Ok(provider)
}

/// Deterministic hash embedder for tests and offline runs
#[derive(Debug, Clone)]
pub struct StubEmbedder {
    dimension: usize,
    model_id: String,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model_id: format!("stub-{dimension}"),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(stub_embed(text, self.dimension))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[derive(Debug, Clone)]
enum HttpApi {
    OpenAi { api_key: Option<String> },
    Ollama,
}

/// Remote embedder speaking the OpenAI or Ollama wire format
pub struct HttpEmbedder {
    client: Client,
    api: HttpApi,
    endpoint: String,
    model: String,
    model_id: String,
    dimension: usize,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn openai(settings: &OpenAiSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.is_empty());
        Self::build(
            HttpApi::OpenAi { api_key },
            format!("{}/embeddings", settings.base_url.trim_end_matches('/')),
            &settings.model,
            format!("openai:{}", settings.model),
            settings.dimension,
        )
    }

    pub fn ollama(settings: &OllamaSettings) -> Result<Self> {
        Self::build(
            HttpApi::Ollama,
            format!("{}/api/embeddings", settings.base_url.trim_end_matches('/')),
            &settings.model,
            format!("ollama:{}", settings.model),
            settings.dimension,
        )
    }

    fn build(
        api: HttpApi,
        endpoint: String,
        model: &str,
        model_id: String,
        dimension: usize,
    ) -> Result<Self> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            api,
            endpoint,
            model: model.to_string(),
            model_id,
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = match &self.api {
            HttpApi::OpenAi { api_key } => {
                let mut request = self.client.post(&self.endpoint).json(&OpenAiRequest {
                    model: &self.model,
                    input: [text],
                });
                if let Some(key) = api_key {
                    request = request.bearer_auth(key);
                }
                let response: OpenAiResponse =
                    request.send().await?.error_for_status()?.json().await?;
                response
                    .data
                    .into_iter()
                    .next()
                    .map(|item| item.embedding)
                    .ok_or_else(|| {
                        IndexStoreError::EmbeddingError(format!(
                            "{} returned no embedding",
                            self.endpoint
                        ))
                    })?
            }
            HttpApi::Ollama => {
                let response: OllamaResponse = self
                    .client
                    .post(&self.endpoint)
                    .json(&OllamaRequest {
                        model: &self.model,
                        prompt: text,
                    })
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                response.embedding
            }
        };

        if vector.len() != self.dimension {
            return Err(IndexStoreError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
