//! Builds models and embedders from a JSON configuration.
//!
//! Implementations are looked up by name in fixed tables; there is no runtime
//! discovery.

use crate::embed::{EmbedderConfig, EmbeddingProvider, HashEmbeddingProvider};
use crate::error::{Error, Result};
use crate::ranker::{RankerConfig, SentenceRanker};
use crate::retrieval::{EmbeddingRetriever, QaModel, DEFAULT_TOP_K};
use crate::storage::load_corpus_jsonl;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub type SharedEmbedder = Arc<dyn EmbeddingProvider + Send + Sync>;
pub type SharedModel = Arc<dyn QaModel + Send + Sync>;

pub const DEFAULT_MODEL: &str = "embedding_retriever";
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

type ModelCtor = fn(&ModelConfig, SharedEmbedder) -> Result<SharedModel>;

const MODELS: &[(&str, ModelCtor)] = &[(DEFAULT_MODEL, build_embedding_retriever as ModelCtor)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    pub embedder: EmbedderConfig,
    pub corpus_path: Option<PathBuf>,
    pub top_k: usize,
    pub sentence_ranker: Option<RankerConfig>,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            embedder: EmbedderConfig::default(),
            corpus_path: None,
            top_k: DEFAULT_TOP_K,
            sentence_ranker: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ModelConfig {
    /// Reads a config file. Relative paths inside it are resolved against the
    /// directory that contains the file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: ModelConfig = serde_json::from_str(&text)?;

        if let (Some(corpus), Some(base)) = (&config.corpus_path, path.parent()) {
            if corpus.is_relative() {
                config.corpus_path = Some(base.join(corpus));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !MODELS.iter().any(|(name, _)| *name == self.model) {
            return Err(Error::Config(format!(
                "unknown model '{}' (known: {})",
                self.model,
                known_models().join(", ")
            )));
        }
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be > 0".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be > 0".to_string()));
        }
        if let Some(ranker) = &self.sentence_ranker {
            ranker.validate()?;
            if ranker.return_vectors {
                return Err(Error::Config(
                    "sentence_ranker.return_vectors is not supported inside a retriever".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn known_models() -> Vec<&'static str> {
    MODELS.iter().map(|(name, _)| *name).collect()
}

pub fn build_embedder(config: &EmbedderConfig) -> SharedEmbedder {
    match config {
        EmbedderConfig::Hash { dim } => Arc::new(HashEmbeddingProvider::new(*dim)),
    }
}

pub fn build_model(config: &ModelConfig, embedder: SharedEmbedder) -> Result<SharedModel> {
    config.validate()?;
    let ctor = MODELS
        .iter()
        .find(|(name, _)| *name == config.model)
        .map(|(_, ctor)| *ctor)
        .ok_or_else(|| Error::Config(format!("unknown model '{}'", config.model)))?;
    ctor(config, embedder)
}

fn build_embedding_retriever(config: &ModelConfig, embedder: SharedEmbedder) -> Result<SharedModel> {
    let corpus_path = config
        .corpus_path
        .as_deref()
        .ok_or_else(|| Error::Config("embedding_retriever requires corpus_path".to_string()))?;
    let documents = load_corpus_jsonl(corpus_path)?;
    info!(
        model = %config.model,
        corpus = %corpus_path.display(),
        documents = documents.len(),
        "building model"
    );

    let mut retriever = EmbeddingRetriever::new(embedder.clone(), documents, config.top_k)?;
    if let Some(ranker_config) = &config.sentence_ranker {
        retriever = retriever.with_sentence_ranker(SentenceRanker::new(embedder, ranker_config.clone())?)?;
    }
    Ok(Arc::new(retriever))
}
