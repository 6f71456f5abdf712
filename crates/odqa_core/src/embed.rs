use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub type Embedding = Vec<f32>;

pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Text encoder used by the ranker and the retriever. Vectors are expected to
/// be L2-normalized so that a dot product is a cosine similarity.
pub trait EmbeddingProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    fn embed(&self, text: &str) -> Result<Embedding> {
        let mut out = self.embed_batch(&[text])?;
        match (out.pop(), out.is_empty()) {
            (Some(v), true) => Ok(v),
            _ => Err(Error::Embedding(
                "expected exactly one vector for a single text".to_string(),
            )),
        }
    }
}

impl<E: EmbeddingProvider + ?Sized> EmbeddingProvider for std::sync::Arc<E> {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        (**self).embed_batch(texts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbedderConfig {
    Hash {
        #[serde(default = "default_dim")]
        dim: usize,
    },
}

fn default_dim() -> usize {
    DEFAULT_EMBEDDING_DIM
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self::Hash {
            dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

/// Bag-of-words feature hashing (FNV-1a). Deterministic and model-free.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dim: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn embed_one(&self, text: &str) -> Embedding {
        let mut v = vec![0.0f32; self.dim];

        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut h: u64 = 1469598103934665603;
            for b in token.as_bytes() {
                h ^= *b as u64;
                h = h.wrapping_mul(1099511628211);
            }
            v[(h as usize) % self.dim] += 1.0;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM)
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_vectors_are_unit_length() {
        let embedder = HashEmbeddingProvider::new(64);
        let v = embedder.embed("What is filter cake?").unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert_eq!(v.len(), 64);
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashEmbeddingProvider::new(16);
        let v = embedder.embed("   ").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn batch_returns_one_vector_per_text() {
        let embedder = HashEmbeddingProvider::default();
        let out = embedder.embed_batch(&["a", "b", "c"]).unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| v.len() == DEFAULT_EMBEDDING_DIM));
    }

    #[test]
    fn dim_has_a_floor() {
        assert_eq!(HashEmbeddingProvider::new(2).dim(), 8);
    }

    #[test]
    fn embedder_config_parses_from_json() {
        let cfg: EmbedderConfig = serde_json::from_str(r#"{"kind":"hash"}"#).unwrap();
        assert_eq!(cfg, EmbedderConfig::Hash { dim: 768 });
    }
}
