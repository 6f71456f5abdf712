//! Embedding-based sentence ranking.
//!
//! For each `(query, candidates)` pair the ranker embeds the query and the
//! candidates, scores every candidate by dot product with the query, and keeps
//! the best `top_n` scores. Whether the returned text is actually reduced to
//! those candidates is controlled by [`SelectionPolicy`].

use crate::embed::{Embedding, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::model::RankedSentences;
use crate::retrieval::dot;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP_N: usize = 20;

/// Score reported per pair when the ranker returns raw vectors.
pub const PLACEHOLDER_SCORE: f32 = 0.001;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Return every candidate in its original order; only the scores are
    /// ranked.
    #[default]
    Passthrough,
    /// Return the top-scoring candidates, best first.
    TopN,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub top_n: usize,
    pub return_vectors: bool,
    /// When false every candidate is kept.
    pub active: bool,
    pub selection: SelectionPolicy,
    pub separator: String,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            return_vectors: false,
            active: true,
            selection: SelectionPolicy::Passthrough,
            separator: " ".to_string(),
        }
    }
}

impl RankerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(Error::Config("top_n must be > 0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RankerOutput {
    Sentences(Vec<RankedSentences>),
    Vectors {
        vectors: Vec<(Embedding, Vec<Embedding>)>,
        scores: Vec<f32>,
    },
}

impl RankerOutput {
    pub fn into_sentences(self) -> Option<Vec<RankedSentences>> {
        match self {
            Self::Sentences(s) => Some(s),
            Self::Vectors { .. } => None,
        }
    }
}

pub struct SentenceRanker<E> {
    embedder: E,
    config: RankerConfig,
}

impl<E: EmbeddingProvider> SentenceRanker<E> {
    pub fn new(embedder: E, config: RankerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { embedder, config })
    }

    pub fn config(&self) -> &RankerConfig {
        &self.config
    }

    pub fn rank(&self, pairs: &[(String, Vec<String>)]) -> Result<RankerOutput> {
        if self.config.return_vectors {
            let mut vectors = Vec::with_capacity(pairs.len());
            for (query, candidates) in pairs {
                vectors.push(self.embed_pair(query, candidates)?);
            }
            return Ok(RankerOutput::Vectors {
                scores: vec![PLACEHOLDER_SCORE; pairs.len()],
                vectors,
            });
        }

        let mut out = Vec::with_capacity(pairs.len());
        for (query, candidates) in pairs {
            out.push(self.rank_one(query, candidates)?);
        }
        Ok(RankerOutput::Sentences(out))
    }

    pub fn rank_one(&self, query: &str, candidates: &[String]) -> Result<RankedSentences> {
        let (query_emb, candidate_embs) = self.embed_pair(query, candidates)?;
        let scores: Vec<f32> = candidate_embs.iter().map(|c| dot(&query_emb, c)).collect();

        let thresh = if self.config.active {
            self.config.top_n.min(candidates.len())
        } else {
            candidates.len()
        };

        let order = descending_order(&scores);
        let top_scores: Vec<f32> = order.iter().take(thresh).map(|&i| scores[i]).collect();

        let selected: Vec<&str> = match self.config.selection {
            SelectionPolicy::Passthrough => candidates.iter().map(String::as_str).collect(),
            SelectionPolicy::TopN => order
                .iter()
                .take(thresh)
                .map(|&i| candidates[i].as_str())
                .collect(),
        };

        Ok(RankedSentences {
            text: selected.join(self.config.separator.as_str()),
            top_scores,
        })
    }

    fn embed_pair(&self, query: &str, candidates: &[String]) -> Result<(Embedding, Vec<Embedding>)> {
        let mut query_out = self.embedder.embed_batch(&[query])?;
        if query_out.len() != 1 {
            return Err(Error::Embedding(format!(
                "expected 1 query vector, got {}",
                query_out.len()
            )));
        }
        let query_emb = query_out.remove(0);

        if candidates.is_empty() {
            return Ok((query_emb, Vec::new()));
        }

        let texts: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let candidate_embs = self.embedder.embed_batch(&texts)?;
        if candidate_embs.len() != candidates.len() {
            return Err(Error::Embedding(format!(
                "expected {} candidate vectors, got {}",
                candidates.len(),
                candidate_embs.len()
            )));
        }
        if let Some(bad) = candidate_embs.iter().find(|v| v.len() != query_emb.len()) {
            return Err(Error::Embedding(format!(
                "dimension mismatch: query has {}, candidate has {}",
                query_emb.len(),
                bad.len()
            )));
        }

        Ok((query_emb, candidate_embs))
    }
}

/// Indices of `scores` sorted by descending score. Stable, so ties keep their
/// original order.
fn descending_order(scores: &[f32]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..scores.len()).collect();
    idx.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    idx
}
