use crate::embed::{Embedding, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::model::{Document, Prediction};
use crate::ranker::SentenceRanker;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 10;

/// The question-answering model boundary: takes a batch of questions and
/// returns, per question, a ranked list of answers.
pub trait QaModel {
    fn answer(&self, questions: &[String]) -> Result<Vec<Vec<Prediction>>>;
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (dot, na, nb) = a
        .iter()
        .zip(b.iter())
        .fold((0.0f32, 0.0f32, 0.0f32), |(d, aa, bb), (x, y)| {
            (d + (x * y), aa + (x * x), bb + (y * y))
        });

    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}

/// Indices and scores of the `k` closest embeddings, best first.
pub fn top_k(query_embedding: &[f32], embeddings: &[Embedding], k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = embeddings
        .iter()
        .enumerate()
        .map(|(i, e)| (i, cosine_similarity(query_embedding, e)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}

/// Splits a passage into sentences on `.`, `!` and `?` followed by
/// whitespace. Terminators stay attached to their sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |n| n.is_whitespace());
        if at_boundary {
            let s = current.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

/// Dense retriever over an in-memory corpus, with an optional sentence
/// ranking stage applied to every retrieved passage.
pub struct EmbeddingRetriever<E> {
    embedder: E,
    documents: Vec<Document>,
    embeddings: Vec<Embedding>,
    top_k: usize,
    sentence_ranker: Option<SentenceRanker<E>>,
}

impl<E: EmbeddingProvider> EmbeddingRetriever<E> {
    pub fn new(embedder: E, documents: Vec<Document>, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(Error::Config("top_k must be > 0".to_string()));
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_batch(&texts)?
        };
        if embeddings.len() != documents.len() {
            return Err(Error::Embedding(format!(
                "expected {} document vectors, got {}",
                documents.len(),
                embeddings.len()
            )));
        }
        debug!(documents = documents.len(), "indexed corpus");

        Ok(Self {
            embedder,
            documents,
            embeddings,
            top_k,
            sentence_ranker: None,
        })
    }

    /// Attaches a sentence ranking stage. The stage must produce text, so a
    /// ranker configured to return vectors is rejected.
    pub fn with_sentence_ranker(mut self, ranker: SentenceRanker<E>) -> Result<Self> {
        if ranker.config().return_vectors {
            return Err(Error::Config(
                "sentence_ranker.return_vectors is not supported inside a retriever".to_string(),
            ));
        }
        self.sentence_ranker = Some(ranker);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn answer_one(&self, question: &str) -> Result<Vec<Prediction>> {
        let q = self.embedder.embed(question)?;
        let mut predictions = Vec::with_capacity(self.top_k);

        for (idx, _score) in top_k(&q, &self.embeddings, self.top_k) {
            let doc = &self.documents[idx];
            let text = match &self.sentence_ranker {
                Some(ranker) => ranker.rank_one(question, &split_sentences(&doc.text))?.text,
                None => doc.text.clone(),
            };
            predictions.push(Prediction::new(text, doc.id.clone()));
        }

        Ok(predictions)
    }
}

impl<E: EmbeddingProvider> QaModel for EmbeddingRetriever<E> {
    fn answer(&self, questions: &[String]) -> Result<Vec<Vec<Prediction>>> {
        questions.iter().map(|q| self.answer_one(q)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashEmbeddingProvider;
    use crate::ranker::{RankerConfig, SelectionPolicy};

    fn doc(id: &str, text: &str) -> Document {
        Document {
            id: id.to_string(),
            text: text.to_string(),
        }
    }

    fn corpus() -> Vec<Document> {
        vec![
            doc("1", "Polyol is an organic compound with multiple hydroxyl groups."),
            doc("2", "Caustic soda is used in soap making. It also cleans drains."),
            doc("3", "Filter cake is the residue deposited on a filter medium."),
        ]
    }

    #[test]
    fn cosine_works_for_unit_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        let c = vec![0.0, 1.0, 0.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[test]
    fn dot_of_normalized_vectors_matches_cosine() {
        let a = vec![0.6, 0.8];
        let b = vec![0.8, 0.6];
        assert!((dot(&a, &b) - cosine_similarity(&a, &b)).abs() < 1e-6);
    }

    #[test]
    fn top_k_orders_and_truncates() {
        let embs = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]];
        let hits = top_k(&[1.0, 0.0], &embs, 2);
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn splits_sentences_on_terminators() {
        let s = split_sentences("First one. Second one? Third v1.2 stays! tail");
        assert_eq!(s, vec!["First one.", "Second one?", "Third v1.2 stays!", "tail"]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn retriever_returns_top_k_per_question() {
        let retriever =
            EmbeddingRetriever::new(HashEmbeddingProvider::new(256), corpus(), 2).unwrap();
        let out = retriever
            .answer(&["what is polyol?".to_string(), "What is filter cake?".to_string()])
            .unwrap();

        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|p| p.len() == 2));
        assert_eq!(out[0][0].id, "1");
        assert_eq!(out[1][0].id, "3");
    }

    #[test]
    fn retriever_applies_sentence_ranker() {
        let ranker = SentenceRanker::new(
            HashEmbeddingProvider::new(256),
            RankerConfig {
                top_n: 1,
                selection: SelectionPolicy::TopN,
                ..RankerConfig::default()
            },
        )
        .unwrap();
        let retriever = EmbeddingRetriever::new(HashEmbeddingProvider::new(256), corpus(), 1)
            .unwrap()
            .with_sentence_ranker(ranker)
            .unwrap();

        let out = retriever.answer(&["usage of caustic soda".to_string()]).unwrap();
        assert_eq!(out[0][0].id, "2");
        assert_eq!(out[0][0].text, "Caustic soda is used in soap making.");
    }

    #[test]
    fn vector_mode_ranker_is_rejected() {
        let ranker = SentenceRanker::new(
            HashEmbeddingProvider::new(256),
            RankerConfig {
                return_vectors: true,
                ..RankerConfig::default()
            },
        )
        .unwrap();
        let err = EmbeddingRetriever::new(HashEmbeddingProvider::new(256), corpus(), 1)
            .unwrap()
            .with_sentence_ranker(ranker)
            .err()
            .expect("error");
        assert!(matches!(err, Error::Config(msg) if msg.contains("return_vectors")));
    }

    #[test]
    fn empty_corpus_returns_empty_lists() {
        let retriever =
            EmbeddingRetriever::new(HashEmbeddingProvider::default(), Vec::new(), 3).unwrap();
        assert!(retriever.is_empty());
        let out = retriever.answer(&["anything".to_string()]).unwrap();
        assert_eq!(out, vec![Vec::<Prediction>::new()]);
    }

    #[test]
    fn zero_top_k_is_a_config_error() {
        let err = EmbeddingRetriever::new(HashEmbeddingProvider::default(), corpus(), 0)
            .err()
            .expect("error");
        assert!(matches!(err, Error::Config(_)));
    }
}
