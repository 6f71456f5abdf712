use serde::{Deserialize, Serialize};

/// One row of a QA dataset: a question and its acceptable answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    pub id: String,
    pub question: String,
    pub answers: Vec<String>,
}

/// A ranked answer returned by a model for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub text: String,
    pub id: String,
}

impl Prediction {
    pub fn new(text: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id: id.into(),
        }
    }
}

/// A corpus entry the retriever can return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

/// Ranker output for one query: candidate texts joined into a single string,
/// and the retained scores in descending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSentences {
    pub text: String,
    pub top_scores: Vec<f32>,
}
