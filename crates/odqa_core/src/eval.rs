//! Ranked-retrieval quality metrics.
//!
//! Two conventions are reported side by side:
//!
//! - **recall@k**: for each question the best EM / F1 / containment / id hit
//!   found among the first `k` predictions, averaged over all questions. Values
//!   are fractions in `[0, 1]` and never decrease as `k` grows.
//! - **top-1**: SQuAD-style aggregate over the first prediction only, expressed
//!   as a percentage in `[0, 100]`. Questions without a gold answer are left
//!   out of its denominator.

use crate::error::{Error, Result};
use crate::metrics::{best_over_gold, contains_answer, exact_match, token_f1};
use crate::model::{Prediction, QaRecord};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CUTOFFS: [usize; 6] = [1, 2, 3, 4, 5, 10];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub cutoffs: Vec<usize>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            cutoffs: DEFAULT_CUTOFFS.to_vec(),
        }
    }
}

impl EvalConfig {
    pub fn new(cutoffs: Vec<usize>) -> Result<Self> {
        let config = Self { cutoffs };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cutoffs.is_empty() {
            return Err(Error::Config("at least one cutoff is required".to_string()));
        }
        if self.cutoffs.contains(&0) {
            return Err(Error::Config("cutoffs must be >= 1".to_string()));
        }
        if self.cutoffs.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Config(
                "cutoffs must be strictly ascending".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallAtK {
    pub k: usize,
    pub exact_match: f32,
    pub f1: f32,
    pub containment: f32,
    pub id_recall: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Top1Scores {
    pub exact_match: f32,
    pub f1: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub question_count: usize,
    /// Length of the first prediction list, i.e. how many answers the model
    /// returns per question.
    pub top_n_size: usize,
    pub recall: Vec<RecallAtK>,
    pub top1: Top1Scores,
}

impl EvalReport {
    pub fn at(&self, k: usize) -> Option<&RecallAtK> {
        self.recall.iter().find(|r| r.k == k)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct BestOfPrefix {
    em: f32,
    f1: f32,
    contains: f32,
    id_hit: f32,
}

fn best_of_prefix(record: &QaRecord, predictions: &[Prediction], k: usize) -> BestOfPrefix {
    let mut best = BestOfPrefix::default();
    for p in predictions.iter().take(k) {
        best.em = best.em.max(best_over_gold(&record.answers, &p.text, exact_match));
        best.f1 = best.f1.max(best_over_gold(&record.answers, &p.text, token_f1));
        best.contains = best
            .contains
            .max(best_over_gold(&record.answers, &p.text, contains_answer));
        if !record.id.is_empty() && p.id == record.id {
            best.id_hit = 1.0;
        }
    }
    best
}

pub fn evaluate(
    records: &[QaRecord],
    predictions: &[Vec<Prediction>],
    config: &EvalConfig,
) -> Result<EvalReport> {
    config.validate()?;
    if records.len() != predictions.len() {
        return Err(Error::ModelInvocation(format!(
            "model returned {} prediction lists for {} questions",
            predictions.len(),
            records.len()
        )));
    }

    let n = records.len();
    let mut recall = Vec::with_capacity(config.cutoffs.len());

    for &k in &config.cutoffs {
        let mut sums = BestOfPrefix::default();
        for (record, preds) in records.iter().zip(predictions) {
            let best = best_of_prefix(record, preds, k);
            sums.em += best.em;
            sums.f1 += best.f1;
            sums.contains += best.contains;
            sums.id_hit += best.id_hit;
        }

        let norm = |v: f32| if n == 0 { 0.0 } else { v / n as f32 };
        recall.push(RecallAtK {
            k,
            exact_match: norm(sums.em),
            f1: norm(sums.f1),
            containment: norm(sums.contains),
            id_recall: norm(sums.id_hit),
        });
    }

    Ok(EvalReport {
        question_count: n,
        top_n_size: predictions.first().map_or(0, Vec::len),
        recall,
        top1: top1_scores(records, predictions),
    })
}

fn top1_scores(records: &[QaRecord], predictions: &[Vec<Prediction>]) -> Top1Scores {
    let mut em_total = 0.0f32;
    let mut f1_total = 0.0f32;
    let mut count = 0usize;

    for (record, preds) in records.iter().zip(predictions) {
        if record.answers.is_empty() {
            continue;
        }
        let top = preds.first().map_or("", |p| p.text.as_str());
        em_total += best_over_gold(&record.answers, top, exact_match);
        f1_total += best_over_gold(&record.answers, top, token_f1);
        count += 1;
    }

    if count == 0 {
        return Top1Scores {
            exact_match: 0.0,
            f1: 0.0,
        };
    }

    Top1Scores {
        exact_match: 100.0 * em_total / count as f32,
        f1: 100.0 * f1_total / count as f32,
    }
}
