//! Answer-level scoring: exact match, token F1 and answer containment.
//!
//! Normalization follows the SQuAD convention: lowercase, strip punctuation,
//! drop the articles `a`, `an`, `the`, and collapse whitespace.

use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

pub fn normalize_answer(text: &str) -> String {
    let lowered = text.to_lowercase();
    let no_punct: String = lowered
        .chars()
        .filter(|c| !is_punctuation(*c))
        .collect();

    no_punct
        .split_whitespace()
        .filter(|t| !matches!(*t, "a" | "an" | "the"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '‘' | '’' | '“' | '”' | '«' | '»' | '–' | '—' | '…' | '¿' | '¡' | '·'
        )
}

pub fn exact_match(prediction: &str, gold: &str) -> f32 {
    if normalize_answer(prediction) == normalize_answer(gold) {
        1.0
    } else {
        0.0
    }
}

pub fn token_f1(prediction: &str, gold: &str) -> f32 {
    let pred = normalize_answer(prediction);
    let gold = normalize_answer(gold);
    let pred_tokens: Vec<&str> = pred.split_whitespace().collect();
    let gold_tokens: Vec<&str> = gold.split_whitespace().collect();

    if pred_tokens.is_empty() && gold_tokens.is_empty() {
        return 1.0;
    }
    if pred_tokens.is_empty() || gold_tokens.is_empty() {
        return 0.0;
    }

    let mut gold_counts: HashMap<&str, usize> = HashMap::new();
    for t in &gold_tokens {
        *gold_counts.entry(*t).or_default() += 1;
    }

    // Multiset intersection.
    let mut common = 0usize;
    for t in &pred_tokens {
        if let Some(n) = gold_counts.get_mut(t) {
            if *n > 0 {
                *n -= 1;
                common += 1;
            }
        }
    }

    if common == 0 {
        return 0.0;
    }

    let precision = common as f32 / pred_tokens.len() as f32;
    let recall = common as f32 / gold_tokens.len() as f32;
    2.0 * precision * recall / (precision + recall)
}

/// 1.0 when the trimmed gold answer occurs inside the prediction text,
/// compared case-insensitively on NFD-decomposed text.
pub fn contains_answer(prediction: &str, gold: &str) -> f32 {
    let needle: String = gold.trim().to_lowercase().nfd().collect();
    if needle.is_empty() {
        return 0.0;
    }
    let haystack: String = prediction.to_lowercase().nfd().collect();
    if haystack.contains(&needle) {
        1.0
    } else {
        0.0
    }
}

/// Best score of `prediction` against any acceptable answer. An empty gold set
/// scores zero.
pub fn best_over_gold<F>(gold: &[String], prediction: &str, metric: F) -> f32
where
    F: Fn(&str, &str) -> f32,
{
    gold.iter()
        .map(|g| metric(prediction, g))
        .fold(0.0f32, f32::max)
}
