//! # Statistics Module
//!
//! ## Purpose
//! Corpus-wide aggregate statistics: label distribution, mean model
//! confidence, correction count, and per-source counts. Recomputed fresh
//! from a store snapshot on every request.
//!
//! ## Input/Output Specification
//! - **Input**: a corpus snapshot
//! - **Output**: `CorpusStatistics` consistent with that snapshot
//! - **Invariants**: distribution counts and per-source counts each sum to
//!   `total_texts`; the distribution uses effective sentiment while
//!   `avg_confidence` uses model confidence regardless of corrections

use crate::{Sentiment, TextRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate statistics over the whole corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStatistics {
    /// Number of records in the corpus
    pub total_texts: usize,
    /// Effective-sentiment counts; keys are exactly the labels present
    pub sentiment_distribution: BTreeMap<Sentiment, usize>,
    /// Mean of model confidence over all records; 0.0 for an empty corpus
    pub avg_confidence: f64,
    /// Records carrying a human correction
    pub corrected_count: usize,
    /// Record counts keyed by each distinct source present
    pub by_source: BTreeMap<String, usize>,
}

/// Compute statistics for a corpus snapshot
pub fn compute(records: &[TextRecord]) -> CorpusStatistics {
    let mut sentiment_distribution: BTreeMap<Sentiment, usize> = BTreeMap::new();
    let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
    let mut confidence_sum = 0.0;
    let mut corrected_count = 0;

    for record in records {
        *sentiment_distribution
            .entry(record.effective_sentiment())
            .or_insert(0) += 1;
        *by_source.entry(record.source.clone()).or_insert(0) += 1;
        confidence_sum += record.confidence;
        if record.sentiment.is_corrected() {
            corrected_count += 1;
        }
    }

    let avg_confidence = if records.is_empty() {
        0.0
    } else {
        confidence_sum / records.len() as f64
    };

    CorpusStatistics {
        total_texts: records.len(),
        sentiment_distribution,
        avg_confidence,
        corrected_count,
        by_source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Labeled;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(source: &str, label: Sentiment, confidence: f64) -> TextRecord {
        let now = Utc::now();
        TextRecord {
            id: Uuid::new_v4(),
            source: source.to_string(),
            text: "text".to_string(),
            sentiment: Labeled::predicted(label),
            confidence,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_corpus_yields_zeroed_statistics() {
        let stats = compute(&[]);
        assert_eq!(stats.total_texts, 0);
        assert!(stats.sentiment_distribution.is_empty());
        assert_eq!(stats.avg_confidence, 0.0);
        assert_eq!(stats.corrected_count, 0);
        assert!(stats.by_source.is_empty());
    }

    #[test]
    fn distribution_and_source_counts_sum_to_total() {
        let records = vec![
            record("twitter", Sentiment::Positive, 0.9),
            record("twitter", Sentiment::Negative, 0.7),
            record("reviews", Sentiment::Neutral, 0.5),
            record("reviews", Sentiment::Positive, 0.8),
        ];

        let stats = compute(&records);
        assert_eq!(stats.total_texts, 4);
        assert_eq!(stats.sentiment_distribution.values().sum::<usize>(), 4);
        assert_eq!(stats.by_source.values().sum::<usize>(), 4);
        assert_eq!(stats.by_source["twitter"], 2);
        assert_eq!(stats.by_source["reviews"], 2);
    }

    #[test]
    fn correction_moves_a_count_between_labels() {
        let mut records = vec![
            record("reviews", Sentiment::Neutral, 0.4),
            record("reviews", Sentiment::Positive, 0.9),
        ];

        let before = compute(&records);
        assert_eq!(before.sentiment_distribution[&Sentiment::Neutral], 1);
        assert_eq!(before.sentiment_distribution[&Sentiment::Positive], 1);
        assert_eq!(before.corrected_count, 0);

        records[0].sentiment.correct(Sentiment::Positive);
        let after = compute(&records);
        assert_eq!(after.sentiment_distribution.get(&Sentiment::Neutral), None);
        assert_eq!(after.sentiment_distribution[&Sentiment::Positive], 2);
        assert_eq!(after.corrected_count, 1);
    }

    #[test]
    fn avg_confidence_ignores_corrections() {
        let mut records = vec![
            record("a", Sentiment::Neutral, 0.4),
            record("a", Sentiment::Positive, 0.8),
        ];
        let before = compute(&records).avg_confidence;

        records[0].sentiment.correct(Sentiment::Positive);
        let after = compute(&records).avg_confidence;

        assert_eq!(before, after);
        assert!((after - 0.6).abs() < 1e-9);
    }
}
