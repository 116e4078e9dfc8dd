//! # Evaluation Module
//!
//! ## Purpose
//! Computes aggregate classification metrics for the sentiment model against
//! the held-out validation set: per-label precision/recall/F1, the confusion
//! matrix, and macro F1.
//!
//! ## Input/Output Specification
//! - **Input**: parallel slices of true and predicted labels
//! - **Output**: `EvaluationMetrics` whose `labels` sequence fixes the row
//!   and column order of the confusion matrix and keys the per-label maps
//! - **Degenerate cases**: any metric with a zero denominator is 0.0, never
//!   NaN; macro F1 averages over all labels including zero-support ones

use crate::errors::{ConsoleError, Result};
use crate::model::SentimentModel;
use crate::{Sentiment, ValidationRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Aggregate classification metrics over the validation set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Unweighted mean of per-label F1 across all labels in `labels`
    pub macro_f1: f64,
    /// Per-label precision, 0.0 when the label was never predicted
    pub precision: BTreeMap<Sentiment, f64>,
    /// Per-label recall, 0.0 when the label has no support
    pub recall: BTreeMap<Sentiment, f64>,
    /// Per-label F1, 0.0 when precision + recall is 0
    pub f1_score: BTreeMap<Sentiment, f64>,
    /// Rows are true labels, columns predicted labels, both in `labels` order
    pub confusion_matrix: Vec<Vec<u64>>,
    /// Distinct labels observed in truths or predictions, in name order
    pub labels: Vec<Sentiment>,
}

/// Compute metrics from parallel truth/prediction slices.
///
/// The label set is the union of labels observed on either side, ordered
/// lexicographically by name; that order indexes the confusion matrix.
pub fn compute_metrics(truths: &[Sentiment], predictions: &[Sentiment]) -> EvaluationMetrics {
    debug_assert_eq!(truths.len(), predictions.len());

    let labels: Vec<Sentiment> = truths
        .iter()
        .chain(predictions.iter())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let index: BTreeMap<Sentiment, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (*label, i))
        .collect();

    let mut matrix = vec![vec![0u64; labels.len()]; labels.len()];
    for (truth, prediction) in truths.iter().zip(predictions) {
        matrix[index[truth]][index[prediction]] += 1;
    }

    let mut precision = BTreeMap::new();
    let mut recall = BTreeMap::new();
    let mut f1_score = BTreeMap::new();

    for (i, label) in labels.iter().enumerate() {
        let true_positives = matrix[i][i];
        let predicted_total: u64 = matrix.iter().map(|row| row[i]).sum();
        let actual_total: u64 = matrix[i].iter().sum();

        let p = ratio(true_positives, predicted_total);
        let r = ratio(true_positives, actual_total);
        let f1 = if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        };

        precision.insert(*label, p);
        recall.insert(*label, r);
        f1_score.insert(*label, f1);
    }

    let macro_f1 = if labels.is_empty() {
        0.0
    } else {
        f1_score.values().sum::<f64>() / labels.len() as f64
    };

    EvaluationMetrics {
        macro_f1,
        precision,
        recall,
        f1_score,
        confusion_matrix: matrix,
        labels,
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Evaluate the model against the validation set.
///
/// Predictions are recomputed on every call; nothing is cached. Fails with a
/// precondition error when no validation set has been uploaded.
pub fn evaluate_model(
    model: &SentimentModel,
    validation: &[ValidationRecord],
) -> Result<EvaluationMetrics> {
    if validation.is_empty() {
        return Err(ConsoleError::Precondition {
            message: "No validation data available. Please upload validation dataset first."
                .to_string(),
        });
    }

    let texts: Vec<String> = validation.iter().map(|r| r.text.clone()).collect();
    let truths: Vec<Sentiment> = validation.iter().map(|r| r.true_sentiment).collect();
    let predictions: Vec<Sentiment> = model
        .predict_batch(&texts)
        .into_iter()
        .map(|p| p.label)
        .collect();

    Ok(compute_metrics(&truths, &predictions))
}
