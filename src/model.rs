//! # Sentiment Model Module
//!
//! ## Purpose
//! Deterministic lexicon-based sentiment classifier used at ingestion time to
//! assign a predicted label and a confidence score to every uploaded text,
//! and at evaluation time to re-predict over the validation set.
//!
//! ## Input/Output Specification
//! - **Input**: Raw text, optional lexicon extension file
//! - **Output**: `Prediction` with a label from the closed three-label set
//!   and a confidence in [0, 1]
//! - **Determinism**: identical text always yields the identical prediction
//!
//! ## Key Features
//! - Unicode normalization and case folding before tokenization
//! - Polarity lexicon with negation flipping
//! - Neutral band for balanced or weak signals
//! - Parallel batch prediction

use crate::config::ModelConfig;
use crate::errors::{ConsoleError, Result};
use crate::Sentiment;
use rayon::prelude::*;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// Number of following tokens a negator may flip
const NEGATION_WINDOW: usize = 3;

const POSITIVE_WORDS: &[&str] = &[
    "amazing",
    "awesome",
    "beautiful",
    "best",
    "brilliant",
    "delightful",
    "enjoy",
    "enjoyed",
    "excellent",
    "fantastic",
    "favorite",
    "glad",
    "good",
    "great",
    "happy",
    "helpful",
    "impressive",
    "love",
    "loved",
    "nice",
    "outstanding",
    "perfect",
    "pleasant",
    "pleased",
    "recommend",
    "reliable",
    "satisfied",
    "smooth",
    "superb",
    "terrific",
    "thanks",
    "wonderful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry",
    "annoying",
    "awful",
    "bad",
    "broken",
    "defective",
    "disappointed",
    "disappointing",
    "dreadful",
    "fail",
    "failed",
    "garbage",
    "hate",
    "hated",
    "horrible",
    "mediocre",
    "mess",
    "miserable",
    "painful",
    "poor",
    "refund",
    "sad",
    "slow",
    "terrible",
    "unusable",
    "useless",
    "waste",
    "worst",
    "worthless",
    "wrong",
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "neither", "nor", "isn't", "wasn't", "aren't", "don't", "doesn't",
    "didn't", "can't", "cannot", "won't", "couldn't", "shouldn't", "wouldn't",
];

/// Result of classifying one text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predicted label
    pub label: Sentiment,
    /// Confidence in the label, in [0, 1]
    pub confidence: f64,
}

/// Polarity lexicon backing the classifier
#[derive(Debug, Clone)]
pub struct Lexicon {
    positive: HashSet<String>,
    negative: HashSet<String>,
    negators: HashSet<String>,
}

/// Shape of an on-disk lexicon extension file
#[derive(Debug, Deserialize)]
struct LexiconFile {
    #[serde(default)]
    positive: Vec<String>,
    #[serde(default)]
    negative: Vec<String>,
    #[serde(default)]
    negators: Vec<String>,
}

impl Lexicon {
    /// Built-in lexicon shipped with the binary
    pub fn builtin() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().map(|w| w.to_string()).collect(),
            negative: NEGATIVE_WORDS.iter().map(|w| w.to_string()).collect(),
            negators: NEGATORS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Merge entries from a TOML extension file into the lexicon
    pub fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| ConsoleError::Config {
            message: format!("Failed to read lexicon file {:?}: {}", path, e),
        })?;
        let file: LexiconFile = toml::from_str(&content).map_err(|e| ConsoleError::Config {
            message: format!("Failed to parse lexicon file {:?}: {}", path, e),
        })?;

        self.positive.extend(file.positive.into_iter().map(|w| w.to_lowercase()));
        self.negative.extend(file.negative.into_iter().map(|w| w.to_lowercase()));
        self.negators.extend(file.negators.into_iter().map(|w| w.to_lowercase()));
        Ok(())
    }
}

/// Lexicon-based sentiment classifier
pub struct SentimentModel {
    config: ModelConfig,
    lexicon: Lexicon,
    token_pattern: Regex,
}

impl SentimentModel {
    /// Create a model from configuration, loading any lexicon extension
    pub fn new(config: ModelConfig) -> Result<Self> {
        let token_pattern = Regex::new(r"[a-z][a-z']*").map_err(|e| ConsoleError::Internal {
            message: format!("Failed to compile token pattern: {}", e),
        })?;

        let mut lexicon = Lexicon::builtin();
        if let Some(path) = &config.lexicon_path {
            lexicon.extend_from_file(path)?;
            tracing::info!("Extended sentiment lexicon from {:?}", path);
        }

        Ok(Self {
            config,
            lexicon,
            token_pattern,
        })
    }

    /// Normalize and tokenize text
    fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized: String = text.nfkc().collect::<String>().to_lowercase();
        self.token_pattern
            .find_iter(&normalized)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Classify one text
    pub fn predict(&self, text: &str) -> Prediction {
        let tokens = self.tokenize(text);

        let mut positive_hits = 0usize;
        let mut negative_hits = 0usize;
        // Tokens remaining under the influence of a preceding negator
        let mut negated_for = 0usize;

        for token in &tokens {
            if self.lexicon.negators.contains(token) {
                negated_for = NEGATION_WINDOW;
                continue;
            }

            let polarity = if self.lexicon.positive.contains(token) {
                Some(true)
            } else if self.lexicon.negative.contains(token) {
                Some(false)
            } else {
                None
            };

            if let Some(mut is_positive) = polarity {
                if negated_for > 0 {
                    is_positive = !is_positive;
                    negated_for = 0;
                }
                if is_positive {
                    positive_hits += 1;
                } else {
                    negative_hits += 1;
                }
            } else {
                negated_for = negated_for.saturating_sub(1);
            }
        }

        let hits = positive_hits + negative_hits;
        if hits == 0 {
            return Prediction {
                label: Sentiment::Neutral,
                confidence: self.config.min_confidence,
            };
        }

        let balance = (positive_hits as f64 - negative_hits as f64) / hits as f64;

        let (label, raw_confidence) = if balance.abs() <= self.config.neutral_band {
            (Sentiment::Neutral, 0.5 + 0.5 * (1.0 - balance.abs()))
        } else if balance > 0.0 {
            (Sentiment::Positive, 0.5 + 0.5 * balance)
        } else {
            (Sentiment::Negative, 0.5 - 0.5 * balance)
        };

        Prediction {
            label,
            confidence: raw_confidence.clamp(self.config.min_confidence, self.config.max_confidence),
        }
    }

    /// Classify a batch of texts in parallel, preserving input order
    pub fn predict_batch(&self, texts: &[String]) -> Vec<Prediction> {
        texts.par_iter().map(|text| self.predict(text)).collect()
    }
}
