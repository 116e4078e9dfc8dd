//! # Sentiment Labeling Console
//!
//! ## Overview
//! This library implements the data layer of an operator console for a
//! text-sentiment labeling pipeline: dataset ingestion with model-predicted
//! labels, paginated browsing and search over the labeled corpus, human
//! correction of predicted labels, model evaluation against a held-out
//! validation set, corpus statistics, and CSV export.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `ingestion`: CSV dataset upload pipeline (parse, predict, store)
//! - `model`: deterministic lexicon-based sentiment classifier
//! - `store`: backend-owned record store (corpus, validation set, history)
//! - `query`: paginated list/search engines with fail-fast validation
//! - `evaluation`: precision/recall/F1 and confusion-matrix computation
//! - `stats`: corpus-wide aggregate statistics
//! - `export`: CSV serialization of the corrected corpus
//! - `api`: HTTP/JSON server exposing the console contract
//! - `client`: console-side HTTP data layer consuming the same contract
//! - `console`: transient view state (filters, page, edit session)
//! - `config`: configuration management and settings
//! - `errors`: centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: CSV datasets (`source,text` and `text,sentiment`), filter and
//!   search requests, label corrections
//! - **Output**: paginated record pages, evaluation metrics, statistics,
//!   CSV exports
//! - **Invariant**: every aggregate and display path uses the effective
//!   sentiment (correction when present, otherwise prediction)
//!
//! ## Usage
//! ```rust,no_run
//! use sentiment_console::{api::ApiServer, config::Config, AppState};
//! use sentiment_console::{model::SentimentModel, store::RecordStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::from_file("config.toml")?);
//!     let state = AppState {
//!         store: Arc::new(RecordStore::new()),
//!         model: Arc::new(SentimentModel::new(config.model.clone())?),
//!         config,
//!     };
//!     ApiServer::new(state).await?.run().await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod errors;
pub mod model;
pub mod store;
pub mod ingestion;
pub mod query;
pub mod evaluation;
pub mod stats;
pub mod export;
pub mod api;
pub mod client;
pub mod console;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{ConsoleError, Result};
pub use query::{ListFilter, SearchRequest};

// Core types used throughout the system
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for labeled text records
pub type RecordId = Uuid;

/// Sentiment label set
///
/// Variants are declared in lexicographic order so the derived `Ord` matches
/// the label ordering used for evaluation matrices and statistics maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    /// All valid labels, in canonical order
    pub const ALL: [Sentiment; 3] = [Sentiment::Negative, Sentiment::Neutral, Sentiment::Positive];

    /// Wire representation of the label
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            "positive" => Ok(Sentiment::Positive),
            other => Err(ConsoleError::Validation {
                field: "sentiment".to_string(),
                reason: format!(
                    "unknown label '{}', expected one of: negative, neutral, positive",
                    other
                ),
            }),
        }
    }
}

/// A value carrying a base layer and an optional human override.
///
/// The override always wins: `effective()` is the single place that decides
/// which layer consumers see, so display, filtering, statistics, and export
/// cannot disagree about precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labeled<T> {
    /// Model-assigned value, immutable once set
    #[serde(rename = "predicted_sentiment")]
    pub predicted: T,
    /// Human override, absent until a correction lands
    #[serde(rename = "corrected_sentiment")]
    pub corrected: Option<T>,
}

impl<T> Labeled<T> {
    /// Wrap a freshly predicted value with no override
    pub fn predicted(value: T) -> Self {
        Self {
            predicted: value,
            corrected: None,
        }
    }

    /// The value consumers must use: the override when present, else the base
    pub fn effective(&self) -> &T {
        self.corrected.as_ref().unwrap_or(&self.predicted)
    }

    /// Whether a human override is present
    pub fn is_corrected(&self) -> bool {
        self.corrected.is_some()
    }

    /// Apply a human override, leaving the base layer untouched
    pub fn correct(&mut self, value: T) {
        self.corrected = Some(value);
    }
}

/// One labeled unit of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    /// Opaque unique identifier, assigned at ingestion
    pub id: RecordId,
    /// Origin dataset or channel tag
    pub source: String,
    /// Raw text content, immutable
    pub text: String,
    /// Predicted label plus optional human correction
    #[serde(flatten)]
    pub sentiment: Labeled<Sentiment>,
    /// Model confidence in the prediction, in [0, 1]
    pub confidence: f64,
    /// Ingestion timestamp
    pub created_at: DateTime<Utc>,
    /// Advances whenever the correction is set or changed
    pub updated_at: DateTime<Utc>,
}

impl TextRecord {
    /// Effective sentiment: correction when present, else prediction
    pub fn effective_sentiment(&self) -> Sentiment {
        *self.sentiment.effective()
    }
}

/// One record of the held-out validation set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// Raw text content
    pub text: String,
    /// Ground-truth label
    pub true_sentiment: Sentiment,
}

/// Page envelope returned by the query and search services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Records on this page, in query order
    pub items: Vec<T>,
    /// Count of all matching records, not just this page
    pub total: usize,
    /// 1-indexed page number as requested
    pub page: usize,
    /// Requested page size
    pub page_size: usize,
    /// ceil(total / page_size); 0 when nothing matched
    pub total_pages: usize,
}

impl<T> Paginated<T> {
    /// Slice a fully filtered, fully ordered result set into one page.
    ///
    /// A page past the end yields empty `items` with `total` unchanged.
    /// Callers must have validated `page >= 1` and `page_size >= 1`.
    pub fn from_full_set(all: Vec<T>, page: usize, page_size: usize) -> Self {
        let total = all.len();
        let total_pages = total.div_ceil(page_size);
        let start = (page - 1).saturating_mul(page_size);
        let items: Vec<T> = all.into_iter().skip(start).take(page_size).collect();

        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }
}

/// Application state shared across components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Config>,
    pub store: Arc<store::RecordStore>,
    pub model: Arc<model::SentimentModel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_round_trips_through_str() {
        for label in Sentiment::ALL {
            assert_eq!(label.as_str().parse::<Sentiment>().unwrap(), label);
        }
        assert!("angry".parse::<Sentiment>().is_err());
    }

    #[test]
    fn labeled_override_wins() {
        let mut value = Labeled::predicted(Sentiment::Neutral);
        assert_eq!(*value.effective(), Sentiment::Neutral);
        assert!(!value.is_corrected());

        value.correct(Sentiment::Positive);
        assert_eq!(*value.effective(), Sentiment::Positive);
        assert_eq!(value.predicted, Sentiment::Neutral);
        assert!(value.is_corrected());
    }

    #[test]
    fn labeled_serializes_to_wire_field_names() {
        let value = Labeled {
            predicted: Sentiment::Neutral,
            corrected: Some(Sentiment::Positive),
        };
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["predicted_sentiment"], "neutral");
        assert_eq!(json["corrected_sentiment"], "positive");
    }

    #[test]
    fn pagination_splits_25_records_into_20_and_5() {
        let all: Vec<u32> = (0..25).collect();

        let first = Paginated::from_full_set(all.clone(), 1, 20);
        assert_eq!(first.items.len(), 20);
        assert_eq!(first.total, 25);
        assert_eq!(first.total_pages, 2);

        let second = Paginated::from_full_set(all, 2, 20);
        assert_eq!(second.items.len(), 5);
        assert_eq!(second.items[0], 20);
        assert_eq!(second.total, 25);
    }

    #[test]
    fn page_past_the_end_is_empty_with_total_unchanged() {
        let page = Paginated::from_full_set(vec![1, 2, 3], 5, 2);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn empty_result_set_has_zero_pages() {
        let page = Paginated::from_full_set(Vec::<u32>::new(), 1, 20);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 0);
    }
}
