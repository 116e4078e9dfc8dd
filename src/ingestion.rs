//! # Dataset Ingestion Module
//!
//! ## Purpose
//! Upload pipeline for the two dataset shapes the console accepts: raw
//! datasets (`source,text`) that get model-predicted labels on the way in,
//! and validation datasets (`text,sentiment`) with ground-truth labels for
//! evaluation.
//!
//! ## Input/Output Specification
//! - **Input**: uploaded CSV bytes plus the original filename
//! - **Output**: ingestion receipts (`records_processed`, dataset id)
//! - **Workflow**: check filename → parse and validate → predict → store
//!
//! ## Key Features
//! - Header-driven column lookup (column order does not matter)
//! - Row and text-length limits from configuration
//! - Strict label validation for validation sets
//! - Parallel batch prediction off the async runtime

use crate::config::UploadConfig;
use crate::errors::{ConsoleError, Result};
use crate::model::SentimentModel;
use crate::store::RecordStore;
use crate::utils::TextUtils;
use crate::validation_error;
use crate::{Labeled, TextRecord, ValidationRecord};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// One parsed row of a raw dataset upload
#[derive(Debug, Clone, PartialEq)]
pub struct RawTextRow {
    pub source: String,
    pub text: String,
}

/// Receipt returned for a successful dataset upload
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub dataset_id: Uuid,
    pub records_processed: usize,
}

/// Reject filenames that are not CSV uploads
pub fn check_filename(filename: &str) -> Result<()> {
    if filename.to_lowercase().ends_with(".csv") {
        Ok(())
    } else {
        Err(validation_error!("file", "Only CSV files are allowed"))
    }
}

/// Locate a required column in the header row
fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| validation_error!("file", "CSV must contain column '{}'", name))
}

fn check_row_limits(row: usize, text: &str, config: &UploadConfig) -> Result<()> {
    if row >= config.max_records {
        return Err(validation_error!(
            "file",
            "upload exceeds the limit of {} records",
            config.max_records
        ));
    }
    if text.chars().count() > config.max_text_length {
        return Err(validation_error!(
            "file",
            "text in row {} exceeds {} characters",
            row + 1,
            config.max_text_length
        ));
    }
    Ok(())
}

/// Parse a raw dataset upload (`source,text` columns, any order)
pub fn parse_dataset_csv(bytes: &[u8], config: &UploadConfig) -> Result<Vec<RawTextRow>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| ConsoleError::DataParsing {
            origin: "dataset upload".to_string(),
            details: e.to_string(),
        })?
        .clone();

    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(validation_error!("file", "CSV file is empty"));
    }

    let source_idx = column_index(&headers, "source")?;
    let text_idx = column_index(&headers, "text")?;

    let mut rows = Vec::new();
    for (row_number, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ConsoleError::DataParsing {
            origin: "dataset upload".to_string(),
            details: format!("row {}: {}", row_number + 1, e),
        })?;

        let source = record.get(source_idx).unwrap_or("").trim().to_string();
        let text = TextUtils::sanitize(record.get(text_idx).unwrap_or("").trim());
        if text.is_empty() {
            continue;
        }
        check_row_limits(rows.len(), &text, config)?;

        rows.push(RawTextRow {
            source: if source.is_empty() {
                "unknown".to_string()
            } else {
                source
            },
            text,
        });
    }

    if rows.is_empty() {
        return Err(validation_error!("file", "CSV file is empty"));
    }

    Ok(rows)
}

/// Parse a validation upload (`text,sentiment` columns, any order)
pub fn parse_validation_csv(bytes: &[u8], config: &UploadConfig) -> Result<Vec<ValidationRecord>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| ConsoleError::DataParsing {
            origin: "validation upload".to_string(),
            details: e.to_string(),
        })?
        .clone();

    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(validation_error!("file", "CSV file is empty"));
    }

    let text_idx = column_index(&headers, "text")?;
    let sentiment_idx = column_index(&headers, "sentiment")?;

    let mut rows = Vec::new();
    for (row_number, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ConsoleError::DataParsing {
            origin: "validation upload".to_string(),
            details: format!("row {}: {}", row_number + 1, e),
        })?;

        let text = TextUtils::sanitize(record.get(text_idx).unwrap_or("").trim());
        if text.is_empty() {
            continue;
        }
        check_row_limits(rows.len(), &text, config)?;

        let true_sentiment = record
            .get(sentiment_idx)
            .unwrap_or("")
            .trim()
            .parse()
            .map_err(|_| {
                validation_error!(
                    "sentiment",
                    "row {} has an invalid label '{}'",
                    row_number + 1,
                    record.get(sentiment_idx).unwrap_or("")
                )
            })?;

        rows.push(ValidationRecord {
            text,
            true_sentiment,
        });
    }

    if rows.is_empty() {
        return Err(validation_error!("file", "CSV file is empty"));
    }

    Ok(rows)
}

/// Ingest a raw dataset: parse, predict, store, register.
///
/// Prediction runs on the blocking pool so large uploads do not stall the
/// async runtime.
pub async fn ingest_dataset(
    store: &RecordStore,
    model: Arc<SentimentModel>,
    config: &UploadConfig,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<IngestReport> {
    check_filename(filename)?;
    let rows = parse_dataset_csv(&bytes, config)?;
    tracing::info!(
        "Parsed {} rows from dataset upload '{}'",
        rows.len(),
        TextUtils::truncate(filename, 80)
    );

    let texts: Vec<String> = rows.iter().map(|row| row.text.clone()).collect();
    let predictions = tokio::task::spawn_blocking(move || model.predict_batch(&texts))
        .await
        .map_err(|e| ConsoleError::Internal {
            message: format!("Prediction task failed: {}", e),
        })?;

    let now = Utc::now();
    let records: Vec<TextRecord> = rows
        .into_iter()
        .zip(predictions)
        .map(|(row, prediction)| TextRecord {
            id: Uuid::new_v4(),
            source: row.source,
            text: row.text,
            sentiment: Labeled::predicted(prediction.label),
            confidence: prediction.confidence,
            created_at: now,
            updated_at: now,
        })
        .collect();

    let records_processed = store.insert_records(records).await;
    let dataset = store
        .register_dataset(TextUtils::sanitize_filename(filename), records_processed)
        .await;

    Ok(IngestReport {
        dataset_id: dataset.id,
        records_processed,
    })
}

/// Ingest a validation dataset with ground-truth labels
pub async fn ingest_validation(
    store: &RecordStore,
    config: &UploadConfig,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<usize> {
    check_filename(filename)?;
    let rows = parse_validation_csv(&bytes, config)?;
    tracing::info!(
        "Parsed {} validation rows from '{}'",
        rows.len(),
        TextUtils::truncate(filename, 80)
    );

    Ok(store.extend_validation(rows).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::Sentiment;

    fn upload_config() -> UploadConfig {
        Config::default().upload
    }

    #[test]
    fn rejects_non_csv_filenames() {
        assert!(check_filename("data.csv").is_ok());
        assert!(check_filename("DATA.CSV").is_ok());
        assert!(check_filename("data.xlsx").is_err());
    }

    #[test]
    fn parses_dataset_columns_in_any_order() {
        let csv = b"text,source\nGreat stuff,twitter\nBroken again,support\n";
        let rows = parse_dataset_csv(csv, &upload_config()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source, "twitter");
        assert_eq!(rows[0].text, "Great stuff");
    }

    #[test]
    fn missing_required_column_is_a_validation_error() {
        let csv = b"source,body\ntwitter,hello\n";
        let err = parse_dataset_csv(csv, &upload_config()).unwrap_err();
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn empty_file_is_a_validation_error() {
        assert!(parse_dataset_csv(b"", &upload_config()).is_err());
        assert!(parse_dataset_csv(b"source,text\n", &upload_config()).is_err());
    }

    #[test]
    fn quoted_fields_with_commas_parse_intact() {
        let csv = b"source,text\nreviews,\"Good, but pricey\"\n";
        let rows = parse_dataset_csv(csv, &upload_config()).unwrap();
        assert_eq!(rows[0].text, "Good, but pricey");
    }

    #[test]
    fn blank_source_falls_back_to_unknown() {
        let csv = b"source,text\n,Something happened\n";
        let rows = parse_dataset_csv(csv, &upload_config()).unwrap();
        assert_eq!(rows[0].source, "unknown");
    }

    #[test]
    fn row_limit_is_enforced() {
        let config = UploadConfig {
            max_records: 2,
            max_text_length: 100,
        };
        let csv = b"source,text\na,one\na,two\na,three\n";
        assert!(parse_dataset_csv(csv, &config).is_err());
    }

    #[test]
    fn validation_rows_require_valid_labels() {
        let good = b"text,sentiment\nLoved it,positive\nHated it,negative\n";
        let rows = parse_validation_csv(good, &upload_config()).unwrap();
        assert_eq!(rows[0].true_sentiment, Sentiment::Positive);

        let bad = b"text,sentiment\nLoved it,ecstatic\n";
        assert!(parse_validation_csv(bad, &upload_config()).is_err());
    }

    #[tokio::test]
    async fn ingest_dataset_predicts_and_registers() {
        let store = RecordStore::new();
        let model = Arc::new(SentimentModel::new(Config::default().model).unwrap());
        let csv = b"source,text\ntwitter,This is wonderful\nsupport,Awful broken mess\n".to_vec();

        let report = ingest_dataset(&store, model, &upload_config(), "batch.csv", csv)
            .await
            .unwrap();
        assert_eq!(report.records_processed, 2);

        let records = store.snapshot().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].effective_sentiment(), Sentiment::Positive);
        assert_eq!(records[1].effective_sentiment(), Sentiment::Negative);
        assert!(records.iter().all(|r| (0.0..=1.0).contains(&r.confidence)));
    }

    #[tokio::test]
    async fn ingest_validation_stores_ground_truth() {
        let store = RecordStore::new();
        let csv = b"text,sentiment\nGreat,positive\n".to_vec();

        let count = ingest_validation(&store, &upload_config(), "val.csv", csv)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.validation_count().await, 1);
    }
}
