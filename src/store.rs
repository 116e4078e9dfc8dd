//! # Record Store Module
//!
//! ## Purpose
//! Backend-owned store for labeled text records, the held-out validation set,
//! the dataset registry, and the correction audit trail. The HTTP contract is
//! the persistence boundary: state lives in process memory and is arbitrated
//! through this module's locks.
//!
//! ## Input/Output Specification
//! - **Input**: Ingested records, validation records, label corrections
//! - **Output**: Point-in-time snapshots for the query/statistics/export
//!   services, updated records from corrections
//! - **Consistency**: snapshots are taken under the read lock, corrections
//!   under the write lock; a correction either fully lands or not at all

use crate::errors::{ConsoleError, Result};
use crate::{RecordId, Sentiment, TextRecord, ValidationRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// One uploaded dataset file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// Registry identifier
    pub id: Uuid,
    /// Uploaded filename, sanitized
    pub filename: String,
    /// Number of records ingested from the file
    pub total_records: usize,
    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,
}

/// One applied correction, kept for audit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditEntry {
    /// Record the correction applied to
    pub record_id: RecordId,
    /// Effective sentiment before the correction
    pub previous: Sentiment,
    /// Label the operator chose
    pub corrected: Sentiment,
    /// When the correction landed
    pub edited_at: DateTime<Utc>,
}

/// In-memory record store
pub struct RecordStore {
    records: RwLock<Vec<TextRecord>>,
    validation: RwLock<Vec<ValidationRecord>>,
    datasets: RwLock<Vec<DatasetEntry>>,
    edits: RwLock<Vec<EditEntry>>,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            validation: RwLock::new(Vec::new()),
            datasets: RwLock::new(Vec::new()),
            edits: RwLock::new(Vec::new()),
        }
    }

    /// Append a batch of ingested records, returning how many were stored
    pub async fn insert_records(&self, batch: Vec<TextRecord>) -> usize {
        let count = batch.len();
        let mut records = self.records.write().await;
        records.extend(batch);
        tracing::debug!("Stored {} records ({} total)", count, records.len());
        count
    }

    /// Point-in-time copy of the corpus for filtering and aggregation
    pub async fn snapshot(&self) -> Vec<TextRecord> {
        self.records.read().await.clone()
    }

    /// Number of records in the corpus
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Fetch one record by id
    pub async fn get(&self, id: RecordId) -> Option<TextRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    /// Apply a human correction to a record's sentiment.
    ///
    /// The prediction and confidence are untouched; `updated_at` advances on
    /// every application, including a repeat of the same label. Returns the
    /// updated record.
    pub async fn correct(&self, id: RecordId, label: Sentiment) -> Result<TextRecord> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| ConsoleError::NotFound {
                resource: "Text record".to_string(),
                id: id.to_string(),
            })?;

        let previous = record.effective_sentiment();
        record.sentiment.correct(label);
        record.updated_at = Utc::now();
        let updated = record.clone();
        drop(records);

        self.edits.write().await.push(EditEntry {
            record_id: id,
            previous,
            corrected: label,
            edited_at: updated.updated_at,
        });

        tracing::info!(
            "Corrected record {} from '{}' to '{}'",
            id,
            previous,
            label
        );
        Ok(updated)
    }

    /// Append validation records, returning how many were stored
    pub async fn extend_validation(&self, batch: Vec<ValidationRecord>) -> usize {
        let count = batch.len();
        self.validation.write().await.extend(batch);
        count
    }

    /// Point-in-time copy of the validation set
    pub async fn validation_snapshot(&self) -> Vec<ValidationRecord> {
        self.validation.read().await.clone()
    }

    /// Number of validation records
    pub async fn validation_count(&self) -> usize {
        self.validation.read().await.len()
    }

    /// Register an uploaded dataset file
    pub async fn register_dataset(&self, filename: String, total_records: usize) -> DatasetEntry {
        let entry = DatasetEntry {
            id: Uuid::new_v4(),
            filename,
            total_records,
            uploaded_at: Utc::now(),
        };
        self.datasets.write().await.push(entry.clone());
        entry
    }

    /// Corrections applied so far, oldest first
    pub async fn edit_history(&self) -> Vec<EditEntry> {
        self.edits.read().await.clone()
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
