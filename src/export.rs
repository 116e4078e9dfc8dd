//! # Export Module
//!
//! ## Purpose
//! Serializes the full corpus to a downloadable delimited-text file. The
//! payload reflects corrections: the sentiment column carries the effective
//! label, with the raw prediction and the correction preserved alongside for
//! audit.
//!
//! ## Input/Output Specification
//! - **Input**: a corpus snapshot in query order, the requested format
//! - **Output**: a complete in-memory byte buffer; the buffer is built in
//!   full before anything is handed to the transport, so a failed export
//!   never leaves a partial artifact
//! - **Columns**: id, source, text, sentiment (effective), predicted,
//!   corrected (empty when absent), confidence, created_at, updated_at

use crate::errors::{ConsoleError, Result};
use crate::TextRecord;
use std::str::FromStr;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
}

impl ExportFormat {
    /// MIME type for the format
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
        }
    }

    /// Wire name of the format, as sent in the `format` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ConsoleError::Validation {
                field: "format".to_string(),
                reason: format!("unsupported export format '{}'", other),
            }),
        }
    }
}

const HEADER: [&str; 9] = [
    "id",
    "source",
    "text",
    "sentiment",
    "predicted_sentiment",
    "corrected_sentiment",
    "confidence",
    "created_at",
    "updated_at",
];

/// Serialize the corpus into a complete CSV buffer
pub fn export_csv(records: &[TextRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADER)?;

    for record in records {
        writer.write_record([
            record.id.to_string(),
            record.source.clone(),
            record.text.clone(),
            record.effective_sentiment().to_string(),
            record.sentiment.predicted.to_string(),
            record
                .sentiment
                .corrected
                .map(|label| label.to_string())
                .unwrap_or_default(),
            record.confidence.to_string(),
            record.created_at.to_rfc3339(),
            record.updated_at.to_rfc3339(),
        ])?;
    }

    writer.into_inner().map_err(|e| ConsoleError::Csv {
        details: e.to_string(),
    })
}
