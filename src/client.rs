//! # Backend Client Module
//!
//! ## Purpose
//! Console-side HTTP data layer: produces the request shapes of the backend
//! contract and parses its responses. This is the only module that knows the
//! wire; the console view-state consumes the typed results.
//!
//! ## Input/Output Specification
//! - **Input**: typed filter/search/correction requests, dataset files
//! - **Output**: typed pages, records, statistics, metrics, export bytes
//! - **Errors**: non-2xx responses surface the backend's `detail` message
//!   when present, otherwise a fixed per-endpoint fallback; network failures
//!   surface as transport errors
//!
//! ## Key Features
//! - `SentimentBackend` trait seam for substituting the transport in tests
//! - Multipart upload of CSV datasets (field `file`)
//! - Streaming export download accumulated into an all-or-nothing buffer

use crate::config::BackendConfig;
use crate::errors::{ConsoleError, Result};
use crate::evaluation::EvaluationMetrics;
use crate::export::ExportFormat;
use crate::query::{ListFilter, SearchRequest};
use crate::stats::CorpusStatistics;
use crate::{Paginated, RecordId, Sentiment, TextRecord};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

// Fixed fallback messages used when an error response has no `detail` field
const FALLBACK_UPLOAD_DATASET: &str = "Failed to upload dataset";
const FALLBACK_UPLOAD_VALIDATION: &str = "Failed to upload validation dataset";
const FALLBACK_FETCH_TEXTS: &str = "Failed to fetch texts";
const FALLBACK_UPDATE_TEXT: &str = "Failed to update text";
const FALLBACK_FETCH_STATISTICS: &str = "Failed to fetch statistics";
const FALLBACK_EVALUATE: &str = "Failed to evaluate model";
const FALLBACK_SEARCH: &str = "Failed to search texts";
const FALLBACK_EXPORT: &str = "Failed to export data";

/// Receipt returned by the upload endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    pub records_processed: usize,
    #[serde(default)]
    pub dataset_id: Option<Uuid>,
    #[serde(default)]
    pub message: Option<String>,
}

/// The backend operations the console depends on.
///
/// The HTTP client implements this; tests drive the console against mocks.
#[async_trait]
pub trait SentimentBackend: Send + Sync {
    async fn upload_dataset(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadReceipt>;
    async fn upload_validation(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadReceipt>;
    async fn list_texts(&self, filter: &ListFilter) -> Result<Paginated<TextRecord>>;
    async fn correct_text(&self, id: RecordId, label: Sentiment) -> Result<TextRecord>;
    async fn statistics(&self) -> Result<CorpusStatistics>;
    async fn evaluate(&self) -> Result<EvaluationMetrics>;
    async fn search(&self, request: &SearchRequest) -> Result<Paginated<TextRecord>>;
    async fn export(&self, format: ExportFormat) -> Result<Vec<u8>>;
}

/// HTTP implementation of the backend contract
pub struct BackendClient {
    base_url: String,
    client: Client,
}

/// Error body shape on non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

impl BackendClient {
    /// Create a client from backend configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ConsoleError::Transport {
                details: e.to_string(),
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Reject non-2xx responses, preferring the body's `detail` message
    async fn check_status(response: Response, fallback: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = match response.json::<ErrorBody>().await {
            Ok(body) => body.detail,
            Err(_) => fallback.to_string(),
        };

        Err(ConsoleError::Server {
            status: status.as_u16(),
            detail,
        })
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
        let response = Self::check_status(response, fallback).await?;
        response.json::<T>().await.map_err(|e| ConsoleError::DataParsing {
            origin: "backend response".to_string(),
            details: e.to_string(),
        })
    }

    async fn post_file(&self, path: &str, filename: &str, bytes: Vec<u8>, fallback: &str) -> Result<UploadReceipt> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("text/csv")
            .map_err(|e| ConsoleError::Internal {
                message: format!("Failed to build multipart form: {}", e),
            })?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await?;

        Self::parse_json(response, fallback).await
    }
}

#[async_trait]
impl SentimentBackend for BackendClient {
    async fn upload_dataset(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadReceipt> {
        self.post_file("/upload-dataset", filename, bytes, FALLBACK_UPLOAD_DATASET)
            .await
    }

    async fn upload_validation(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadReceipt> {
        self.post_file(
            "/upload-validation",
            filename,
            bytes,
            FALLBACK_UPLOAD_VALIDATION,
        )
        .await
    }

    async fn list_texts(&self, filter: &ListFilter) -> Result<Paginated<TextRecord>> {
        // Absent parameters are omitted from the query string entirely
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(page) = filter.page {
            params.push(("page", page.to_string()));
        }
        if let Some(page_size) = filter.page_size {
            params.push(("page_size", page_size.to_string()));
        }
        if let Some(source) = &filter.source {
            params.push(("source", source.clone()));
        }
        if let Some(sentiment) = &filter.sentiment {
            params.push(("sentiment", sentiment.clone()));
        }
        if let Some(min_confidence) = filter.min_confidence {
            params.push(("min_confidence", min_confidence.to_string()));
        }

        let response = self
            .client
            .get(self.url("/texts"))
            .query(&params)
            .send()
            .await?;

        Self::parse_json(response, FALLBACK_FETCH_TEXTS).await
    }

    async fn correct_text(&self, id: RecordId, label: Sentiment) -> Result<TextRecord> {
        let response = self
            .client
            .put(self.url(&format!("/texts/{}", id)))
            .json(&serde_json::json!({ "corrected_sentiment": label }))
            .send()
            .await?;

        Self::parse_json(response, FALLBACK_UPDATE_TEXT).await
    }

    async fn statistics(&self) -> Result<CorpusStatistics> {
        let response = self.client.get(self.url("/statistics")).send().await?;
        Self::parse_json(response, FALLBACK_FETCH_STATISTICS).await
    }

    async fn evaluate(&self) -> Result<EvaluationMetrics> {
        let response = self.client.post(self.url("/evaluate")).send().await?;
        Self::parse_json(response, FALLBACK_EVALUATE).await
    }

    async fn search(&self, request: &SearchRequest) -> Result<Paginated<TextRecord>> {
        let response = self
            .client
            .post(self.url("/search"))
            .json(request)
            .send()
            .await?;

        Self::parse_json(response, FALLBACK_SEARCH).await
    }

    async fn export(&self, format: ExportFormat) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url("/export"))
            .query(&[("format", format.as_str())])
            .send()
            .await?;
        let response = Self::check_status(response, FALLBACK_EXPORT).await?;

        // Accumulate the stream into one buffer; a mid-stream failure drops
        // the whole download rather than surfacing a truncated file
        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ConsoleError::Transport {
                details: format!("export download aborted: {}", e),
            })?;
            buffer.extend_from_slice(&chunk);
        }

        Ok(buffer)
    }
}
