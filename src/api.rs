//! # API Server Module
//!
//! ## Purpose
//! HTTP/JSON server exposing the labeling console contract: dataset uploads,
//! paginated browsing and search, label correction, statistics, model
//! evaluation, and CSV export.
//!
//! ## Input/Output Specification
//! - **Input**: HTTP requests with filters, search bodies, corrections, and
//!   multipart file uploads (field `file`)
//! - **Output**: JSON responses; CSV attachment for exports
//! - **Errors**: every non-2xx response carries `{"detail": "<message>"}`
//!
//! ## Key Features
//! - Fail-fast parameter validation before any store access
//! - Evaluation and batch prediction dispatched to the blocking pool
//! - CORS support for web frontends
//! - Structured error responses

use crate::errors::{ConsoleError, Result};
use crate::export::ExportFormat;
use crate::query::{ListFilter, SearchRequest};
use crate::utils::Timer;
use crate::validation_error;
use crate::{evaluation, export, ingestion, query, stats, AppState, RecordId, Sentiment};
use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, App, HttpResponse, HttpServer};
use futures::TryStreamExt;
use serde::Deserialize;

/// Application server for the console API
pub struct ApiServer {
    app_state: AppState,
}

/// Body of a correction request
#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    pub corrected_sentiment: String,
}

/// Query parameters of an export request
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

impl ApiServer {
    /// Create new API server
    pub async fn new(app_state: AppState) -> Result<Self> {
        Ok(Self { app_state })
    }

    /// Run the API server
    pub async fn run(self) -> Result<()> {
        let config = &self.app_state.config.server;
        let bind_addr = format!("{}:{}", config.host, config.port);
        let enable_cors = config.enable_cors;
        let workers = self.app_state.config.performance.worker_threads;
        let app_state = self.app_state.clone();

        tracing::info!("Starting console API server on {}", bind_addr);

        let server = HttpServer::new(move || {
            let cors = if enable_cors {
                Cors::permissive()
            } else {
                Cors::default()
            };

            App::new()
                .app_data(web::Data::new(app_state.clone()))
                .wrap(cors)
                .configure(routes)
        })
        .workers(workers)
        .bind(&bind_addr)
        .map_err(|e| ConsoleError::Internal {
            message: format!("Failed to bind server to {}: {}", bind_addr, e),
        })?
        .run();

        server.await.map_err(|e| ConsoleError::Internal {
            message: format!("Server error: {}", e),
        })?;

        Ok(())
    }
}

/// Register all routes; shared between the server and handler tests
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index_handler))
        .route("/health", web::get().to(health_handler))
        .service(
            web::scope("/api")
                .route("/upload-dataset", web::post().to(upload_dataset_handler))
                .route("/upload-validation", web::post().to(upload_validation_handler))
                .route("/texts", web::get().to(list_texts_handler))
                .route("/texts/{id}", web::put().to(correct_text_handler))
                .route("/statistics", web::get().to(statistics_handler))
                .route("/evaluate", web::post().to(evaluate_handler))
                .route("/search", web::post().to(search_handler))
                .route("/export", web::get().to(export_handler)),
        );
}

/// Pull the `file` field out of a multipart upload, enforcing the size cap
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> Result<(String, Vec<u8>)> {
    while let Some(mut field) = payload.try_next().await.map_err(|e| ConsoleError::DataParsing {
        origin: "multipart upload".to_string(),
        details: e.to_string(),
    })? {
        if field.name() != "file" {
            continue;
        }

        let filename = field
            .content_disposition()
            .get_filename()
            .map(|name| name.to_string())
            .ok_or_else(|| validation_error!("file", "upload is missing a filename"))?;

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(|e| ConsoleError::DataParsing {
            origin: "multipart upload".to_string(),
            details: e.to_string(),
        })? {
            if data.len() + chunk.len() > max_bytes {
                return Err(validation_error!(
                    "file",
                    "upload exceeds the payload limit of {} bytes",
                    max_bytes
                ));
            }
            data.extend_from_slice(&chunk);
        }

        return Ok((filename, data));
    }

    Err(validation_error!("file", "multipart field 'file' is required"))
}

/// Dataset upload endpoint handler
async fn upload_dataset_handler(
    app_state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let max_bytes = app_state.config.server.max_payload_size_mb as usize * 1024 * 1024;
    let (filename, bytes) = read_upload(payload, max_bytes).await?;

    let report = ingestion::ingest_dataset(
        &app_state.store,
        app_state.model.clone(),
        &app_state.config.upload,
        &filename,
        bytes,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Dataset uploaded successfully",
        "dataset_id": report.dataset_id,
        "records_processed": report.records_processed,
    })))
}

/// Validation dataset upload endpoint handler
async fn upload_validation_handler(
    app_state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse> {
    let max_bytes = app_state.config.server.max_payload_size_mb as usize * 1024 * 1024;
    let (filename, bytes) = read_upload(payload, max_bytes).await?;

    let records_processed =
        ingestion::ingest_validation(&app_state.store, &app_state.config.upload, &filename, bytes)
            .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Validation dataset uploaded successfully",
        "records_processed": records_processed,
    })))
}

/// Paginated list endpoint handler
async fn list_texts_handler(
    app_state: web::Data<AppState>,
    filter: web::Query<ListFilter>,
) -> Result<HttpResponse> {
    let timer = Timer::new("list_texts");
    // Validation happens before the snapshot is taken
    let list_query = filter.validate(&app_state.config.query)?;
    let snapshot = app_state.store.snapshot().await;

    let page = query::run_list(snapshot, &list_query);
    tracing::debug!(
        "Listed {} of {} records in {}ms",
        page.items.len(),
        page.total,
        timer.stop()
    );
    Ok(HttpResponse::Ok().json(page))
}

/// Correction endpoint handler
async fn correct_text_handler(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<CorrectionRequest>,
) -> Result<HttpResponse> {
    let raw_id = path.into_inner();
    let id: RecordId = raw_id
        .parse()
        .map_err(|_| validation_error!("id", "'{}' is not a valid record id", raw_id))?;
    let label: Sentiment = body.corrected_sentiment.parse()?;

    let updated = app_state.store.correct(id, label).await?;
    Ok(HttpResponse::Ok().json(updated))
}

/// Statistics endpoint handler
async fn statistics_handler(app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let snapshot = app_state.store.snapshot().await;
    Ok(HttpResponse::Ok().json(stats::compute(&snapshot)))
}

/// Evaluation endpoint handler
async fn evaluate_handler(app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let timer = Timer::new("evaluate");
    let validation = app_state.store.validation_snapshot().await;
    let model = app_state.model.clone();

    // Metric computation is CPU-bound and must not stall other endpoints
    let metrics = tokio::task::spawn_blocking(move || {
        evaluation::evaluate_model(&model, &validation)
    })
    .await
    .map_err(|e| ConsoleError::Internal {
        message: format!("Evaluation task failed: {}", e),
    })??;

    tracing::info!(
        "Evaluated {} labels in {}ms (macro F1 {:.3})",
        metrics.labels.len(),
        timer.stop(),
        metrics.macro_f1
    );
    Ok(HttpResponse::Ok().json(metrics))
}

/// Search endpoint handler
async fn search_handler(
    app_state: web::Data<AppState>,
    request: web::Json<SearchRequest>,
) -> Result<HttpResponse> {
    let timer = Timer::new("search");
    let plan = request.validate(&app_state.config.query)?;
    let snapshot = app_state.store.snapshot().await;

    let page = query::run_search(snapshot, &plan);
    tracing::debug!(
        "Search matched {} records in {}ms",
        page.total,
        timer.stop()
    );
    Ok(HttpResponse::Ok().json(page))
}

/// Export endpoint handler
async fn export_handler(
    app_state: web::Data<AppState>,
    params: web::Query<ExportParams>,
) -> Result<HttpResponse> {
    let format: ExportFormat = params.format.as_deref().unwrap_or("csv").parse()?;

    let mut snapshot = app_state.store.snapshot().await;
    if snapshot.is_empty() {
        return Err(ConsoleError::NotFound {
            resource: "Data to export".to_string(),
            id: "corpus is empty".to_string(),
        });
    }
    query::order_records(&mut snapshot);

    // The full payload is built before the response starts, so a failure here
    // can never surface a partial file to the operator
    let body = export::export_csv(&snapshot)?;
    let filename = app_state.config.export.filename.clone();

    Ok(HttpResponse::Ok()
        .content_type(format.content_type())
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", filename),
        ))
        .body(body))
}

/// Health check endpoint handler
async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "healthy" }))
}

/// Index endpoint handler
async fn index_handler() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Sentiment Labeling Console API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::SentimentModel;
    use crate::store::RecordStore;
    use crate::{Labeled, Paginated, TextRecord};
    use actix_web::{test, App};
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    fn state() -> AppState {
        let config = Arc::new(Config::default());
        AppState {
            store: Arc::new(RecordStore::new()),
            model: Arc::new(SentimentModel::new(config.model.clone()).unwrap()),
            config,
        }
    }

    fn record(source: &str, text: &str, label: Sentiment) -> TextRecord {
        let now = Utc::now();
        TextRecord {
            id: Uuid::new_v4(),
            source: source.to_string(),
            text: text.to_string(),
            sentiment: Labeled::predicted(label),
            confidence: 0.5,
            created_at: now,
            updated_at: now,
        }
    }

    #[actix_web::test]
    async fn list_endpoint_paginates() {
        let state = state();
        let records: Vec<TextRecord> = (0..25)
            .map(|i| record("bulk", &format!("text {}", i), Sentiment::Neutral))
            .collect();
        state.store.insert_records(records).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/texts?page=2").to_request();
        let page: Paginated<TextRecord> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 2);
    }

    #[actix_web::test]
    async fn invalid_filter_yields_detail_body() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/texts?min_confidence=1.5")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["detail"].as_str().unwrap().contains("min_confidence"));
    }

    #[actix_web::test]
    async fn correction_round_trips_through_the_endpoint() {
        let state = state();
        let original = record("reviews", "fine", Sentiment::Neutral);
        let id = original.id;
        state.store.insert_records(vec![original]).await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/texts/{}", id))
            .set_json(serde_json::json!({ "corrected_sentiment": "positive" }))
            .to_request();
        let updated: TextRecord = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated.effective_sentiment(), Sentiment::Positive);
        assert_eq!(updated.sentiment.predicted, Sentiment::Neutral);

        // Statistics now count the corrected label
        let req = test::TestRequest::get().uri("/api/statistics").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["corrected_count"], 1);
        assert_eq!(body["sentiment_distribution"]["positive"], 1);
    }

    #[actix_web::test]
    async fn correcting_an_unknown_id_is_404() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/texts/{}", Uuid::new_v4()))
            .set_json(serde_json::json!({ "corrected_sentiment": "positive" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn evaluate_without_validation_data_is_a_precondition_failure() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/evaluate").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .contains("No validation data available"));
    }

    #[actix_web::test]
    async fn export_sets_attachment_headers() {
        let state = state();
        state
            .store
            .insert_records(vec![record("reviews", "nice", Sentiment::Positive)])
            .await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/export?format=csv")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let disposition = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(disposition.contains("sentiment_data.csv"));
    }

    #[actix_web::test]
    async fn export_of_an_empty_corpus_is_404() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state()))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/export").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn search_endpoint_filters_by_text_and_source() {
        let state = state();
        state
            .store
            .insert_records(vec![
                record("twitter", "I love this phone", Sentiment::Positive),
                record("reviews", "I love the case", Sentiment::Positive),
                record("reviews", "battery is bad", Sentiment::Negative),
            ])
            .await;

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/search")
            .set_json(serde_json::json!({ "query": "LOVE", "sources": ["reviews"] }))
            .to_request();
        let page: Paginated<TextRecord> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].source, "reviews");
    }
}
