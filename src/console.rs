//! # Console View-State Module
//!
//! ## Purpose
//! Transient state of the operator console: current filters, current page,
//! the single in-flight edit session, and the last surfaced error. The state
//! is an explicit serializable struct, independent of any rendering layer,
//! so its invariants are unit-testable.
//!
//! ## Input/Output Specification
//! - **Input**: operator actions (filter changes, paging, edits) and backend
//!   responses
//! - **Output**: the page to render, the open edit session, the error to show
//! - **Race guard**: every dispatched request captures a generation ticket;
//!   a response is applied only when its ticket is still the latest, so a
//!   stale, slower response can never overwrite a newer one
//!
//! ## Key Features
//! - Monotonic request generation instead of cancellation tokens
//! - One edit session at a time; completion takes the backend's
//!   authoritative record, never the local optimistic copy
//! - Errors recorded per action and cleared on the next success, leaving
//!   the action retryable with unchanged state

use crate::client::SentimentBackend;
use crate::errors::{ConsoleError, Result};
use crate::export::ExportFormat;
use crate::query::ListFilter;
use crate::{Paginated, RecordId, Sentiment, TextRecord};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Filters the operator has set in the browse view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowseFilters {
    pub source: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub min_confidence: Option<f64>,
}

/// The one in-progress label edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditSession {
    /// Record being edited
    pub record_id: RecordId,
    /// Model prediction, shown for reference
    pub predicted: Sentiment,
    /// Label currently selected by the operator
    pub selected: Sentiment,
}

/// Generation ticket captured when a request is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    generation: u64,
}

/// Serializable console view state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewState {
    pub filters: BrowseFilters,
    pub page: usize,
    pub page_size: usize,
    /// Most recently applied page of results
    pub current: Option<Paginated<TextRecord>>,
    /// Open edit session, if any
    pub edit: Option<EditSession>,
    /// Human-readable message of the last failed action
    pub last_error: Option<String>,
    generation: u64,
}

impl ViewState {
    /// Create view state with the given page size
    pub fn new(page_size: usize) -> Self {
        Self {
            filters: BrowseFilters::default(),
            page: 1,
            page_size,
            current: None,
            edit: None,
            last_error: None,
            generation: 0,
        }
    }

    /// Replace the filters and reset to the first page
    pub fn set_filters(&mut self, filters: BrowseFilters) {
        if self.filters != filters {
            self.filters = filters;
            self.page = 1;
        }
    }

    /// Navigate to a page (1-indexed)
    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// The wire filter matching the current view
    pub fn to_list_filter(&self) -> ListFilter {
        ListFilter {
            page: Some(self.page),
            page_size: Some(self.page_size),
            source: self.filters.source.clone(),
            sentiment: self.filters.sentiment.map(|s| s.as_str().to_string()),
            min_confidence: self.filters.min_confidence,
        }
    }

    /// Mark a request as dispatched, superseding all earlier ones
    pub fn begin_request(&mut self) -> RequestTicket {
        self.generation += 1;
        RequestTicket {
            generation: self.generation,
        }
    }

    /// Apply a response if its ticket is still the latest.
    ///
    /// Returns whether the page was applied; a stale response is discarded
    /// without touching the rendered state.
    pub fn apply_page(&mut self, ticket: RequestTicket, page: Paginated<TextRecord>) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                "Discarding stale response (generation {} < {})",
                ticket.generation,
                self.generation
            );
            return false;
        }
        self.current = Some(page);
        self.last_error = None;
        true
    }

    /// Record a failed action's message, latest request only
    pub fn apply_error(&mut self, ticket: RequestTicket, error: &ConsoleError) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        self.last_error = Some(error.to_string());
        true
    }

    /// Open an edit session for a record.
    ///
    /// Only one session may be open at a time; starting a second edit while
    /// one is pending is rejected.
    pub fn begin_edit(&mut self, record: &TextRecord) -> Result<&EditSession> {
        if self.edit.is_some() {
            return Err(ConsoleError::Precondition {
                message: "Another edit is already in progress".to_string(),
            });
        }
        Ok(self.edit.insert(EditSession {
            record_id: record.id,
            predicted: record.sentiment.predicted,
            selected: record.effective_sentiment(),
        }))
    }

    /// Change the label selected in the open edit session
    pub fn select_label(&mut self, label: Sentiment) -> Result<()> {
        match &mut self.edit {
            Some(session) => {
                session.selected = label;
                Ok(())
            }
            None => Err(ConsoleError::Precondition {
                message: "No edit session is open".to_string(),
            }),
        }
    }

    /// Close the edit session with the backend's authoritative record.
    ///
    /// The updated record replaces the local copy on the current page; the
    /// caller is expected to re-fetch afterwards.
    pub fn complete_edit(&mut self, updated: &TextRecord) -> Result<()> {
        let session = self.edit.as_ref().ok_or_else(|| ConsoleError::Precondition {
            message: "No edit session is open".to_string(),
        })?;
        if session.record_id != updated.id {
            return Err(ConsoleError::Precondition {
                message: "Correction response does not match the open edit session".to_string(),
            });
        }

        if let Some(current) = &mut self.current {
            if let Some(slot) = current.items.iter_mut().find(|item| item.id == updated.id) {
                *slot = updated.clone();
            }
        }
        self.edit = None;
        self.last_error = None;
        Ok(())
    }

    /// Discard the open edit session and its selection
    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }
}

/// Shared handle for a view state owned by a UI thread
#[derive(Clone)]
pub struct ConsoleHandle {
    state: Arc<RwLock<ViewState>>,
}

impl ConsoleHandle {
    pub fn new(state: ViewState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&ViewState) -> R) -> R {
        f(&self.state.read())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        f(&mut self.state.write())
    }
}

/// Fetch the page matching the current view and apply it latest-wins.
///
/// Returns whether the response was applied (false means it was superseded
/// by a newer request while in flight).
pub async fn refresh(handle: &ConsoleHandle, backend: &dyn SentimentBackend) -> Result<bool> {
    let (ticket, filter) = handle.update(|state| (state.begin_request(), state.to_list_filter()));

    match backend.list_texts(&filter).await {
        Ok(page) => Ok(handle.update(|state| state.apply_page(ticket, page))),
        Err(error) => {
            handle.update(|state| state.apply_error(ticket, &error));
            Err(error)
        }
    }
}

/// Submit the open edit session's selection and close it on success.
///
/// The session stays open on failure so the operator can retry or cancel.
pub async fn submit_correction(
    handle: &ConsoleHandle,
    backend: &dyn SentimentBackend,
) -> Result<TextRecord> {
    let session = handle
        .read(|state| state.edit.clone())
        .ok_or_else(|| ConsoleError::Precondition {
            message: "No edit session is open".to_string(),
        })?;

    match backend.correct_text(session.record_id, session.selected).await {
        Ok(updated) => {
            handle.update(|state| state.complete_edit(&updated))?;
            Ok(updated)
        }
        Err(error) => {
            handle.update(|state| state.last_error = Some(error.to_string()));
            Err(error)
        }
    }
}

/// Download an export and save it to disk atomically.
///
/// The payload is fully downloaded before anything touches the target path,
/// and the write goes through a temporary file in the target's directory, so
/// a failed download or an aborted write never leaves a partial artifact
/// visible to the operator.
pub async fn save_export(
    handle: &ConsoleHandle,
    backend: &dyn SentimentBackend,
    format: ExportFormat,
    target: &Path,
) -> Result<()> {
    let bytes = match backend.export(format).await {
        Ok(bytes) => bytes,
        Err(error) => {
            handle.update(|state| state.last_error = Some(error.to_string()));
            return Err(error);
        }
    };

    let dir = target.parent().filter(|p| !p.as_os_str().is_empty());
    let mut staging = tempfile::NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new(".")))?;
    staging.write_all(&bytes)?;
    staging
        .persist(target)
        .map_err(|e| ConsoleError::Io(e.error))?;

    handle.update(|state| state.last_error = None);
    tracing::info!("Saved export to {:?} ({} bytes)", target, bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::UploadReceipt;
    use crate::evaluation::EvaluationMetrics;
    use crate::query::SearchRequest;
    use crate::stats::CorpusStatistics;
    use crate::Labeled;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use uuid::Uuid;

    fn record(text: &str, label: Sentiment) -> TextRecord {
        let now = Utc::now();
        TextRecord {
            id: Uuid::new_v4(),
            source: "reviews".to_string(),
            text: text.to_string(),
            sentiment: Labeled::predicted(label),
            confidence: 0.5,
            created_at: now,
            updated_at: now,
        }
    }

    fn page_of(records: Vec<TextRecord>) -> Paginated<TextRecord> {
        let total = records.len();
        Paginated {
            items: records,
            total,
            page: 1,
            page_size: 20,
            total_pages: total.div_ceil(20),
        }
    }

    #[test]
    fn stale_response_never_overwrites_a_newer_one() {
        let mut state = ViewState::new(20);

        // Fire filter A, then filter B before A resolves
        let ticket_a = state.begin_request();
        let ticket_b = state.begin_request();

        let page_b = page_of(vec![record("from B", Sentiment::Positive)]);
        assert!(state.apply_page(ticket_b, page_b));

        // A resolves late and must be discarded
        let page_a = page_of(vec![record("from A", Sentiment::Negative)]);
        assert!(!state.apply_page(ticket_a, page_a));

        let rendered = state.current.as_ref().unwrap();
        assert_eq!(rendered.items[0].text, "from B");
    }

    #[test]
    fn stale_errors_are_discarded_too() {
        let mut state = ViewState::new(20);
        let old = state.begin_request();
        let new = state.begin_request();

        let error = ConsoleError::Transport {
            details: "timeout".to_string(),
        };
        assert!(!state.apply_error(old, &error));
        assert!(state.last_error.is_none());

        assert!(state.apply_error(new, &error));
        assert!(state.last_error.is_some());
    }

    #[test]
    fn changing_filters_resets_to_the_first_page() {
        let mut state = ViewState::new(20);
        state.set_page(4);

        state.set_filters(BrowseFilters {
            sentiment: Some(Sentiment::Negative),
            ..Default::default()
        });
        assert_eq!(state.page, 1);

        // Re-applying identical filters keeps the page
        state.set_page(3);
        state.set_filters(BrowseFilters {
            sentiment: Some(Sentiment::Negative),
            ..Default::default()
        });
        assert_eq!(state.page, 3);
    }

    #[test]
    fn only_one_edit_session_may_be_open() {
        let mut state = ViewState::new(20);
        let first = record("first", Sentiment::Neutral);
        let second = record("second", Sentiment::Neutral);

        state.begin_edit(&first).unwrap();
        assert!(state.begin_edit(&second).is_err());

        state.cancel_edit();
        assert!(state.begin_edit(&second).is_ok());
    }

    #[test]
    fn edit_session_starts_from_the_effective_label() {
        let mut state = ViewState::new(20);
        let mut corrected = record("already fixed", Sentiment::Neutral);
        corrected.sentiment.correct(Sentiment::Positive);

        let session = state.begin_edit(&corrected).unwrap();
        assert_eq!(session.selected, Sentiment::Positive);
        assert_eq!(session.predicted, Sentiment::Neutral);
    }

    #[test]
    fn complete_edit_takes_the_authoritative_record() {
        let mut state = ViewState::new(20);
        let original = record("needs fixing", Sentiment::Neutral);
        let id = original.id;

        let ticket = state.begin_request();
        state.apply_page(ticket, page_of(vec![original.clone()]));
        state.begin_edit(&original).unwrap();
        state.select_label(Sentiment::Positive).unwrap();

        let mut updated = original;
        updated.sentiment.correct(Sentiment::Positive);
        state.complete_edit(&updated).unwrap();

        assert!(state.edit.is_none());
        let rendered = state.current.as_ref().unwrap();
        assert_eq!(
            rendered.items.iter().find(|r| r.id == id).unwrap().effective_sentiment(),
            Sentiment::Positive
        );
    }

    #[test]
    fn complete_edit_rejects_a_mismatched_record() {
        let mut state = ViewState::new(20);
        let editing = record("editing", Sentiment::Neutral);
        state.begin_edit(&editing).unwrap();

        let other = record("other", Sentiment::Positive);
        assert!(state.complete_edit(&other).is_err());
        assert!(state.edit.is_some());
    }

    #[test]
    fn view_state_is_serializable() {
        let mut state = ViewState::new(20);
        let ticket = state.begin_request();
        state.apply_page(ticket, page_of(vec![record("hello", Sentiment::Positive)]));

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"page_size\":20"));
    }

    /// Scripted backend for exercising the orchestration helpers
    struct ScriptedBackend {
        pages: Mutex<VecDeque<Result<Paginated<TextRecord>>>>,
        corrections: Mutex<VecDeque<Result<TextRecord>>>,
        exports: Mutex<VecDeque<Result<Vec<u8>>>>,
    }

    impl ScriptedBackend {
        fn new() -> Self {
            Self {
                pages: Mutex::new(VecDeque::new()),
                corrections: Mutex::new(VecDeque::new()),
                exports: Mutex::new(VecDeque::new()),
            }
        }
    }

    #[async_trait]
    impl SentimentBackend for ScriptedBackend {
        async fn upload_dataset(&self, _: &str, _: Vec<u8>) -> Result<UploadReceipt> {
            unimplemented!("not used in these tests")
        }
        async fn upload_validation(&self, _: &str, _: Vec<u8>) -> Result<UploadReceipt> {
            unimplemented!("not used in these tests")
        }
        async fn list_texts(&self, _: &ListFilter) -> Result<Paginated<TextRecord>> {
            self.pages.lock().pop_front().expect("no scripted page")
        }
        async fn correct_text(&self, _: RecordId, _: Sentiment) -> Result<TextRecord> {
            self.corrections.lock().pop_front().expect("no scripted correction")
        }
        async fn statistics(&self) -> Result<CorpusStatistics> {
            unimplemented!("not used in these tests")
        }
        async fn evaluate(&self) -> Result<EvaluationMetrics> {
            unimplemented!("not used in these tests")
        }
        async fn search(&self, _: &SearchRequest) -> Result<Paginated<TextRecord>> {
            unimplemented!("not used in these tests")
        }
        async fn export(&self, _: ExportFormat) -> Result<Vec<u8>> {
            self.exports.lock().pop_front().expect("no scripted export")
        }
    }

    #[tokio::test]
    async fn refresh_applies_the_fetched_page() {
        let backend = ScriptedBackend::new();
        backend
            .pages
            .lock()
            .push_back(Ok(page_of(vec![record("fetched", Sentiment::Positive)])));

        let handle = ConsoleHandle::new(ViewState::new(20));
        let applied = refresh(&handle, &backend).await.unwrap();
        assert!(applied);
        assert_eq!(handle.read(|s| s.current.as_ref().unwrap().total), 1);
    }

    #[tokio::test]
    async fn refresh_failure_records_the_error_and_allows_retry() {
        let backend = ScriptedBackend::new();
        backend.pages.lock().push_back(Err(ConsoleError::Transport {
            details: "connection reset".to_string(),
        }));
        backend
            .pages
            .lock()
            .push_back(Ok(page_of(vec![record("second try", Sentiment::Neutral)])));

        let handle = ConsoleHandle::new(ViewState::new(20));
        assert!(refresh(&handle, &backend).await.is_err());
        assert!(handle.read(|s| s.last_error.is_some()));

        // Same action retried with unchanged state succeeds and clears it
        assert!(refresh(&handle, &backend).await.unwrap());
        assert!(handle.read(|s| s.last_error.is_none()));
    }

    #[tokio::test]
    async fn submit_correction_closes_the_session_on_success() {
        let original = record("wrong label", Sentiment::Neutral);
        let mut updated = original.clone();
        updated.sentiment.correct(Sentiment::Negative);

        let backend = ScriptedBackend::new();
        backend.corrections.lock().push_back(Ok(updated));

        let handle = ConsoleHandle::new(ViewState::new(20));
        handle.update(|state| {
            let ticket = state.begin_request();
            state.apply_page(ticket, page_of(vec![original.clone()]));
            state.begin_edit(&original).unwrap();
            state.select_label(Sentiment::Negative).unwrap();
        });

        let result = submit_correction(&handle, &backend).await.unwrap();
        assert_eq!(result.effective_sentiment(), Sentiment::Negative);
        assert!(handle.read(|s| s.edit.is_none()));
    }

    #[tokio::test]
    async fn save_export_writes_the_downloaded_payload() {
        let payload = b"id,source,text\n".to_vec();
        let backend = ScriptedBackend::new();
        backend.exports.lock().push_back(Ok(payload.clone()));

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sentiment_data.csv");
        let handle = ConsoleHandle::new(ViewState::new(20));

        save_export(&handle, &backend, ExportFormat::Csv, &target)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), payload);
    }

    #[tokio::test]
    async fn failed_export_leaves_no_file_behind() {
        let backend = ScriptedBackend::new();
        backend.exports.lock().push_back(Err(ConsoleError::Transport {
            details: "download aborted".to_string(),
        }));

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sentiment_data.csv");
        let handle = ConsoleHandle::new(ViewState::new(20));

        assert!(save_export(&handle, &backend, ExportFormat::Csv, &target)
            .await
            .is_err());
        assert!(!target.exists());
        assert!(handle.read(|s| s.last_error.is_some()));
    }

    #[tokio::test]
    async fn failed_correction_keeps_the_session_open() {
        let original = record("wrong label", Sentiment::Neutral);

        let backend = ScriptedBackend::new();
        backend.corrections.lock().push_back(Err(ConsoleError::Server {
            status: 404,
            detail: "Text record not found".to_string(),
        }));

        let handle = ConsoleHandle::new(ViewState::new(20));
        handle.update(|state| {
            state.begin_edit(&original).unwrap();
        });

        assert!(submit_correction(&handle, &backend).await.is_err());
        assert!(handle.read(|s| s.edit.is_some()));
        assert!(handle.read(|s| s.last_error.is_some()));
    }
}
