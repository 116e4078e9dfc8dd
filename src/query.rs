//! # Query and Search Module
//!
//! ## Purpose
//! Translates filter and search requests into deterministic pages of records.
//! Two deliberate tiers: the list filter serves table browsing (single-source
//! drill-down), the search request serves cross-corpus discovery (free text
//! plus multi-source filtering).
//!
//! ## Input/Output Specification
//! - **Input**: Wire-shaped `ListFilter` / `SearchRequest`, a corpus snapshot
//! - **Output**: `Paginated<TextRecord>` pages; identical parameters over an
//!   unmutated snapshot return identical pages
//! - **Validation**: all parameter checks happen before any record is
//!   touched; no partial or fallback queries
//!
//! ## Key Features
//! - Conjunctive filter composition (AND across fields, OR within `sources`)
//! - Sentiment filters match the effective label, never the raw prediction
//! - Fixed ordering: `created_at` descending, record id as tie-break

use crate::config::QueryConfig;
use crate::errors::Result;
use crate::validation_error;
use crate::{Paginated, Sentiment, TextRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Filter parameters for the paginated list endpoint, as they arrive on the
/// wire (labels still unparsed so validation can fail fast with field names)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFilter {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    pub source: Option<String>,
    pub sentiment: Option<String>,
    pub min_confidence: Option<f64>,
}

/// Search parameters for the search endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text containment match over `text`; absent or empty matches all
    pub query: Option<String>,
    /// Record matches when its source is a member; empty set matches all
    pub sources: Option<Vec<String>>,
    pub sentiment: Option<String>,
    pub min_confidence: Option<f64>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// Validated list query, ready to run against a snapshot
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: usize,
    pub page_size: usize,
    pub source: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub min_confidence: Option<f64>,
}

/// Validated search plan, ready to run against a snapshot
#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub page: usize,
    pub page_size: usize,
    /// Lowercased needle; `None` when the request had no usable query text
    pub needle: Option<String>,
    pub sources: Option<HashSet<String>>,
    pub sentiment: Option<Sentiment>,
    pub min_confidence: Option<f64>,
}

fn validate_page(page: Option<usize>) -> Result<usize> {
    let page = page.unwrap_or(1);
    if page == 0 {
        return Err(validation_error!("page", "must be at least 1"));
    }
    Ok(page)
}

fn validate_page_size(page_size: Option<usize>, limits: &QueryConfig) -> Result<usize> {
    let page_size = page_size.unwrap_or(limits.default_page_size);
    if page_size == 0 {
        return Err(validation_error!("page_size", "must be at least 1"));
    }
    if page_size > limits.max_page_size {
        return Err(validation_error!(
            "page_size",
            "must not exceed {}",
            limits.max_page_size
        ));
    }
    Ok(page_size)
}

fn validate_sentiment(raw: Option<&str>) -> Result<Option<Sentiment>> {
    match raw {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some),
    }
}

fn validate_min_confidence(value: Option<f64>) -> Result<Option<f64>> {
    if let Some(bound) = value {
        if !(0.0..=1.0).contains(&bound) {
            return Err(validation_error!(
                "min_confidence",
                "{} is outside [0, 1]",
                bound
            ));
        }
    }
    Ok(value)
}

impl ListFilter {
    /// Validate all parameters, producing a runnable query.
    ///
    /// Runs before any store access; an invalid field aborts the whole
    /// request rather than degrading to a partial filter.
    pub fn validate(&self, limits: &QueryConfig) -> Result<ListQuery> {
        Ok(ListQuery {
            page: validate_page(self.page)?,
            page_size: validate_page_size(self.page_size, limits)?,
            source: self.source.clone().filter(|s| !s.is_empty()),
            sentiment: validate_sentiment(self.sentiment.as_deref())?,
            min_confidence: validate_min_confidence(self.min_confidence)?,
        })
    }
}

impl SearchRequest {
    /// Validate all parameters, producing a runnable plan
    pub fn validate(&self, limits: &QueryConfig) -> Result<SearchPlan> {
        let needle = self
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        let sources: Option<HashSet<String>> = match &self.sources {
            None => None,
            Some(list) if list.is_empty() => None,
            Some(list) => Some(list.iter().cloned().collect()),
        };

        Ok(SearchPlan {
            page: validate_page(self.page)?,
            page_size: validate_page_size(self.page_size, limits)?,
            needle,
            sources,
            sentiment: validate_sentiment(self.sentiment.as_deref())?,
            min_confidence: validate_min_confidence(self.min_confidence)?,
        })
    }
}

/// Fixed result ordering: newest first, record id breaking ties, so repeated
/// identical queries over an unmutated snapshot return identical pages.
/// Export uses the same ordering so files and pages agree.
pub fn order_records(records: &mut [TextRecord]) {
    records.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn confidence_at_least(record: &TextRecord, bound: Option<f64>) -> bool {
    bound.map_or(true, |min| record.confidence >= min)
}

fn sentiment_matches(record: &TextRecord, wanted: Option<Sentiment>) -> bool {
    wanted.map_or(true, |label| record.effective_sentiment() == label)
}

/// Run a validated list query over a corpus snapshot
pub fn run_list(records: Vec<TextRecord>, query: &ListQuery) -> Paginated<TextRecord> {
    let mut matched: Vec<TextRecord> = records
        .into_iter()
        .filter(|record| {
            query
                .source
                .as_deref()
                .map_or(true, |source| record.source == source)
                && sentiment_matches(record, query.sentiment)
                && confidence_at_least(record, query.min_confidence)
        })
        .collect();

    order_records(&mut matched);
    Paginated::from_full_set(matched, query.page, query.page_size)
}

/// Run a validated search plan over a corpus snapshot
pub fn run_search(records: Vec<TextRecord>, plan: &SearchPlan) -> Paginated<TextRecord> {
    let mut matched: Vec<TextRecord> = records
        .into_iter()
        .filter(|record| {
            plan.needle
                .as_deref()
                .map_or(true, |needle| record.text.to_lowercase().contains(needle))
                && plan
                    .sources
                    .as_ref()
                    .map_or(true, |sources| sources.contains(&record.source))
                && sentiment_matches(record, plan.sentiment)
                && confidence_at_least(record, plan.min_confidence)
        })
        .collect();

    order_records(&mut matched);
    Paginated::from_full_set(matched, plan.page, plan.page_size)
}
