//! Recipe document acquisition.
//!
//! This crate provides:
//! - [`DocumentSource`] — The "search terms + limit → raw documents" contract
//! - [`engine`] — HTTP implementation: search results page, then detail pages
//!
//! A source never returns the same locator twice in one batch. Per-item
//! failures come back as [`SkippedItem`]s; only whole-batch failures are errors.

pub mod engine;

use async_trait::async_trait;

use recipefinder_shared::{RawDocument, Result};

pub use engine::{HttpRecipeSource, canonical_locator, source_id};

/// Documents fetched for one batch, plus the items that were dropped on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub documents: Vec<RawDocument>,
    pub skipped: Vec<SkippedItem>,
}

/// One locator that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub locator: String,
    pub reason: String,
}

/// Fetches raw recipe documents for a set of search terms.
///
/// `Err` means the collaborator as a whole was unusable (search page
/// unreachable, or every listed item failed). An empty result list is `Ok`.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, terms: &[String], limit: usize) -> Result<FetchOutcome>;
}
