//! Recipe extraction from raw recipe pages.
//!
//! This crate provides:
//! - [`adapters`] — Site-specific region extractors (douguo, xiachufang, generic)
//! - [`Extractor`] — Turns one [`RawDocument`] into a [`Candidate`]
//!
//! Extraction is a pure function of one document: no I/O, no shared state.

pub mod adapters;

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use tracing::debug;

use recipefinder_shared::{Candidate, RawDocument};

pub use adapters::{AdapterRegistry, DouguoAdapter, GenericAdapter, SiteAdapter, XiachufangAdapter};

/// Title used when a document has no title region.
pub const UNTITLED: &str = "Untitled recipe";

/// Why a document produced no candidate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionFailure {
    #[error("document body is empty")]
    EmptyBody,

    #[error("no ingredient or step region found ({adapter} layout)")]
    NoRecipeStructure { adapter: String },
}

/// Parses raw documents with the first matching site adapter.
#[derive(Default)]
pub struct Extractor {
    registry: AdapterRegistry,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one document into a candidate.
    ///
    /// Title, ingredients and steps are located independently. A missing
    /// title falls back to [`UNTITLED`]; a document with neither an ingredient
    /// region nor a step region is rejected.
    pub fn extract(&self, raw: &RawDocument) -> Result<Candidate, ExtractionFailure> {
        if raw.body.trim().is_empty() {
            return Err(ExtractionFailure::EmptyBody);
        }

        let doc = Html::parse_document(&raw.body);
        let adapter = self.registry.detect(&doc);

        let ingredients = adapter.ingredients(&doc);
        let steps = adapter.steps(&doc);

        if ingredients.is_none() && steps.is_none() {
            return Err(ExtractionFailure::NoRecipeStructure {
                adapter: adapter.name().to_string(),
            });
        }

        let title = adapter.title(&doc).unwrap_or_else(|| UNTITLED.to_string());
        let ingredients = ingredients.unwrap_or_default();
        let steps = steps.unwrap_or_default();

        debug!(
            source_id = %raw.source_id,
            adapter = adapter.name(),
            ingredients = ingredients.len(),
            steps = steps.len(),
            "extracted candidate"
        );

        Ok(Candidate {
            source_id: raw.source_id.clone(),
            locator: Some(raw.locator.clone()).filter(|l| !l.is_empty()),
            title,
            ingredients,
            steps,
        })
    }
}

// ---------------------------------------------------------------------------
// Text helpers
// ---------------------------------------------------------------------------

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

static STEP_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:(?:步骤|第)\s*\d+\s*步?|(?i:step)\s*\d+)\s*[.、:：)）,，\-]?|[(（]\s*\d+\s*[)）]|\d+[.、)）])\s*",
    )
    .expect("valid regex")
});

static STEP_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(?:步骤|第)\s*\d+\s*步?|(?i:step)\s*\d+|\d+)\s*[.、:：)）]?\s*$")
        .expect("valid regex")
});

/// Remove a leading ordinal label ("步骤2", "Step 2:", "2.", "2、", "(2)") from a step.
///
/// Only the start of the text is touched. A bare number counts as a label only
/// when followed by `.`, `、` or `)`; "1:2 ratio" and "1.5 cups" are left alone.
pub fn strip_step_marker(text: &str) -> String {
    let Some(m) = STEP_MARKER.find(text) else {
        return text.trim().to_string();
    };

    let rest = &text[m.end()..];
    if m.as_str().ends_with('.') && rest.starts_with(|c: char| c.is_ascii_digit()) {
        return text.trim().to_string();
    }

    rest.trim().to_string()
}

/// Whether a text node is nothing but a step label.
pub fn is_step_label(text: &str) -> bool {
    STEP_LABEL.is_match(text)
}
