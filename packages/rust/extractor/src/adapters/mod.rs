//! Site adapter trait and built-in adapters for recipe extraction.
//!
//! Adapters detect a specific recipe site layout by its structural anchors
//! (class markers on the title, ingredient table and step blocks) and pull
//! each region out independently.

mod douguo;
mod generic;
mod xiachufang;

use recipefinder_shared::Ingredient;
use scraper::Html;

pub use douguo::DouguoAdapter;
pub use generic::GenericAdapter;
pub use xiachufang::XiachufangAdapter;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Trait for site-specific recipe extraction.
///
/// Region methods return `None` when the region's anchor is missing from the
/// document, and `Some` (possibly empty) when the anchor exists.
pub trait SiteAdapter: Send + Sync {
    /// Try to detect this site layout in the parsed HTML.
    fn detect(&self, doc: &Html) -> bool;

    /// Text of the title region.
    fn title(&self, doc: &Html) -> Option<String>;

    /// Ingredient rows that carry both a name and a quantity.
    fn ingredients(&self, doc: &Html) -> Option<Vec<Ingredient>>;

    /// Step texts with their ordinal labels removed.
    fn steps(&self, doc: &Html) -> Option<Vec<String>>;

    /// Human-readable adapter name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered adapters in priority order, with a generic fallback.
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn SiteAdapter>>,
    fallback: GenericAdapter,
}

impl AdapterRegistry {
    /// Create a registry with all built-in site adapters.
    pub fn new() -> Self {
        Self {
            adapters: vec![Box::new(DouguoAdapter), Box::new(XiachufangAdapter)],
            fallback: GenericAdapter,
        }
    }

    /// Detect the best adapter for the given HTML document.
    pub fn detect(&self, doc: &Html) -> &dyn SiteAdapter {
        self.adapters
            .iter()
            .find(|adapter| adapter.detect(doc))
            .map(|adapter| adapter.as_ref())
            .unwrap_or(&self.fallback)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an ingredient only when both tokens survive normalization.
pub(crate) fn ingredient_row(name: Option<String>, quantity: Option<String>) -> Option<Ingredient> {
    let name = crate::normalize_text(&name?);
    let quantity = crate::normalize_text(&quantity?);
    if name.is_empty() || quantity.is_empty() {
        return None;
    }
    Some(Ingredient { name, quantity })
}
