//! Douguo (douguo.com) recipe page adapter.

use std::sync::LazyLock;

use recipefinder_shared::Ingredient;
use scraper::{ElementRef, Html, Selector};

use super::{SiteAdapter, ingredient_row};
use crate::{is_step_label, normalize_text, strip_step_marker};

static TITLE: LazyLock<Selector> = LazyLock::new(|| sel("h1.title"));
static TABLE: LazyLock<Selector> = LazyLock::new(|| sel("table.retamr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| sel("td"));
static NAME: LazyLock<Selector> = LazyLock::new(|| sel("span.scname"));
static QUANTITY: LazyLock<Selector> = LazyLock::new(|| sel("span.scnum"));
static STEP: LazyLock<Selector> = LazyLock::new(|| sel("div.stepcont"));
static STEP_INFO: LazyLock<Selector> = LazyLock::new(|| sel("div.stepinfo"));

fn sel(s: &str) -> Selector {
    Selector::parse(s).expect("valid selector")
}

/// Extracts recipes from douguo detail pages.
///
/// Ingredients live in `table.retamr`, one `<td>` per entry with
/// `span.scname`/`span.scnum`; steps are `div.stepcont > div.stepinfo`
/// blocks whose first `<p>` holds the "步骤N" label.
pub struct DouguoAdapter;

impl SiteAdapter for DouguoAdapter {
    fn detect(&self, doc: &Html) -> bool {
        doc.select(&TABLE).next().is_some() || doc.select(&STEP_INFO).next().is_some()
    }

    fn title(&self, doc: &Html) -> Option<String> {
        doc.select(&TITLE)
            .next()
            .map(|el| normalize_text(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    }

    fn ingredients(&self, doc: &Html) -> Option<Vec<Ingredient>> {
        let table = doc.select(&TABLE).next()?;

        let rows = table
            .select(&CELL)
            .filter_map(|cell| {
                let name = cell.select(&NAME).next().map(element_text);
                let quantity = cell.select(&QUANTITY).next().map(element_text);
                ingredient_row(name, quantity)
            })
            .collect();

        Some(rows)
    }

    fn steps(&self, doc: &Html) -> Option<Vec<String>> {
        let containers: Vec<ElementRef> = doc.select(&STEP).collect();
        if containers.is_empty() {
            return None;
        }

        let steps = containers
            .into_iter()
            .filter_map(|container| container.select(&STEP_INFO).next())
            .map(|info| {
                let (text, label_dropped) = text_without_label(info);
                let text = normalize_text(&text);
                if label_dropped { text } else { strip_step_marker(&text) }
            })
            .filter(|text| !text.is_empty())
            .collect();

        Some(steps)
    }

    fn name(&self) -> &str {
        "douguo"
    }
}

fn element_text(el: ElementRef) -> String {
    el.text().collect()
}

/// Text of a step block, minus the leading `<p>` label if it is one.
///
/// The flag reports whether the label was dropped.
fn text_without_label(info: ElementRef) -> (String, bool) {
    let mut out = String::new();
    let mut label_seen = false;
    let mut label_dropped = false;

    for child in info.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if !label_seen && el.value().name() == "p" {
                label_seen = true;
                let text = element_text(el);
                if is_step_label(&text) {
                    label_dropped = true;
                    continue;
                }
                out.push_str(&text);
                out.push(' ');
                continue;
            }
            out.extend(el.text());
            out.push(' ');
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }

    (out, label_dropped)
}
