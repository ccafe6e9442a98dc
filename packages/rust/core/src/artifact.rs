//! Markdown artifact writer.
//!
//! Saves the rendered recommendations of a finished run as a standalone
//! markdown file. Writing is best-effort from the run's point of view: errors
//! are returned to the caller and never touch the `PipelineState`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info, instrument};

use recipefinder_shared::{PipelineState, RecipeError, Result};

/// Maximum length of the search-term slug in file names, in characters.
const MAX_SLUG_CHARS: usize = 40;

/// Write the artifact for `state` into `output_dir`, stamped with the current time.
///
/// Returns `Ok(None)` when the run produced no rendered output.
pub fn save_markdown(state: &PipelineState, output_dir: &Path) -> Result<Option<PathBuf>> {
    save_markdown_at(state, output_dir, Local::now())
}

/// Same as [`save_markdown`] with an explicit timestamp.
#[instrument(skip_all, fields(run_id = %state.run_id, dir = %output_dir.display()))]
pub fn save_markdown_at(
    state: &PipelineState,
    output_dir: &Path,
    now: DateTime<Local>,
) -> Result<Option<PathBuf>> {
    let Some(rendered) = state.rendered_output.as_deref() else {
        debug!("no rendered output, nothing to save");
        return Ok(None);
    };

    std::fs::create_dir_all(output_dir).map_err(|e| RecipeError::io(output_dir, e))?;

    let filename = artifact_file_name(&state.search_terms, state.accepted_count(), now);
    let target = output_dir.join(&filename);
    let temp = output_dir.join(format!(".{filename}.tmp"));

    let content = build_document(state, rendered, now);

    // Write to temp file first, then rename into place
    let written = std::fs::write(&temp, &content)
        .map_err(|e| RecipeError::io(&temp, e))
        .and_then(|()| std::fs::rename(&temp, &target).map_err(|e| RecipeError::io(&target, e)));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }

    info!(path = %target.display(), size = content.len(), "saved recommendations");
    Ok(Some(target))
}

/// `recipes_<slug>_<count>_<YYYYmmdd_HHMMSS>.md`
pub fn artifact_file_name(search_terms: &[String], count: usize, now: DateTime<Local>) -> String {
    format!(
        "recipes_{}_{count}_{}.md",
        terms_slug(search_terms),
        now.format("%Y%m%d_%H%M%S")
    )
}

/// First two search terms joined by `_`, reduced to filesystem-safe characters.
fn terms_slug(search_terms: &[String]) -> String {
    let joined = search_terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join("_");

    let slug: String = joined
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_SLUG_CHARS)
        .collect();

    if slug.is_empty() { "query".into() } else { slug }
}

fn build_document(state: &PipelineState, rendered: &str, now: DateTime<Local>) -> String {
    let mut out = String::new();
    out.push_str("# Recipe recommendations\n\n");
    out.push_str(&format!("**Generated at**: {}\n\n", now.format("%Y-%m-%d %H:%M:%S")));
    out.push_str(&format!("**Query**: {}\n\n", state.raw_query.trim()));
    out.push_str("---\n\n");

    let accepted = state.accepted.as_deref().unwrap_or_default();
    if accepted.len() > 1 {
        out.push_str("## Contents\n\n");
        for (i, ranked) in accepted.iter().enumerate() {
            let n = i + 1;
            let title = &ranked.candidate.title;
            out.push_str(&format!("{n}. [{title}](#{})\n", heading_anchor(&format!("{n}. {title}"))));
        }
        out.push_str("\n---\n\n");
    }

    out.push_str(rendered);
    out.push('\n');
    out
}

/// GitHub-style anchor for a heading: lowercase, spaces to `-`, punctuation dropped.
fn heading_anchor(heading: &str) -> String {
    heading
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            '-' | '_' => Some(c),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .flat_map(char::to_lowercase)
        .collect()
}
