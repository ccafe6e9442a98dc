//! Markdown rendering of the accepted set.

use recipefinder_shared::RankedCandidate;

/// Returned for an empty accepted set. Callers check emptiness, not this text.
pub const NO_RESULTS_MESSAGE: &str = "No matching recipes were found.";

const BLOCK_SEPARATOR: &str = "\n\n---\n\n";
const NO_INGREDIENTS: &str = "* No ingredient information could be extracted.";
const NO_STEPS: &str = "1. No step information could be extracted.";

/// Render accepted candidates in rank order, one block per recipe.
pub fn render(accepted: &[RankedCandidate]) -> String {
    if accepted.is_empty() {
        return NO_RESULTS_MESSAGE.to_string();
    }

    accepted
        .iter()
        .enumerate()
        .map(|(i, ranked)| render_block(i + 1, ranked))
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

fn render_block(index: usize, ranked: &RankedCandidate) -> String {
    let candidate = &ranked.candidate;
    let mut lines = vec![
        format!("### {index}. {}", candidate.title),
        String::new(),
        "**Ingredients**".to_string(),
    ];

    if candidate.ingredients.is_empty() {
        lines.push(NO_INGREDIENTS.to_string());
    } else {
        lines.extend(
            candidate
                .ingredients
                .iter()
                .map(|i| format!("* {}: {}", i.name, i.quantity)),
        );
    }

    lines.push(String::new());
    lines.push("**Steps**".to_string());

    if candidate.steps.is_empty() {
        lines.push(NO_STEPS.to_string());
    } else {
        lines.extend(
            candidate
                .steps
                .iter()
                .enumerate()
                .map(|(n, step)| format!("{}. {step}", n + 1)),
        );
    }

    if let Some(locator) = &candidate.locator {
        lines.push(String::new());
        lines.push(format!("> Source: [{locator}]({locator})"));
    }

    lines.join("\n")
}
