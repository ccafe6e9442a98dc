//! Fixed instruction templates, one per call type.
//!
//! Placeholders are `{name}` tokens filled with [`fill`]. Every template ends
//! by demanding a single JSON object so replies can be schema-validated.

use std::sync::LazyLock;

use recipefinder_shared::{Candidate, RequirementProfile};
use regex::{Captures, Regex};

pub const INTERPRET_SYSTEM: &str = "You are a task-planning assistant for a recipe search tool.";

pub const INTERPRET_TEMPLATE: &str = r#"Parse the user's request and extract the key information.

Reply with one JSON object and nothing else:
{"search_keywords": [string, ...], "user_ingredients": [string, ...], "recipe_count": integer, "other_requirements": string}

- search_keywords: one to three short terms to type into a recipe site search box
- user_ingredients: ingredients the user says they already have
- recipe_count: how many recipes the user wants (1 if not stated)
- other_requirements: every other preference, or an empty string

User request:
"{user_query}""#;

pub const JUDGE_SYSTEM: &str = "You are a strict recipe reviewer.";

pub const JUDGE_TEMPLATE: &str = r#"Decide whether the recipe below fits the user's needs.

User needs:
- Ingredients they have: {user_ingredients}
- Other requirements and preferences: {other_requirements}

Recipe:
- Title: {recipe_title}
- Ingredients: {recipe_ingredients}
- Steps: {recipe_steps}

Criteria:
1. Ingredient match: the recipe mainly uses what the user has. Missing one or two common seasonings, or one or two core items to buy, is acceptable.
2. Requirement match: the recipe respects the other requirements (e.g. "quick" means few, short steps; "fitness" means light and healthy).
3. Overall score from 1 to 10 based on the two points above.

Reply with one JSON object and nothing else:
{"decision": boolean, "score": integer, "reasoning": string}"#;

pub const POLISH_SYSTEM: &str = "You are a friendly cooking assistant.";

pub const POLISH_TEMPLATE: &str = r#"Rewrite the recipe recommendations below as a warm, concise reply to the user. Keep every recipe, ingredient quantity and step; keep the source links.

Reply with one JSON object and nothing else:
{"text": string}

Recommendations:
{rendered}"#;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("valid regex"));

/// Substitute `{key}` tokens in a template in one pass.
///
/// Substituted values are never rescanned; unknown tokens are left as they are.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let token = &caps[0];
            vars.iter()
                .find(|(key, _)| *key == &caps[1])
                .map_or_else(|| token.to_string(), |(_, value)| value.to_string())
        })
        .into_owned()
}

pub fn interpret_prompt(raw_query: &str) -> String {
    fill(INTERPRET_TEMPLATE, &[("user_query", raw_query)])
}

pub fn judge_prompt(profile: &RequirementProfile, candidate: &Candidate) -> String {
    let owned = if profile.owned_items.is_empty() {
        "(none stated)".to_string()
    } else {
        profile.owned_items.iter().cloned().collect::<Vec<_>>().join(", ")
    };

    let ingredients = candidate
        .ingredients
        .iter()
        .map(|i| format!("{}({})", i.name, i.quantity))
        .collect::<Vec<_>>()
        .join(", ");

    let steps = candidate
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {s}", i + 1))
        .collect::<Vec<_>>()
        .join(" ");

    fill(
        JUDGE_TEMPLATE,
        &[
            ("user_ingredients", &owned),
            ("other_requirements", &profile.free_text),
            ("recipe_title", &candidate.title),
            ("recipe_ingredients", &ingredients),
            ("recipe_steps", &steps),
        ],
    )
}

pub fn polish_prompt(rendered: &str) -> String {
    fill(POLISH_TEMPLATE, &[("rendered", rendered)])
}
