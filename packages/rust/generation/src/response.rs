//! Parsing and validation of model replies.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use recipefinder_shared::{RecipeError, RequirementProfile, Result, Verdict};

/// Locate the JSON object inside a model reply.
///
/// Prefers a fenced ```` ```json ```` block; otherwise takes the span from the
/// first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Result<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Ok(body[..end].trim());
        }
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(RecipeError::parse(format!(
            "no JSON object in reply: {}",
            snippet(text)
        ))),
    }
}

/// Extract and deserialize the JSON object in a reply.
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = extract_json_object(text)?;
    serde_json::from_str(json)
        .map_err(|e| RecipeError::parse(format!("reply does not match schema: {e}")))
}

fn snippet(text: &str) -> String {
    text.chars().take(120).collect()
}

// ---------------------------------------------------------------------------
// Interpret
// ---------------------------------------------------------------------------

/// What the interpret call understood from the user's request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InterpretPlan {
    pub search_keywords: Vec<String>,
    #[serde(default)]
    pub user_ingredients: Vec<String>,
    pub recipe_count: i64,
    #[serde(default)]
    pub other_requirements: String,
}

impl InterpretPlan {
    pub fn validate(mut self) -> Result<Self> {
        self.search_keywords = self
            .search_keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if self.search_keywords.is_empty() {
            return Err(RecipeError::validation("interpret reply has no search keywords"));
        }
        if self.recipe_count < 1 {
            return Err(RecipeError::validation(format!(
                "recipe_count must be at least 1, got {}",
                self.recipe_count
            )));
        }
        Ok(self)
    }

    /// Split into search terms and the requirement profile.
    pub fn into_parts(self) -> (Vec<String>, RequirementProfile) {
        let desired = u32::try_from(self.recipe_count).unwrap_or(u32::MAX);
        let profile = RequirementProfile::new(self.user_ingredients, self.other_requirements, desired);
        (self.search_keywords, profile)
    }
}

// ---------------------------------------------------------------------------
// Judge
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct JudgeReply {
    decision: bool,
    score: i64,
    #[serde(default)]
    reasoning: String,
}

impl JudgeReply {
    pub(crate) fn into_verdict(self) -> Result<Verdict> {
        let score = u8::try_from(self.score)
            .ok()
            .filter(|s| (1..=10).contains(s))
            .ok_or_else(|| {
                RecipeError::validation(format!("score {} outside 1..=10", self.score))
            })?;

        Ok(Verdict {
            accept: self.decision,
            score,
            reason: self.reasoning,
        })
    }
}

// ---------------------------------------------------------------------------
// Polish
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct PolishReply {
    text: String,
}

impl PolishReply {
    pub(crate) fn into_text(self) -> Result<String> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(RecipeError::validation("polish reply text is empty"));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_block() {
        let reply = "Sure!\n```json\n{\"text\": \"hi\"}\n```\nanything else?";
        assert_eq!(extract_json_object(reply).unwrap(), "{\"text\": \"hi\"}");
    }

    #[test]
    fn extracts_outermost_braces() {
        let reply = "Here you go: {\"a\": {\"b\": 1}} done";
        assert_eq!(extract_json_object(reply).unwrap(), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn reply_without_object_is_parse_error() {
        let err = extract_json_object("I cannot help with that.").unwrap_err();
        assert!(matches!(err, RecipeError::Parse { .. }));
    }

    #[test]
    fn plan_validation() {
        let plan: InterpretPlan = parse_reply(
            r#"{"search_keywords": [" 三明治 ", ""], "user_ingredients": ["生菜", "鸡蛋"], "recipe_count": 2, "other_requirements": "快手"}"#,
        )
        .unwrap();
        let plan = plan.validate().unwrap();
        assert_eq!(plan.search_keywords, vec!["三明治".to_string()]);

        let (terms, profile) = plan.into_parts();
        assert_eq!(terms, vec!["三明治".to_string()]);
        assert_eq!(profile.desired_count, 2);
        assert!(profile.owned_items.contains("生菜"));
        assert_eq!(profile.free_text, "快手");
    }

    #[test]
    fn plan_rejects_empty_keywords_and_zero_count() {
        let plan: InterpretPlan =
            parse_reply(r#"{"search_keywords": [], "recipe_count": 1}"#).unwrap();
        assert!(plan.validate().is_err());

        let plan: InterpretPlan =
            parse_reply(r#"{"search_keywords": ["egg"], "recipe_count": 0}"#).unwrap();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn judge_score_range() {
        let ok: JudgeReply =
            parse_reply(r#"{"decision": true, "score": 10, "reasoning": "fits"}"#).unwrap();
        assert_eq!(ok.into_verdict().unwrap().score, 10);

        for bad in [0, 11, -3] {
            let reply: JudgeReply = parse_reply(&format!(
                r#"{{"decision": true, "score": {bad}, "reasoning": ""}}"#
            ))
            .unwrap();
            assert!(reply.into_verdict().is_err(), "score {bad} should be rejected");
        }
    }

    #[test]
    fn judge_missing_decision_is_schema_error() {
        let err = parse_reply::<JudgeReply>(r#"{"score": 7}"#).unwrap_err();
        assert!(err.to_string().contains("schema"));
    }

    #[test]
    fn polish_rejects_blank() {
        let reply: PolishReply = parse_reply(r#"{"text": "   "}"#).unwrap();
        assert!(reply.into_text().is_err());
    }
}
