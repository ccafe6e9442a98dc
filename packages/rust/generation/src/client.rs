//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use recipefinder_shared::{
    Candidate, GenerationConfig, RecipeError, RequirementProfile, Result, Verdict, resolve_api_key,
};

use crate::prompts;
use crate::response::{InterpretPlan, JudgeReply, PolishReply, parse_reply};
use crate::GenerationService;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Talks to `{base_url}/chat/completions` with a bearer key.
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    /// Create a client with an explicit API key.
    pub fn new(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RecipeError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
        })
    }

    /// Create a client, reading the API key from the configured env var.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let api_key = resolve_api_key(config)?;
        Self::new(config, api_key)
    }

    /// Send one system+user exchange and return the reply text.
    ///
    /// Transport failures and non-2xx statuses are `Network` errors; a reply
    /// without content is a `Generation` error.
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RecipeError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecipeError::Network(format!(
                "{}: HTTP {status}: {}",
                self.endpoint,
                body.chars().take(200).collect::<String>()
            )));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| RecipeError::Generation(format!("malformed completion payload: {e}")))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| RecipeError::Generation("completion has no content".into()))?;

        debug!(len = content.len(), "completion received");
        Ok(content)
    }
}

#[async_trait]
impl GenerationService for ChatCompletionsClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn interpret(&self, raw_query: &str) -> Result<InterpretPlan> {
        let reply = self
            .complete(prompts::INTERPRET_SYSTEM, &prompts::interpret_prompt(raw_query))
            .await?;
        parse_reply::<InterpretPlan>(&reply)?.validate()
    }

    #[instrument(skip_all, fields(model = %self.model, source_id = %candidate.source_id))]
    async fn judge(&self, profile: &RequirementProfile, candidate: &Candidate) -> Result<Verdict> {
        let reply = self
            .complete(prompts::JUDGE_SYSTEM, &prompts::judge_prompt(profile, candidate))
            .await?;
        parse_reply::<JudgeReply>(&reply)?.into_verdict()
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn polish(&self, rendered: &str) -> Result<String> {
        let reply = self
            .complete(prompts::POLISH_SYSTEM, &prompts::polish_prompt(rendered))
            .await?;
        parse_reply::<PolishReply>(&reply)?.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use recipefinder_shared::Ingredient;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> GenerationConfig {
        GenerationConfig {
            base_url: format!("{}/v1/", server.uri()),
            model: "test-model".into(),
            timeout_secs: 5,
            ..GenerationConfig::default()
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    async fn reply_with(server: &MockServer, content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({ "model": "test-model", "temperature": 0.0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
            .mount(server)
            .await;
    }

    fn candidate() -> Candidate {
        Candidate {
            source_id: "abc".into(),
            locator: Some("https://www.douguo.com/cookbook/1.html".into()),
            title: "生菜鸡蛋三明治".into(),
            ingredients: vec![Ingredient {
                name: "鸡蛋".into(),
                quantity: "2个".into(),
            }],
            steps: vec!["煎蛋".into()],
        }
    }

    #[tokio::test]
    async fn interpret_parses_fenced_plan() {
        let server = MockServer::start().await;
        reply_with(
            &server,
            "```json\n{\"search_keywords\": [\"三明治\"], \"user_ingredients\": [\"生菜\"], \"recipe_count\": 2, \"other_requirements\": \"\"}\n```",
        )
        .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "test-key").unwrap();
        let plan = client.interpret("两份三明治，我有生菜").await.unwrap();

        assert_eq!(plan.search_keywords, vec!["三明治".to_string()]);
        assert_eq!(plan.recipe_count, 2);
    }

    #[tokio::test]
    async fn judge_returns_verdict() {
        let server = MockServer::start().await;
        reply_with(&server, r#"{"decision": true, "score": 8, "reasoning": "uses eggs"}"#).await;

        let client = ChatCompletionsClient::new(&config_for(&server), "test-key").unwrap();
        let profile = RequirementProfile::new(vec!["鸡蛋".into()], "", 1);
        let verdict = client.judge(&profile, &candidate()).await.unwrap();

        assert!(verdict.accept);
        assert_eq!(verdict.score, 8);
        assert_eq!(verdict.reason, "uses eggs");
    }

    #[tokio::test]
    async fn judge_rejects_out_of_range_score() {
        let server = MockServer::start().await;
        reply_with(&server, r#"{"decision": true, "score": 42, "reasoning": ""}"#).await;

        let client = ChatCompletionsClient::new(&config_for(&server), "test-key").unwrap();
        let profile = RequirementProfile::new(Vec::<String>::new(), "", 1);
        let err = client.judge(&profile, &candidate()).await.unwrap_err();

        assert!(matches!(err, RecipeError::Validation { .. }));
    }

    #[tokio::test]
    async fn polish_returns_text() {
        let server = MockServer::start().await;
        reply_with(&server, r#"{"text": "Here are two sandwiches you can make."}"#).await;

        let client = ChatCompletionsClient::new(&config_for(&server), "test-key").unwrap();
        let text = client.polish("### 1. Sandwich").await.unwrap();
        assert_eq!(text, "Here are two sandwiches you can make.");
    }

    #[tokio::test]
    async fn http_error_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "wrong").unwrap();
        let err = client.polish("x").await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn empty_choices_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "test-key").unwrap();
        let err = client.interpret("anything").await.unwrap_err();
        assert!(matches!(err, RecipeError::Generation(_)));
    }

    #[test]
    fn from_config_requires_key() {
        let config = GenerationConfig {
            api_key_env: "RF_TEST_MISSING_GENERATION_KEY_98765".into(),
            ..GenerationConfig::default()
        };
        assert!(ChatCompletionsClient::from_config(&config).is_err());
    }
}
