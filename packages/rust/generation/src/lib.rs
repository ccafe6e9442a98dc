//! Generation service for RecipeFinder.
//!
//! This crate provides:
//! - [`GenerationService`] — interpret / judge / polish, the three calls a run makes
//! - [`ChatCompletionsClient`] — implementation over an OpenAI-compatible endpoint
//! - [`response`] — JSON extraction and schema validation of model replies
//!
//! Model replies are untyped text. Each call has a fixed instruction template
//! and a validated response shape; anything else is an error.

pub mod client;
pub mod prompts;
pub mod response;

use async_trait::async_trait;

use recipefinder_shared::{Candidate, RequirementProfile, Result, Verdict};

pub use client::ChatCompletionsClient;
pub use response::InterpretPlan;

/// The external service that understands requests, scores recipes, and
/// rewrites the final answer.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Turn a free-form request into search terms and a requirement profile.
    async fn interpret(&self, raw_query: &str) -> Result<InterpretPlan>;

    /// Judge how well one candidate fits the profile.
    async fn judge(&self, profile: &RequirementProfile, candidate: &Candidate) -> Result<Verdict>;

    /// Rewrite rendered recipes as a conversational answer.
    async fn polish(&self, rendered: &str) -> Result<String>;
}
