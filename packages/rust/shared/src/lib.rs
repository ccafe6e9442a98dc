//! Shared types, error model, and configuration for RecipeFinder.
//!
//! This crate is the foundation depended on by all other RecipeFinder crates.
//! It provides:
//! - [`RecipeError`] — the unified error type
//! - Domain types ([`PipelineState`], [`RawDocument`], [`Candidate`], [`ProgressEvent`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AcquisitionConfig, AppConfig, GenerationConfig, OutputConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, resolve_api_key, validate_api_key,
};
pub use error::{RecipeError, Result};
pub use types::{
    Candidate, FailureKind, Ingredient, JudgedCandidate, Phase, PipelineState, ProgressEvent,
    RankedCandidate, RawDocument, RequirementProfile, RunFailure, RunId, StageName, Verdict,
};
