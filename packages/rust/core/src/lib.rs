//! Core pipeline orchestration and domain logic for RecipeFinder.
//!
//! This crate ties together request interpretation, document acquisition,
//! extraction, ranking and rendering into one recommendation run, streamed
//! as progress snapshots.

pub mod artifact;
pub mod pipeline;
pub mod ranker;
pub mod render;
pub mod stages;

pub use artifact::{artifact_file_name, save_markdown, save_markdown_at};
pub use pipeline::{DONE_STATUS, Pipeline, PipelineEvent, Stage, StageError, StageNotes, StageUpdate};
pub use ranker::MIN_SCORE_THRESHOLD;
pub use render::{NO_RESULTS_MESSAGE, render};
pub use stages::{PipelineOptions, recommendation_pipeline};
