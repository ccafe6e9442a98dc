//! Core domain types for a recommendation run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Requirements and documents
// ---------------------------------------------------------------------------

/// What the user has and wants, as understood from their request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementProfile {
    /// Ingredients the user already owns.
    pub owned_items: BTreeSet<String>,
    /// Remaining preferences in free text ("quick", "low fat", ...).
    pub free_text: String,
    /// How many recipes to recommend. Always at least 1.
    pub desired_count: u32,
}

impl RequirementProfile {
    /// Build a profile, clamping `desired_count` to at least 1.
    pub fn new(
        owned_items: impl IntoIterator<Item = String>,
        free_text: impl Into<String>,
        desired_count: u32,
    ) -> Self {
        Self {
            owned_items: owned_items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            free_text: free_text.into(),
            desired_count: desired_count.max(1),
        }
    }
}

/// One fetched, not yet parsed source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Stable identifier derived from the canonical locator.
    pub source_id: String,
    /// Canonical source URL.
    pub locator: String,
    /// Title as reported by the source page.
    pub title: String,
    /// Opaque markup.
    pub body: String,
}

/// A single ingredient line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: String,
}

/// A structurally parsed, not yet accepted recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    pub title: String,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<String>,
}

/// A judge's opinion on one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub accept: bool,
    /// Integer in `1..=10`.
    pub score: u8,
    pub reason: String,
}

/// A verdict tied back to the candidate it was given for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgedCandidate {
    pub source_id: String,
    pub verdict: Verdict,
}

/// A candidate selected for presentation, with the score that placed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub score: u8,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Stages and progress
// ---------------------------------------------------------------------------

/// The fixed stage vocabulary of a recommendation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Interpret,
    Acquire,
    Extract,
    Rank,
    Render,
    Polish,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interpret => "interpret",
            Self::Acquire => "acquire",
            Self::Extract => "extract",
            Self::Rank => "rank",
            Self::Render => "render",
            Self::Polish => "polish",
        }
    }

    /// Short human-readable status shown to progress consumers.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Interpret => "parsing input",
            Self::Acquire => "fetching documents",
            Self::Extract => "extracting candidates",
            Self::Rank => "scoring candidates",
            Self::Render => "formatting results",
            Self::Polish => "polishing response",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in its lifecycle a stage was when an event was logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    End,
    /// One item inside the stage was dropped; the stage carried on.
    Skipped,
    /// The run finished normally.
    Complete,
    /// The run was aborted by this stage.
    Failed,
}

/// An entry in the append-only progress log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: StageName,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProgressEvent {
    pub fn new(stage: StageName, phase: Phase) -> Self {
        Self {
            stage,
            phase,
            detail: None,
        }
    }

    pub fn with_detail(stage: StageName, phase: Phase, detail: impl Into<String>) -> Self {
        Self {
            stage,
            phase,
            detail: Some(detail.into()),
        }
    }
}

/// Category of a stage-level, run-aborting failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A field the stage needs was never produced upstream.
    MissingInput,
    /// The external collaborator could not be reached at all.
    CollaboratorUnavailable,
    /// The collaborator answered with something that failed validation.
    InvalidResponse,
}

/// Error marker set on the terminal snapshot of an aborted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub stage: StageName,
    pub kind: FailureKind,
}

impl RunFailure {
    /// Message safe to show to end users; collaborator detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        "could not produce a recommendation"
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// The record threaded through every stage of one run.
///
/// Stage outputs are `None` until the producing stage has run, so an aborted
/// run can be told apart from one that produced empty collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: RunId,
    pub raw_query: String,
    pub search_terms: Vec<String>,
    pub profile: Option<RequirementProfile>,
    pub raw_documents: Option<Vec<RawDocument>>,
    pub candidates: Option<Vec<Candidate>>,
    pub accepted: Option<Vec<RankedCandidate>>,
    pub verdicts: Vec<JudgedCandidate>,
    pub rendered_output: Option<String>,
    pub polished_output: Option<String>,
    pub failure: Option<RunFailure>,
    progress_log: Vec<ProgressEvent>,
}

impl PipelineState {
    /// Fresh state for one invocation.
    pub fn new(raw_query: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            raw_query: raw_query.into(),
            search_terms: Vec::new(),
            profile: None,
            raw_documents: None,
            candidates: None,
            accepted: None,
            verdicts: Vec::new(),
            rendered_output: None,
            polished_output: None,
            failure: None,
            progress_log: Vec::new(),
        }
    }

    /// Append to the progress log. There is no way to remove entries.
    pub fn record(&mut self, event: ProgressEvent) {
        self.progress_log.push(event);
    }

    pub fn progress_log(&self) -> &[ProgressEvent] {
        &self.progress_log
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.as_ref().map_or(0, Vec::len)
    }

    /// The text to show the user: polished if available, else rendered.
    pub fn display_text(&self) -> Option<&str> {
        self.polished_output
            .as_deref()
            .or(self.rendered_output.as_deref())
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}
