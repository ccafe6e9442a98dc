//! The recommendation stages and the pipeline that strings them together.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use recipefinder_acquisition::DocumentSource;
use recipefinder_extractor::Extractor;
use recipefinder_generation::GenerationService;
use recipefinder_shared::{AppConfig, JudgedCandidate, PipelineState, StageName};

use crate::pipeline::{Pipeline, Stage, StageError, StageNotes, StageUpdate};
use crate::{ranker, render};

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Knobs fixed when the pipeline is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Documents requested per desired recipe.
    pub fetch_multiplier: u32,
    /// Include the polish stage.
    pub polish: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            fetch_multiplier: 5,
            polish: true,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            fetch_multiplier: config.acquisition.fetch_multiplier.max(1),
            polish: config.output.polish,
        }
    }
}

/// Build the interpret → acquire → extract → rank → render [→ polish] pipeline.
pub fn recommendation_pipeline(
    generation: Arc<dyn GenerationService>,
    source: Arc<dyn DocumentSource>,
    options: PipelineOptions,
) -> Pipeline {
    let mut stages: Vec<Box<dyn Stage>> = vec![
        Box::new(InterpretStage {
            generation: generation.clone(),
        }),
        Box::new(AcquireStage {
            source,
            fetch_multiplier: options.fetch_multiplier,
        }),
        Box::new(ExtractStage {
            extractor: Extractor::new(),
        }),
        Box::new(RankStage {
            generation: generation.clone(),
        }),
        Box::new(RenderStage),
    ];

    if options.polish {
        stages.push(Box::new(PolishStage { generation }));
    }

    Pipeline::new(stages)
}

// ---------------------------------------------------------------------------
// Interpret
// ---------------------------------------------------------------------------

pub struct InterpretStage {
    generation: Arc<dyn GenerationService>,
}

#[async_trait]
impl Stage for InterpretStage {
    fn name(&self) -> StageName {
        StageName::Interpret
    }

    async fn execute(
        &self,
        state: &PipelineState,
        _notes: &mut StageNotes,
    ) -> Result<StageUpdate, StageError> {
        if state.raw_query.trim().is_empty() {
            return Err(StageError::missing_input("raw_query"));
        }

        let plan = self
            .generation
            .interpret(&state.raw_query)
            .await
            .map_err(StageError::from_collaborator)?;

        let (search_terms, profile) = plan.into_parts();
        info!(
            terms = ?search_terms,
            owned = profile.owned_items.len(),
            desired = profile.desired_count,
            "interpreted request"
        );

        Ok(StageUpdate::Plan {
            search_terms,
            profile,
        })
    }
}

// ---------------------------------------------------------------------------
// Acquire
// ---------------------------------------------------------------------------

pub struct AcquireStage {
    source: Arc<dyn DocumentSource>,
    fetch_multiplier: u32,
}

#[async_trait]
impl Stage for AcquireStage {
    fn name(&self) -> StageName {
        StageName::Acquire
    }

    async fn execute(
        &self,
        state: &PipelineState,
        notes: &mut StageNotes,
    ) -> Result<StageUpdate, StageError> {
        let profile = state
            .profile
            .as_ref()
            .ok_or_else(|| StageError::missing_input("requirement profile"))?;
        if state.search_terms.iter().all(|t| t.trim().is_empty()) {
            return Err(StageError::missing_input("search terms"));
        }

        let limit = profile.desired_count as usize * self.fetch_multiplier.max(1) as usize;

        // Whole-batch failure means the collaborator is unusable, whatever the cause.
        let outcome = self
            .source
            .fetch(&state.search_terms, limit)
            .await
            .map_err(|e| StageError::unavailable(e.to_string()))?;

        for item in outcome.skipped {
            notes.skip(format!("{}: {}", item.locator, item.reason));
        }

        let mut seen = HashSet::new();
        let mut documents = Vec::with_capacity(outcome.documents.len().min(limit));
        for doc in outcome.documents {
            if documents.len() >= limit {
                break;
            }
            if !seen.insert(doc.source_id.clone()) {
                debug!(source_id = %doc.source_id, "duplicate document dropped");
                continue;
            }
            documents.push(doc);
        }

        info!(fetched = documents.len(), limit, "acquired documents");
        Ok(StageUpdate::Documents(documents))
    }
}

// ---------------------------------------------------------------------------
// Extract
// ---------------------------------------------------------------------------

pub struct ExtractStage {
    extractor: Extractor,
}

#[async_trait]
impl Stage for ExtractStage {
    fn name(&self) -> StageName {
        StageName::Extract
    }

    async fn execute(
        &self,
        state: &PipelineState,
        notes: &mut StageNotes,
    ) -> Result<StageUpdate, StageError> {
        let documents = state
            .raw_documents
            .as_ref()
            .ok_or_else(|| StageError::missing_input("raw documents"))?;

        let mut candidates = Vec::with_capacity(documents.len());
        for doc in documents {
            match self.extractor.extract(doc) {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => {
                    warn!(source_id = %doc.source_id, locator = %doc.locator, error = %e, "extraction failed, skipping document");
                    notes.skip(format!("{}: {e}", doc.source_id));
                }
            }
        }

        info!(
            documents = documents.len(),
            candidates = candidates.len(),
            "extracted candidates"
        );
        Ok(StageUpdate::Candidates(candidates))
    }
}

// ---------------------------------------------------------------------------
// Rank
// ---------------------------------------------------------------------------

pub struct RankStage {
    generation: Arc<dyn GenerationService>,
}

#[async_trait]
impl Stage for RankStage {
    fn name(&self) -> StageName {
        StageName::Rank
    }

    async fn execute(
        &self,
        state: &PipelineState,
        notes: &mut StageNotes,
    ) -> Result<StageUpdate, StageError> {
        let candidates = state
            .candidates
            .as_ref()
            .ok_or_else(|| StageError::missing_input("candidates"))?;
        let profile = state
            .profile
            .as_ref()
            .ok_or_else(|| StageError::missing_input("requirement profile"))?;

        let mut judged = Vec::with_capacity(candidates.len());
        let mut verdicts = Vec::with_capacity(candidates.len());

        // One at a time, in candidate order.
        for candidate in candidates {
            match self.generation.judge(profile, candidate).await {
                Ok(verdict) => {
                    debug!(
                        source_id = %candidate.source_id,
                        accept = verdict.accept,
                        score = verdict.score,
                        "judged candidate"
                    );
                    verdicts.push(JudgedCandidate {
                        source_id: candidate.source_id.clone(),
                        verdict: verdict.clone(),
                    });
                    judged.push((candidate.clone(), Some(verdict)));
                }
                Err(e) => {
                    warn!(source_id = %candidate.source_id, error = %e, "judge failed, treating candidate as ineligible");
                    notes.skip(format!("{}: {e}", candidate.source_id));
                    judged.push((candidate.clone(), None));
                }
            }
        }

        let accepted = ranker::select(judged, profile.desired_count);
        info!(
            judged = verdicts.len(),
            accepted = accepted.len(),
            "ranked candidates"
        );

        Ok(StageUpdate::Ranked { accepted, verdicts })
    }
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

pub struct RenderStage;

#[async_trait]
impl Stage for RenderStage {
    fn name(&self) -> StageName {
        StageName::Render
    }

    async fn execute(
        &self,
        state: &PipelineState,
        _notes: &mut StageNotes,
    ) -> Result<StageUpdate, StageError> {
        let accepted = state
            .accepted
            .as_ref()
            .ok_or_else(|| StageError::missing_input("accepted"))?;

        // Rendered output exists only when something was accepted.
        if accepted.is_empty() {
            return Ok(StageUpdate::Rendered(None));
        }

        Ok(StageUpdate::Rendered(Some(render::render(accepted))))
    }
}

// ---------------------------------------------------------------------------
// Polish
// ---------------------------------------------------------------------------

pub struct PolishStage {
    generation: Arc<dyn GenerationService>,
}

#[async_trait]
impl Stage for PolishStage {
    fn name(&self) -> StageName {
        StageName::Polish
    }

    async fn execute(
        &self,
        state: &PipelineState,
        _notes: &mut StageNotes,
    ) -> Result<StageUpdate, StageError> {
        let Some(rendered) = state.rendered_output.as_deref() else {
            return Ok(StageUpdate::Polished(None));
        };

        let polished = self
            .generation
            .polish(rendered)
            .await
            .map_err(StageError::from_collaborator)?;

        Ok(StageUpdate::Polished(Some(polished)))
    }
}
