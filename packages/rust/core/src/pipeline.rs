//! Pipeline orchestrator: a fixed, ordered list of stages run over one state.
//!
//! A run is a lazy stream of [`PipelineEvent`]s. Each stage produces a start
//! event before it executes and an end event after its update is applied;
//! the last event of every run is the single terminal one. Nothing executes
//! until the stream is polled, so a consumer that stops draining early
//! commits to at most the stage already in flight.
//!
//! Stages never mutate the state. They read the current snapshot and return a
//! [`StageUpdate`], which the orchestrator applies to produce the next one.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{Instrument, info, info_span, warn};

use recipefinder_shared::{
    Candidate, FailureKind, JudgedCandidate, Phase, PipelineState, ProgressEvent, RankedCandidate,
    RawDocument, RecipeError, RequirementProfile, RunFailure, StageName,
};

// ---------------------------------------------------------------------------
// Stage contract
// ---------------------------------------------------------------------------

/// A run-aborting stage failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {detail}")]
pub struct StageError {
    pub kind: FailureKind,
    pub detail: String,
}

impl StageError {
    /// A field this stage reads was never produced upstream.
    pub fn missing_input(field: &str) -> Self {
        Self {
            kind: FailureKind::MissingInput,
            detail: format!("required input `{field}` is absent"),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::CollaboratorUnavailable,
            detail: detail.into(),
        }
    }

    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::InvalidResponse,
            detail: detail.into(),
        }
    }

    /// Classify a collaborator error: transport problems mean the
    /// collaborator is unavailable, anything else is a bad response.
    pub fn from_collaborator(err: RecipeError) -> Self {
        if err.is_transport() {
            Self::unavailable(err.to_string())
        } else {
            Self::invalid_response(err.to_string())
        }
    }
}

/// Per-item notes a stage collects while looping over a collection.
///
/// Each note becomes a `skipped` entry in the progress log.
#[derive(Debug, Default)]
pub struct StageNotes {
    skipped: Vec<String>,
}

impl StageNotes {
    pub fn skip(&mut self, detail: impl Into<String>) {
        self.skipped.push(detail.into());
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }
}

/// The fields one stage produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StageUpdate {
    Plan {
        search_terms: Vec<String>,
        profile: RequirementProfile,
    },
    Documents(Vec<RawDocument>),
    Candidates(Vec<Candidate>),
    Ranked {
        accepted: Vec<RankedCandidate>,
        verdicts: Vec<JudgedCandidate>,
    },
    Rendered(Option<String>),
    Polished(Option<String>),
}

impl StageUpdate {
    /// Short summary recorded with the stage's end event.
    fn summary(&self) -> String {
        match self {
            Self::Plan { search_terms, profile } => format!(
                "terms: {}; wanted: {}",
                search_terms.join(", "),
                profile.desired_count
            ),
            Self::Documents(docs) => format!("{} documents", docs.len()),
            Self::Candidates(candidates) => format!("{} candidates", candidates.len()),
            Self::Ranked { accepted, verdicts } => {
                format!("{} accepted of {} judged", accepted.len(), verdicts.len())
            }
            Self::Rendered(Some(_)) => "rendered".into(),
            Self::Rendered(None) => "no results".into(),
            Self::Polished(Some(_)) => "polished".into(),
            Self::Polished(None) => "nothing to polish".into(),
        }
    }

    fn apply(self, state: &mut PipelineState) {
        match self {
            Self::Plan { search_terms, profile } => {
                state.search_terms = search_terms;
                state.profile = Some(profile);
            }
            Self::Documents(docs) => state.raw_documents = Some(docs),
            Self::Candidates(candidates) => state.candidates = Some(candidates),
            Self::Ranked { accepted, verdicts } => {
                state.accepted = Some(accepted);
                state.verdicts = verdicts;
            }
            Self::Rendered(text) => state.rendered_output = text,
            Self::Polished(text) => state.polished_output = text,
        }
    }
}

/// One named transformation step.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    /// Compute this stage's update from the current snapshot.
    ///
    /// Per-item failures go into `notes`; only stage-level failures are `Err`.
    async fn execute(
        &self,
        state: &PipelineState,
        notes: &mut StageNotes,
    ) -> Result<StageUpdate, StageError>;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A snapshot handed to the consumer.
#[derive(Debug, Clone)]
pub struct PipelineEvent {
    pub state: Arc<PipelineState>,
    pub terminal: bool,
    /// Status string of the stage that produced the event; for terminal
    /// events, `"done"` or the generic failure message.
    pub status: &'static str,
}

/// Terminal status of a run that completed normally.
pub const DONE_STATUS: &str = "done";

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Where a run is between two emitted events.
enum Cursor {
    /// About to record the start of stage `i` (or finish, past the end).
    Before(usize),
    /// Stage `i` has been announced and runs next.
    Execute(usize),
}

struct Run {
    state: Arc<PipelineState>,
    cursor: Cursor,
}

/// A straight-line pipeline over a stage list fixed at construction.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the pipeline as a progress stream.
    ///
    /// Every item is a snapshot; exactly one, the last, has `terminal = true`.
    pub fn run(&self, initial: PipelineState) -> BoxStream<'_, PipelineEvent> {
        let run = Run {
            state: Arc::new(initial),
            cursor: Cursor::Before(0),
        };

        stream::unfold(Some(run), move |run| async move {
            let (event, next) = self.step(run?).await;
            Some((event, next))
        })
        .boxed()
    }

    /// Run the pipeline and return only the terminal snapshot.
    pub async fn invoke(&self, initial: PipelineState) -> Arc<PipelineState> {
        let mut run = Run {
            state: Arc::new(initial),
            cursor: Cursor::Before(0),
        };

        loop {
            let (event, next) = self.step(run).await;
            match next {
                Some(continuation) if !event.terminal => run = continuation,
                _ => return event.state,
            }
        }
    }

    /// Advance a run by exactly one event. Returns `None` as the
    /// continuation once the terminal event has been produced.
    async fn step(&self, run: Run) -> (PipelineEvent, Option<Run>) {
        let Run { mut state, cursor } = run;

        match cursor {
            Cursor::Before(i) => match self.stages.get(i) {
                Some(stage) => {
                    let name = stage.name();
                    Arc::make_mut(&mut state).record(ProgressEvent::new(name, Phase::Start));
                    let event = progress_event(&state, name.status());
                    (event, Some(Run { state, cursor: Cursor::Execute(i) }))
                }
                None => {
                    if let Some(last) = self.stages.last() {
                        Arc::make_mut(&mut state)
                            .record(ProgressEvent::new(last.name(), Phase::Complete));
                    }
                    info!(
                        run_id = %state.run_id,
                        accepted = state.accepted_count(),
                        "run complete"
                    );
                    (terminal_event(state, DONE_STATUS), None)
                }
            },
            Cursor::Execute(i) => {
                let stage = &self.stages[i];
                let name = stage.name();
                let span = info_span!("stage", run_id = %state.run_id, stage = %name);

                let mut notes = StageNotes::default();
                let outcome = stage.execute(&state, &mut notes).instrument(span).await;

                let next = Arc::make_mut(&mut state);
                for detail in notes.skipped {
                    next.record(ProgressEvent::with_detail(name, Phase::Skipped, detail));
                }

                match outcome {
                    Ok(update) => {
                        let summary = update.summary();
                        update.apply(next);
                        next.record(ProgressEvent::with_detail(name, Phase::End, summary));
                        let event = progress_event(&state, name.status());
                        (event, Some(Run { state, cursor: Cursor::Before(i + 1) }))
                    }
                    Err(err) => {
                        warn!(run_id = %next.run_id, stage = %name, error = %err, "stage failed, aborting run");
                        let failure = RunFailure { stage: name, kind: err.kind };
                        next.rendered_output = None;
                        next.polished_output = None;
                        next.failure = Some(failure);
                        next.record(ProgressEvent::with_detail(name, Phase::Failed, err.detail));
                        (terminal_event(state, failure.user_message()), None)
                    }
                }
            }
        }
    }
}

fn progress_event(state: &Arc<PipelineState>, status: &'static str) -> PipelineEvent {
    PipelineEvent {
        state: Arc::clone(state),
        terminal: false,
        status,
    }
}

fn terminal_event(state: Arc<PipelineState>, status: &'static str) -> PipelineEvent {
    PipelineEvent {
        state,
        terminal: true,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes a fixed update, optionally failing instead.
    struct FixedStage {
        name: StageName,
        update: Option<StageUpdate>,
        skips: Vec<&'static str>,
        calls: Arc<AtomicUsize>,
    }

    impl FixedStage {
        fn ok(name: StageName, update: StageUpdate) -> Box<dyn Stage> {
            Box::new(Self {
                name,
                update: Some(update),
                skips: vec![],
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn failing(name: StageName) -> Box<dyn Stage> {
            Box::new(Self {
                name,
                update: None,
                skips: vec![],
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    #[async_trait]
    impl Stage for FixedStage {
        fn name(&self) -> StageName {
            self.name
        }

        async fn execute(
            &self,
            _state: &PipelineState,
            notes: &mut StageNotes,
        ) -> Result<StageUpdate, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for skip in &self.skips {
                notes.skip(*skip);
            }
            self.update
                .clone()
                .ok_or_else(|| StageError::unavailable("collaborator down"))
        }
    }

    fn plan() -> StageUpdate {
        StageUpdate::Plan {
            search_terms: vec!["egg".into()],
            profile: RequirementProfile::new(vec!["egg".to_string()], "", 1),
        }
    }

    #[tokio::test]
    async fn events_bracket_each_stage() {
        let pipeline = Pipeline::new(vec![
            FixedStage::ok(StageName::Interpret, plan()),
            FixedStage::ok(StageName::Acquire, StageUpdate::Documents(vec![])),
        ]);

        let events: Vec<PipelineEvent> = pipeline.run(PipelineState::new("q")).collect().await;

        let statuses: Vec<&str> = events.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec!["parsing input", "parsing input", "fetching documents", "fetching documents", "done"]
        );
        assert_eq!(events.iter().filter(|e| e.terminal).count(), 1);
        assert!(events.last().unwrap().terminal);

        let lens: Vec<usize> = events.iter().map(|e| e.state.progress_log().len()).collect();
        assert!(lens.windows(2).all(|w| w[0] < w[1]));

        let last = &events.last().unwrap().state;
        let phases: Vec<Phase> = last.progress_log().iter().map(|p| p.phase).collect();
        assert_eq!(
            phases,
            vec![Phase::Start, Phase::End, Phase::Start, Phase::End, Phase::Complete]
        );
        assert_eq!(last.raw_documents, Some(vec![]));
    }

    #[tokio::test]
    async fn earlier_snapshots_are_not_aliased() {
        let pipeline = Pipeline::new(vec![FixedStage::ok(StageName::Interpret, plan())]);
        let events: Vec<PipelineEvent> = pipeline.run(PipelineState::new("q")).collect().await;

        assert!(events[0].state.profile.is_none());
        assert_eq!(events[0].state.progress_log().len(), 1);
        assert!(events[1].state.profile.is_some());
    }

    #[tokio::test]
    async fn failure_ends_run_on_next_event() {
        let pipeline = Pipeline::new(vec![
            FixedStage::ok(StageName::Interpret, plan()),
            FixedStage::failing(StageName::Acquire),
            FixedStage::ok(StageName::Render, StageUpdate::Rendered(Some("x".into()))),
        ]);

        let events: Vec<PipelineEvent> = pipeline.run(PipelineState::new("q")).collect().await;

        assert_eq!(events.len(), 4);
        assert_eq!(events[2].status, "fetching documents");
        assert!(!events[2].terminal);

        let terminal = &events[3];
        assert!(terminal.terminal);
        assert_eq!(terminal.status, "could not produce a recommendation");
        assert_eq!(
            terminal.state.failure,
            Some(RunFailure {
                stage: StageName::Acquire,
                kind: FailureKind::CollaboratorUnavailable,
            })
        );
        assert!(terminal.state.rendered_output.is_none());
        assert!(terminal.state.raw_documents.is_none());
        assert_eq!(
            terminal.state.progress_log().last().map(|p| p.phase),
            Some(Phase::Failed)
        );
    }

    #[tokio::test]
    async fn skipped_items_are_logged_before_end() {
        let stage = FixedStage {
            name: StageName::Extract,
            update: Some(StageUpdate::Candidates(vec![])),
            skips: vec!["doc-1: empty body", "doc-2: no recipe"],
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let pipeline = Pipeline::new(vec![Box::new(stage)]);

        let state = pipeline.invoke(PipelineState::new("q")).await;
        let phases: Vec<Phase> = state.progress_log().iter().map(|p| p.phase).collect();
        assert_eq!(
            phases,
            vec![Phase::Start, Phase::Skipped, Phase::Skipped, Phase::End, Phase::Complete]
        );
        assert_eq!(
            state.progress_log()[1].detail.as_deref(),
            Some("doc-1: empty body")
        );
    }

    #[tokio::test]
    async fn invoke_matches_stream_terminal() {
        let pipeline = Pipeline::new(vec![
            FixedStage::ok(StageName::Interpret, plan()),
            FixedStage::ok(StageName::Render, StageUpdate::Rendered(Some("text".into()))),
        ]);

        let streamed = pipeline
            .run(PipelineState::new("q"))
            .filter(|e| futures::future::ready(e.terminal))
            .collect::<Vec<_>>()
            .await;
        let invoked = pipeline.invoke(PipelineState::new("q")).await;

        assert_eq!(streamed.len(), 1);
        assert_eq!(streamed[0].state.rendered_output, invoked.rendered_output);
        assert_eq!(
            streamed[0].state.progress_log(),
            invoked.progress_log()
        );
    }

    #[tokio::test]
    async fn abandoned_stream_runs_no_further_stages() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(vec![
            Box::new(FixedStage {
                name: StageName::Interpret,
                update: Some(plan()),
                skips: vec![],
                calls: first_calls.clone(),
            }),
            Box::new(FixedStage {
                name: StageName::Acquire,
                update: Some(StageUpdate::Documents(vec![])),
                skips: vec![],
                calls: second_calls.clone(),
            }),
        ]);

        // start + end of the first stage only
        let taken: Vec<PipelineEvent> = pipeline.run(PipelineState::new("q")).take(2).collect().await;

        assert_eq!(taken.len(), 2);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_pipeline_still_terminates() {
        let pipeline = Pipeline::new(vec![]);
        let events: Vec<PipelineEvent> = pipeline.run(PipelineState::new("q")).collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].terminal);
    }

    #[test]
    fn collaborator_errors_are_classified() {
        let unavailable = StageError::from_collaborator(RecipeError::Network("refused".into()));
        assert_eq!(unavailable.kind, FailureKind::CollaboratorUnavailable);

        let invalid = StageError::from_collaborator(RecipeError::validation("score 11"));
        assert_eq!(invalid.kind, FailureKind::InvalidResponse);
    }
}
