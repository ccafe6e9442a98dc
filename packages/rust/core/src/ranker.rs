//! Candidate selection over judge verdicts.
//!
//! The ranker never scores anything itself. It filters candidates by their
//! verdicts, orders the survivors and keeps the first `desired_count`.

use tracing::debug;

use recipefinder_shared::{Candidate, RankedCandidate, Verdict};

/// Lowest judge score a candidate may have and still be accepted.
pub const MIN_SCORE_THRESHOLD: u8 = 6;

/// Select the accepted set.
///
/// `judged` is in candidate order; `None` means the judge call failed and the
/// candidate is ineligible. Eligible means `accept && score >= 6`. Survivors
/// are sorted by score descending with a stable sort, so earlier candidates
/// win ties, then truncated to `desired_count`.
pub fn select(judged: Vec<(Candidate, Option<Verdict>)>, desired_count: u32) -> Vec<RankedCandidate> {
    let total = judged.len();

    let mut eligible: Vec<RankedCandidate> = judged
        .into_iter()
        .filter_map(|(candidate, verdict)| {
            let verdict = verdict?;
            (verdict.accept && verdict.score >= MIN_SCORE_THRESHOLD).then(|| RankedCandidate {
                candidate,
                score: verdict.score,
                reason: verdict.reason,
            })
        })
        .collect();

    let eligible_count = eligible.len();
    eligible.sort_by(|a, b| b.score.cmp(&a.score));
    eligible.truncate(desired_count as usize);

    debug!(
        total,
        eligible = eligible_count,
        accepted = eligible.len(),
        "selected candidates"
    );

    eligible
}
