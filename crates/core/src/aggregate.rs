//! Result aggregation
//!
//! Flattening per-item outcomes into one composite [`PushResult`] is a pure
//! fold with a fixed dominance order. Every flush path and every direct call
//! goes through the same function so callers always observe the same result
//! shape.

use roamsync_domain::{ItemOutcome, ItemVerdict, PartnerOutcome, PushFailure, PushResult, PushSource};

/// Fold per-item outcomes into one composite result.
///
/// Dominance: AdminDown > Error > Success > NoOperation. An empty input
/// flattens to NoOperation. Warnings are unioned across all items, including
/// accepted ones.
pub fn flatten(source: PushSource, outcomes: &[ItemOutcome], runtime_ms: u64) -> PushResult {
    if outcomes.is_empty() {
        return PushResult::no_operation(source);
    }

    let mut failed: Vec<PushFailure> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut admin_down = false;

    for outcome in outcomes {
        warnings.extend(outcome.warnings.iter().cloned());
        match &outcome.verdict {
            ItemVerdict::Accepted => {}
            ItemVerdict::Rejected { message }
            | ItemVerdict::Failed { message }
            | ItemVerdict::Invalid { message } => {
                failed.push(PushFailure::new(&outcome.item, message));
            }
            ItemVerdict::AdminDown => admin_down = true,
        }
    }

    if admin_down {
        return PushResult::admin_down(source);
    }
    if !failed.is_empty() {
        return PushResult::error(source, failed, warnings, runtime_ms);
    }
    PushResult::success(source, warnings, runtime_ms)
}

/// Lift a single-call partner envelope into an item outcome so single-entity
/// calls flatten identically to batches.
pub fn item_from_partner(item: impl Into<String>, outcome: &PartnerOutcome) -> ItemOutcome {
    let mut mapped = if outcome.accepted {
        ItemOutcome::accepted(item)
    } else {
        ItemOutcome::rejected(item, outcome.describe())
    };
    mapped.warnings.extend(outcome.warnings.iter().cloned());
    mapped
}
