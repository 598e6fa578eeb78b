//! Bounded retry rounds over the transiently failing items of one batch.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::progress::ProgressUnit;
use super::unit::{verify_items, UnitContext};
use crate::core::models::ResultRow;

/// Items flagged for retry, keyed by batch slot, valued by absolute index.
#[derive(Debug, Default)]
pub struct RetryState {
    pending: Mutex<BTreeMap<usize, usize>>,
    frozen: BTreeMap<usize, usize>,
}

impl RetryState {
    /// Flags an item completed in the current pass.
    pub fn add(&self, slot: usize, idx: usize) {
        self.pending.lock().insert(slot, idx);
    }

    /// Moves everything flagged so far into the set the next round works on.
    /// Returns `false` when nothing was flagged.
    pub fn advance_round(&mut self) -> bool {
        self.frozen = mem::take(self.pending.get_mut());
        !self.frozen.is_empty()
    }

    pub fn frozen(&self) -> &BTreeMap<usize, usize> {
        &self.frozen
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub rounds: usize,
    pub delay: Duration,
}

/// Runs the main pass over `rows` and then up to `policy.rounds` retry
/// rounds. Each round appends its own progress unit to `units`.
pub(crate) async fn verify_with_retries(
    ctx: &UnitContext<'_>,
    start: usize,
    rows: &mut [ResultRow],
    policy: RetryPolicy,
    units: &RwLock<Vec<Arc<ProgressUnit>>>,
    main: Arc<ProgressUnit>,
) {
    let mut state = RetryState::default();
    let items: Vec<(usize, usize)> = (0..rows.len()).map(|slot| (slot, start + slot)).collect();
    verify_items(ctx, items, &main, &state, policy.rounds == 0, rows).await;

    let mut current = main;
    if !state.advance_round() {
        ctx.reporter.emit("after-all-retries", &current.snapshot());
        return;
    }

    for round in 0..policy.rounds {
        ctx.reporter.emit("retry-delay", &current.snapshot());
        sleep(policy.delay).await;

        let unit = Arc::new(ProgressUnit::new(state.frozen().len()));
        units.write().push(unit.clone());
        ctx.reporter.emit("retry-begin", &unit.snapshot());
        tracing::debug!(target: "retry", "[job {}] retry round {} over {} items", ctx.job_id, round + 1, state.frozen().len());

        let items: Vec<(usize, usize)> = state.frozen().iter().map(|(&s, &i)| (s, i)).collect();
        let last_round = round + 1 == policy.rounds;
        verify_items(ctx, items, &unit, &state, last_round, rows).await;

        current = unit;
        if !state.advance_round() {
            break;
        }
    }

    ctx.reporter.emit("after-all-retries", &current.snapshot());
}
