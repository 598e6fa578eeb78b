//! Concurrent fan-out of one verification per item, joined before returning.

use futures::stream::{self, StreamExt};

use super::progress::{Outcome, ProgressUnit, Reporter};
use super::retry::RetryState;
use crate::core::models::{JobId, ResultRow};
use crate::verification::{FailureClass, VerificationCapability};

pub(crate) const EMPTY_ADDRESS_MSG: &str = "empty address";
pub(crate) const INVALID_SYNTAX_MSG: &str = "invalid syntax";
pub(crate) const NO_RESULT_MSG: &str = "probe returned no result";

/// Everything a verification task needs that stays fixed for a batch.
pub(crate) struct UnitContext<'a> {
    pub job_id: JobId,
    pub addresses: &'a [String],
    pub capability: &'a dyn VerificationCapability,
    /// Proxy for the whole batch, retries included.
    pub proxy: Option<&'a str>,
    pub reporter: &'a Reporter,
    pub max_concurrency: Option<usize>,
}

/// Verifies every `(slot, absolute index)` pair concurrently and writes each
/// result into `rows[slot]`. Returns once all of them have finished.
pub(crate) async fn verify_items(
    ctx: &UnitContext<'_>,
    items: Vec<(usize, usize)>,
    unit: &ProgressUnit,
    retry: &RetryState,
    final_attempt: bool,
    rows: &mut [ResultRow],
) {
    let width = ctx
        .max_concurrency
        .map_or(items.len(), |max| max.min(items.len()))
        .max(1);

    let finished: Vec<(usize, ResultRow)> = stream::iter(items)
        .map(|(slot, idx)| async move {
            let row = verify_one(ctx, slot, idx, unit, retry, final_attempt).await;
            (slot, row)
        })
        .buffer_unordered(width)
        .collect()
        .await;

    for (slot, row) in finished {
        rows[slot] = row;
    }
}

async fn verify_one(
    ctx: &UnitContext<'_>,
    slot: usize,
    idx: usize,
    unit: &ProgressUnit,
    retry: &RetryState,
    final_attempt: bool,
) -> ResultRow {
    let address = ctx.addresses[idx].as_str();
    let mut row = ResultRow::new(ctx.job_id, address);

    let trimmed = address.trim();
    if trimmed.is_empty() {
        row.error_msg = Some(EMPTY_ADDRESS_MSG.to_string());
        return row;
    }

    let outcome = match ctx.capability.verify(trimmed, ctx.proxy).await {
        Ok(Some(res)) => {
            row.is_valid_syntax = res.syntax_valid;
            row.has_mx_records = res.has_mx_records;
            if !res.syntax_valid {
                row.error_msg = Some(INVALID_SYNTAX_MSG.to_string());
                Outcome::Failed
            } else {
                row.reachable = res.reachable;
                row.is_deliverable = res.deliverable;
                row.is_host_exists = res.host_exists;
                row.is_disposable = res.disposable;
                row.is_catch_all = res.catch_all;
                row.is_inbox_full = res.inbox_full;
                Outcome::Success
            }
        }
        Ok(None) => {
            row.is_host_exists = false;
            row.error_msg = Some(NO_RESULT_MSG.to_string());
            Outcome::Failed
        }
        Err(failure) => match failure.class() {
            FailureClass::HostNotFound => {
                row.is_valid_syntax = true;
                row.is_host_exists = false;
                row.error_msg = Some(failure.reason);
                Outcome::Failed
            }
            FailureClass::Transient if !final_attempt => {
                row.is_valid_syntax = true;
                retry.add(slot, idx);
                Outcome::Retry
            }
            FailureClass::Transient => {
                row.is_valid_syntax = true;
                row.error_msg = Some(failure.reason);
                Outcome::Failed
            }
            FailureClass::Unclassified => {
                row.error_msg = Some(failure.reason);
                Outcome::Failed
            }
        },
    };

    tracing::trace!(target: "verify", "[job {}] {} -> {:?}", ctx.job_id, trimmed, outcome);
    unit.record(outcome, ctx.reporter);
    row
}
