//! Splits a job's address list into batches and drives them one at a time.

use std::ops::Range;
use std::sync::Arc;
use tokio::time::sleep;

use super::progress::ProgressUnit;
use super::retry::{verify_with_retries, RetryPolicy};
use super::unit::UnitContext;
use super::verifier::Verifier;
use crate::core::error::{AppError, Result};
use crate::core::models::ResultRow;

/// Consecutive `[from, to)` ranges of at most `batch_size` items.
pub fn plan_batches(total: usize, batch_size: usize) -> Vec<Range<usize>> {
    if batch_size == 0 {
        return Vec::new();
    }
    (0..total)
        .step_by(batch_size)
        .map(|from| from..(from + batch_size).min(total))
        .collect()
}

impl Verifier {
    pub(super) async fn run_batches(&self, addresses: &[String]) -> Result<()> {
        let batches = plan_batches(addresses.len(), self.settings.batch_size);
        let last = batches.len().saturating_sub(1);
        tracing::debug!(target: "scheduler", "[job {}] {} addresses in {} batches", self.job_id, addresses.len(), batches.len());

        for (n, range) in batches.into_iter().enumerate() {
            self.run_batch(addresses, n, range).await?;

            if n < last {
                self.reporter.send("batch-delay", "");
                sleep(self.settings.delay()).await;
                let mut p = self.progress.lock();
                p.rotator.advance();
                p.current_batch_number += 1;
            }
        }
        Ok(())
    }

    async fn run_batch(&self, addresses: &[String], n: usize, range: Range<usize>) -> Result<()> {
        let len = range.len();
        let proxy = {
            let mut p = self.progress.lock();
            p.current_batch_number = n;
            p.current_batch_size = len;
            p.rotator.current().map(str::to_owned)
        };

        let main = Arc::new(ProgressUnit::new(len));
        *self.current_units.write() = vec![main.clone()];
        self.reporter.send("batch-start", n.to_string());
        tracing::info!(target: "scheduler", "[job {}] batch {} started ({} items, proxy {:?})", self.job_id, n, len, proxy);

        let mut rows = vec![ResultRow::default(); len];
        let ctx = UnitContext {
            job_id: self.job_id,
            addresses,
            capability: self.backends.capability.as_ref(),
            proxy: proxy.as_deref(),
            reporter: &self.reporter,
            max_concurrency: self.backends.max_concurrency,
        };
        let policy = RetryPolicy {
            rounds: self.settings.retry_count,
            delay: self.settings.delay(),
        };
        verify_with_retries(&ctx, range.start, &mut rows, policy, &self.current_units, main).await;

        self.reporter.send("update-db-start", "");
        self.backends
            .sink
            .commit(self.job_id, n, &rows)
            .await
            .map_err(|e| {
                tracing::error!(target: "scheduler", "[job {}] batch {} commit failed: {}", self.job_id, n, e);
                AppError::Persistence {
                    job_id: self.job_id,
                    batch: n,
                    message: e.to_string(),
                }
            })?;
        self.reporter.send("update-db-done", "");

        let frozen = self
            .current_units
            .read()
            .iter()
            .map(|u| u.snapshot())
            .collect();
        self.progress.lock().completed_batches.insert(n, frozen);
        Ok(())
    }
}
