//! Progress counters for one unit of work (a batch's main pass or one retry
//! round) and the reporter that broadcasts them.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;

use crate::channel::ChannelHandle;
use crate::core::models::ProgressSnapshot;

/// A `progress` event is broadcast every this many completions.
pub const PROGRESS_SAMPLE_EVERY: usize = 10;

/// What a single verification attempt contributed to its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
    /// Transient failure, handed to the next retry round.
    Retry,
}

/// Event sink bound to whichever connection currently watches the job.
/// Rebinding is allowed at any time; with no connection attached events are
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    channel: Arc<RwLock<Option<ChannelHandle>>>,
}

impl Reporter {
    pub fn attach(&self, handle: ChannelHandle) {
        *self.channel.write() = Some(handle);
    }

    pub fn send(&self, event: &str, payload: impl Into<String>) {
        if let Some(handle) = self.channel.read().as_ref() {
            handle.send(event, payload);
        }
    }

    pub fn emit<T: Serialize + ?Sized>(&self, event: &str, value: &T) {
        if let Some(handle) = self.channel.read().as_ref() {
            handle.emit(event, value);
        }
    }

    pub fn emit_err(&self, event: &str, msg: impl Into<String>) {
        if let Some(handle) = self.channel.read().as_ref() {
            handle.emit_err(event, msg);
        }
    }
}

#[derive(Debug)]
pub struct ProgressUnit {
    counters: Mutex<ProgressSnapshot>,
}

impl ProgressUnit {
    pub fn new(total: usize) -> Self {
        Self {
            counters: Mutex::new(ProgressSnapshot {
                total,
                ..Default::default()
            }),
        }
    }

    /// Counts one completed attempt and broadcasts a sampled snapshot.
    ///
    /// Success and failure are final outcomes; a retry only advances
    /// `progress` and `retry`, the item is counted again in the unit of the
    /// round that settles it.
    pub fn record(&self, outcome: Outcome, reporter: &Reporter) {
        let mut c = self.counters.lock();
        c.progress += 1;
        match outcome {
            Outcome::Success => c.success += 1,
            Outcome::Failed => c.failed += 1,
            Outcome::Retry => c.retry += 1,
        }
        if c.progress != 0 && c.progress % PROGRESS_SAMPLE_EVERY == 0 {
            reporter.emit("progress", &*c);
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.counters.lock()
    }
}
