//! Non-blocking progress writes.
//!
//! Trackers push into a [`QueueSink`] and move on. A single writer task drains
//! the channel and applies each write; a failed write is logged and dropped,
//! and the next autosave carries the same (or a larger) counter anyway.

use tokio::sync::mpsc;

use crate::engagement::{ProgressSink, ProgressWrite};
use crate::error::Result;
use crate::progress::MergeOutcome;

/// Producer half of the progress queue.
#[derive(Debug, Clone)]
pub struct QueueSink {
    tx: mpsc::UnboundedSender<ProgressWrite>,
}

impl QueueSink {
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl ProgressSink for QueueSink {
    fn submit(&mut self, write: ProgressWrite) {
        if let Err(mpsc::error::SendError(write)) = self.tx.send(write) {
            tracing::warn!(
                student_id = %write.student_id,
                content_id = %write.content_id,
                engaged_seconds = write.engaged_seconds,
                "progress queue closed; write dropped"
            );
        }
    }
}

pub fn progress_queue() -> (QueueSink, mpsc::UnboundedReceiver<ProgressWrite>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueSink { tx }, rx)
}

/// Tally returned when the writer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub applied: u64,
    pub stale: u64,
    pub failed: u64,
}

/// Drain `rx` until every sender is gone, handing each write to `apply`.
pub async fn run_writer<F>(mut rx: mpsc::UnboundedReceiver<ProgressWrite>, mut apply: F) -> WriterStats
where
    F: FnMut(&ProgressWrite) -> Result<MergeOutcome>,
{
    let mut stats = WriterStats::default();
    while let Some(write) = rx.recv().await {
        match apply(&write) {
            Ok(MergeOutcome::StaleIgnored) => stats.stale += 1,
            Ok(_) => stats.applied += 1,
            Err(e) => {
                stats.failed += 1;
                if e.is_transient() {
                    tracing::warn!(
                        error = %e,
                        content_id = %write.content_id,
                        engaged_seconds = write.engaged_seconds,
                        "transient progress write failure; next autosave retries"
                    );
                } else {
                    tracing::error!(
                        error = %e,
                        content_id = %write.content_id,
                        "progress write rejected"
                    );
                }
            }
        }
    }
    tracing::debug!(?stats, "progress writer stopped");
    stats
}
