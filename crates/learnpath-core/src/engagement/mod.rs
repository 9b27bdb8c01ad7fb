//! Focused time-on-task tracking.
//!
//! [`EngagementTracker`] counts focused ticks for one (student, content) pair.
//! [`StudySession`] owns the tracker for whatever the student has open and
//! drives it from a [`crate::clock::Scheduler`].
//!
//! Writes leave through a [`ProgressSink`] and are never awaited.

mod session;
mod tracker;

pub use session::StudySession;
pub use tracker::EngagementTracker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::ContentProgress;

/// One persistence request emitted by a tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressWrite {
    pub student_id: String,
    pub content_id: String,
    pub engaged_seconds: u64,
    pub is_completed: bool,
    pub forced: bool,
    pub at: DateTime<Utc>,
}

impl ProgressWrite {
    pub fn to_progress(&self) -> ContentProgress {
        ContentProgress {
            student_id: self.student_id.clone(),
            content_id: self.content_id.clone(),
            engaged_seconds: self.engaged_seconds,
            is_completed: self.is_completed,
            updated_at: self.at,
        }
    }
}

/// Fire-and-forget destination for progress writes.
pub trait ProgressSink {
    fn submit(&mut self, write: ProgressWrite);
}

impl ProgressSink for Vec<ProgressWrite> {
    fn submit(&mut self, write: ProgressWrite) {
        self.push(write);
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn submit(&mut self, write: ProgressWrite) {
        (**self).submit(write);
    }
}
