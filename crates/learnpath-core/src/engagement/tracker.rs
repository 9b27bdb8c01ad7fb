//! Engagement counter for one content item.
//!
//! ## Lifecycle
//!
//! ```text
//! select -> (tick | flush)* -> release
//! ```
//!
//! Content that is untimed or already complete is *satisfied* at selection and
//! never counts. Timed content counts one second per focused tick; the tick
//! that reaches the minimum marks it complete and forces a flush. Counting
//! continues after that so the stored time-on-task stays accurate.

use chrono::Utc;

use super::{ProgressSink, ProgressWrite};
use crate::course::Content;
use crate::error::{require_id, Result, ValidationError};
use crate::events::Event;
use crate::progress::ContentProgress;

#[derive(Debug, Clone)]
pub struct EngagementTracker {
    student_id: String,
    content_id: String,
    min_engagement_seconds: u64,
    engaged_seconds: u64,
    is_completed: bool,
    /// Satisfied before any counting happened.
    satisfied: bool,
    last_flushed: Option<u64>,
}

impl EngagementTracker {
    /// Start tracking `content` from the student's stored progress.
    ///
    /// Untimed content that has no completed record yet is persisted as
    /// complete right away.
    ///
    /// # Errors
    /// Returns a validation error for blank ids or a `prior` record that
    /// belongs to another student or content item.
    pub fn select<S: ProgressSink + ?Sized>(
        student_id: &str,
        content: &Content,
        prior: Option<&ContentProgress>,
        sink: &mut S,
    ) -> Result<(Self, Event)> {
        require_id("student_id", student_id)?;
        require_id("content_id", &content.id)?;
        if let Some(p) = prior {
            if p.student_id != student_id || p.content_id != content.id {
                return Err(ValidationError::InvalidValue {
                    field: "prior_progress".into(),
                    message: format!(
                        "record for ({}, {}) does not match ({student_id}, {})",
                        p.student_id, p.content_id, content.id
                    ),
                }
                .into());
            }
        }

        let engaged_seconds = prior.map_or(0, |p| p.engaged_seconds);
        let prior_completed = prior.is_some_and(|p| p.is_completed);
        let satisfied = prior_completed || engaged_seconds >= content.min_engagement_seconds;

        let mut tracker = Self {
            student_id: student_id.to_string(),
            content_id: content.id.clone(),
            min_engagement_seconds: content.min_engagement_seconds,
            engaged_seconds,
            is_completed: satisfied,
            satisfied,
            last_flushed: prior.map(|p| p.engaged_seconds),
        };
        if satisfied && !prior_completed {
            tracker.flush(true, sink);
        }

        tracing::debug!(
            student_id,
            content_id = %content.id,
            engaged_seconds,
            satisfied,
            "content selected"
        );
        let event = Event::ContentSelected {
            student_id: tracker.student_id.clone(),
            content_id: tracker.content_id.clone(),
            engaged_seconds,
            satisfied,
            at: Utc::now(),
        };
        Ok((tracker, event))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn engaged_seconds(&self) -> u64 {
        self.engaged_seconds
    }

    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    /// Satisfied at selection; ticks have no effect.
    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    /// Seconds still needed, zero once complete.
    pub fn remaining_seconds(&self) -> u64 {
        if self.is_completed {
            0
        } else {
            self.min_engagement_seconds.saturating_sub(self.engaged_seconds)
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Call once per tick. Returns `Some(Event::ContentCompleted)` on the tick
    /// that reaches the minimum engagement.
    pub fn tick<S: ProgressSink + ?Sized>(&mut self, focused: bool, sink: &mut S) -> Option<Event> {
        if self.satisfied || !focused {
            return None;
        }
        self.engaged_seconds += 1;
        if self.is_completed || self.engaged_seconds < self.min_engagement_seconds {
            return None;
        }

        self.is_completed = true;
        self.flush(true, sink);
        tracing::info!(
            student_id = %self.student_id,
            content_id = %self.content_id,
            engaged_seconds = self.engaged_seconds,
            "content completed"
        );
        Some(Event::ContentCompleted {
            student_id: self.student_id.clone(),
            content_id: self.content_id.clone(),
            engaged_seconds: self.engaged_seconds,
            at: Utc::now(),
        })
    }

    /// Hand the current counter to `sink`. Returns false when suppressed
    /// (nothing engaged yet and not forced).
    pub fn flush<S: ProgressSink + ?Sized>(&mut self, force: bool, sink: &mut S) -> bool {
        if self.engaged_seconds == 0 && !force {
            return false;
        }
        debug_assert!(self.last_flushed.map_or(true, |last| self.engaged_seconds >= last));
        sink.submit(ProgressWrite {
            student_id: self.student_id.clone(),
            content_id: self.content_id.clone(),
            engaged_seconds: self.engaged_seconds,
            is_completed: self.is_completed,
            forced: force,
            at: Utc::now(),
        });
        self.last_flushed = Some(self.engaged_seconds);
        true
    }

    /// Final forced flush when the student leaves this content.
    pub fn release<S: ProgressSink + ?Sized>(mut self, sink: &mut S) -> Event {
        self.flush(true, sink);
        Event::ContentReleased {
            content_id: self.content_id,
            engaged_seconds: self.engaged_seconds,
            at: Utc::now(),
        }
    }
}
