use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quiz::QuizMode;

/// Every state change in the engine produces an Event.
/// Callers render them or forward them to their own subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A content item became the active one for a student.
    ContentSelected {
        student_id: String,
        content_id: String,
        engaged_seconds: u64,
        /// Already satisfied at selection; no counting will happen.
        satisfied: bool,
        at: DateTime<Utc>,
    },
    /// Focused time reached the content's minimum engagement.
    ContentCompleted {
        student_id: String,
        content_id: String,
        engaged_seconds: u64,
        at: DateTime<Utc>,
    },
    /// The session stopped tracking a content item.
    ContentReleased {
        content_id: String,
        engaged_seconds: u64,
        at: DateTime<Utc>,
    },
    QuizSampled {
        attempt_id: String,
        module_id: String,
        mode: QuizMode,
        question_count: usize,
        at: DateTime<Utc>,
    },
    QuizPassed {
        student_id: String,
        module_id: String,
        score: u32,
        is_fast_tracked: bool,
        at: DateTime<Utc>,
    },
    QuizFailed {
        student_id: String,
        module_id: String,
        score: u32,
        required_score: u32,
        at: DateTime<Utc>,
    },
    /// A pass opened the next module in the outline.
    ModuleUnlocked {
        student_id: String,
        module_id: String,
        at: DateTime<Utc>,
    },
    /// The last outstanding item of a course was completed.
    CourseCompleted {
        student_id: String,
        course_id: String,
        at: DateTime<Utc>,
    },
}
