//! # Learnpath Core Library
//!
//! This library provides the core logic for the Learnpath module progression
//! and adaptive quiz engine. Every operation is available through the
//! standalone `learnpath-cli` binary, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Engagement**: a tick-driven counter of focused time per content item,
//!   stepped by an injectable [`Clock`] through a [`Scheduler`]
//! - **Gate**: linear lock/unlock over the chapter-ordered [`CourseOutline`]
//! - **Quiz**: difficulty-weighted sampling and threshold grading
//! - **Storage**: SQLite progress store with merge-by-maximum writes and
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`EngagementTracker`] / [`StudySession`]: time-on-task tracking
//! - [`ModuleGate`]: module lock state
//! - [`QuestionSampler`] / [`QuizEvaluator`]: quiz draw and grading
//! - [`ProgressionService`]: the student-facing operations
//! - [`Database`]: progress persistence
//! - [`Config`]: application configuration management

pub mod clock;
pub mod course;
pub mod engagement;
pub mod error;
pub mod events;
pub mod gate;
pub mod progress;
pub mod quiz;
pub mod service;
pub mod storage;

pub use clock::{Clock, ManualClock, Scheduler, SystemClock, TimerHandle};
pub use course::{
    Chapter, Content, ContentType, Course, CourseCatalog, CourseOutline, Difficulty, Module,
    OutlineCache, Question,
};
pub use engagement::{EngagementTracker, ProgressSink, ProgressWrite, StudySession};
pub use error::{ConfigError, CoreError, DatabaseError, EntityKind, ValidationError};
pub use events::Event;
pub use gate::{ModuleGate, ModuleLockState, Role, SessionContext};
pub use progress::{
    ContentProgress, GradeSummary, MergeOutcome, ModuleCompletion, StudentProgress,
};
pub use quiz::{Answers, QuestionSampler, QuizAttempt, QuizEvaluator, QuizMode, QuizOutcome};
pub use service::{ProgressAck, ProgressionService, QuestionView, QuizDraw, QuizSubmission};
pub use storage::{Config, Database, ProgressStore};
