//! Student-facing operations over a course catalog and a progress store.
//!
//! Every call takes the caller identity explicitly; nothing is read from
//! ambient state. The service holds no per-student memory, so any number of
//! callers can share one store.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::course::{
    Course, CourseCatalog, CourseOutline, Difficulty, Module, OutlineCache, Question, OPTION_COUNT,
};
use crate::engagement::ProgressWrite;
use crate::error::{require_id, CoreError, EntityKind, Result, ValidationError};
use crate::events::Event;
use crate::gate::{ModuleGate, ModuleLockState, SessionContext};
use crate::progress::{
    completion_pct, is_course_complete, ContentProgress, GradeSummary, MergeOutcome,
    ModuleCompletion, StudentProgress,
};
use crate::quiz::{
    Answers, Evaluation, QuizAttempt, QuizEvaluator, QuizMode, QuizOutcome, QuizReview,
};
use crate::storage::{ProgressStore, QuizConfig};

/// Acknowledgement of a progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressAck {
    /// Stored record after the merge.
    pub record: ContentProgress,
    pub outcome: MergeOutcome,
    pub events: Vec<Event>,
}

/// A question as shown to the student: no answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub difficulty: Difficulty,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            text: q.text.clone(),
            options: q.options.clone(),
            difficulty: q.difficulty,
        }
    }
}

/// A freshly drawn quiz sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizDraw {
    pub attempt_id: Uuid,
    pub module_id: String,
    pub mode: QuizMode,
    pub required_score: u32,
    pub questions: Vec<QuestionView>,
}

impl QuizDraw {
    pub fn question_ids(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.id.clone()).collect()
    }
}

/// Result of [`ProgressionService::submit_quiz_attempt`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSubmission {
    #[serde(flatten)]
    pub outcome: QuizOutcome,
    pub correct_count: usize,
    pub question_count: usize,
    pub events: Vec<Event>,
}

pub struct ProgressionService<S> {
    store: S,
    catalog: CourseCatalog,
    outlines: OutlineCache,
    quiz: QuizConfig,
}

impl<S: ProgressStore> ProgressionService<S> {
    pub fn new(store: S, catalog: CourseCatalog) -> Self {
        Self {
            store,
            catalog,
            outlines: OutlineCache::new(),
            quiz: QuizConfig::default(),
        }
    }

    /// Sample sizes used for modules that leave theirs at zero.
    pub fn with_quiz_config(mut self, quiz: QuizConfig) -> Self {
        self.quiz = quiz;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &CourseCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut CourseCatalog {
        &mut self.catalog
    }

    pub fn outline(&mut self, course_id: &str) -> Result<Arc<CourseOutline>> {
        let course = self.catalog.course(course_id)?;
        self.outlines.get_or_build(course)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Content progress, passed modules and completion percentage for one
    /// student in one course.
    pub fn get_student_progress(
        &mut self,
        student_id: &str,
        course_id: &str,
    ) -> Result<StudentProgress> {
        require_id("student_id", student_id)?;
        require_id("course_id", course_id)?;
        let course = self.catalog.course(course_id)?;
        let outline = self.outlines.get_or_build(course)?;

        let content_ids: Vec<&str> = course.contents().map(|c| c.id.as_str()).collect();
        let content_progress = self.store.content_progress_for(student_id, &content_ids)?;
        let completed_modules = course_completions(&self.store, student_id, &outline)?;
        let completed_ids: HashSet<String> =
            completed_modules.iter().map(|c| c.module_id.clone()).collect();

        Ok(StudentProgress {
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
            completion_pct: completion_pct(&outline, &content_progress, &completed_ids),
            course_completed_at: self.store.course_completed_at(student_id, course_id)?,
            content_progress,
            completed_modules,
        })
    }

    /// Lock state of every module in the course for the caller.
    pub fn module_states(
        &mut self,
        ctx: &SessionContext,
        course_id: &str,
    ) -> Result<Vec<ModuleLockState>> {
        ctx.validate()?;
        let outline = self.outline(course_id)?;
        let completed = completed_ids(&self.store, &ctx.student_id)?;
        Ok(ModuleGate::lock_states(&outline, &completed, ctx.role))
    }

    /// Answer-reveal view of a module the caller has passed.
    ///
    /// # Errors
    /// `NotFound` for an unknown module or one without a passing completion.
    pub fn review_quiz(&self, ctx: &SessionContext, module_id: &str) -> Result<QuizReview> {
        ctx.validate()?;
        let (_, module) = self.catalog.find_module(module_id)?;
        let completion = self
            .store
            .completion(&ctx.student_id, module_id)?
            .ok_or_else(|| {
                CoreError::not_found(EntityKind::Module, format!("{module_id} (not passed)"))
            })?;
        Ok(QuizEvaluator::review(module, &completion))
    }

    /// Per-module scores in outline order with average, highest and lowest.
    pub fn grade_summary(&mut self, student_id: &str, course_id: &str) -> Result<GradeSummary> {
        require_id("student_id", student_id)?;
        let outline = self.outline(course_id)?;
        let completions = course_completions(&self.store, student_id, &outline)?;
        Ok(GradeSummary::from_completions(
            student_id,
            course_id,
            &completions,
        ))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Store engagement for one content item. Writes merge by maximum, so a
    /// late or repeated report never moves progress backwards.
    pub fn report_content_progress(
        &mut self,
        ctx: &SessionContext,
        content_id: &str,
        engaged_seconds: u64,
        is_completed: bool,
    ) -> Result<ProgressAck> {
        ctx.validate()?;
        require_id("content_id", content_id)?;
        let (course, _, _) = self.catalog.find_content(content_id)?;

        let now = Utc::now();
        let incoming = ContentProgress {
            student_id: ctx.student_id.clone(),
            content_id: content_id.to_string(),
            engaged_seconds,
            is_completed,
            updated_at: now,
        };
        let (record, outcome) = self.store.upsert_content_progress(&incoming)?;

        let mut events = Vec::new();
        if outcome != MergeOutcome::StaleIgnored && record.is_completed {
            let event = record_course_completion(&self.store, course, &ctx.student_id, now)?;
            events.extend(event);
        }
        Ok(ProgressAck {
            record,
            outcome,
            events,
        })
    }

    /// Apply a tracker write as its own student.
    pub fn apply_write(&mut self, write: &ProgressWrite) -> Result<ProgressAck> {
        let ctx = SessionContext::student(write.student_id.clone());
        self.report_content_progress(
            &ctx,
            &write.content_id,
            write.engaged_seconds,
            write.is_completed,
        )
    }

    /// Draw a quiz sample for a module open to the caller.
    pub fn draw_quiz<R: Rng + ?Sized>(
        &mut self,
        ctx: &SessionContext,
        module_id: &str,
        mode: QuizMode,
        rng: &mut R,
    ) -> Result<QuizDraw> {
        ctx.validate()?;
        require_id("module_id", module_id)?;
        let (course, module) = self.catalog.find_module(module_id)?;
        let outline = self.outlines.get_or_build(course)?;
        let completed = completed_ids(&self.store, &ctx.student_id)?;
        ensure_open(&outline, module_id, &completed, ctx)?;

        let mut attempt = QuizAttempt::new(&ctx.student_id, module, mode)?
            .with_sample_size(self.quiz.sample_size_for(module, mode));
        attempt.start(rng)?;
        Ok(QuizDraw {
            attempt_id: attempt.id(),
            module_id: module_id.to_string(),
            mode,
            required_score: QuizEvaluator::threshold(module, mode),
            questions: attempt.sample().iter().map(QuestionView::from).collect(),
        })
    }

    /// Grade a submission against the sample the caller was shown.
    ///
    /// A pass records a [`ModuleCompletion`]; a fail persists nothing.
    ///
    /// # Errors
    /// Validation errors for a locked or already passed module, a malformed
    /// sample or malformed answers; `NotFound` for unknown ids.
    pub fn submit_quiz_attempt(
        &mut self,
        ctx: &SessionContext,
        module_id: &str,
        mode: QuizMode,
        sample_question_ids: &[String],
        answers: &Answers,
    ) -> Result<QuizSubmission> {
        ctx.validate()?;
        require_id("module_id", module_id)?;
        let (course, module) = self.catalog.find_module(module_id)?;
        let outline = self.outlines.get_or_build(course)?;
        let completed = completed_ids(&self.store, &ctx.student_id)?;
        ensure_open(&outline, module_id, &completed, ctx)?;

        let sample = resolve_sample(module, sample_question_ids)?;
        let evaluation = QuizEvaluator::evaluate(&sample, answers, mode, module)?;
        let now = Utc::now();
        let events = if evaluation.is_passed {
            self.record_pass(ctx, course, &outline, module_id, &evaluation, now)?
        } else {
            tracing::info!(
                student_id = %ctx.student_id,
                module_id,
                score = evaluation.score,
                required = evaluation.required_score,
                "quiz failed"
            );
            vec![Event::QuizFailed {
                student_id: ctx.student_id.clone(),
                module_id: module_id.to_string(),
                score: evaluation.score,
                required_score: evaluation.required_score,
                at: now,
            }]
        };

        Ok(QuizSubmission {
            outcome: evaluation.outcome(),
            correct_count: evaluation.correct_count,
            question_count: evaluation.question_count,
            events,
        })
    }

    fn record_pass(
        &self,
        ctx: &SessionContext,
        course: &Course,
        outline: &CourseOutline,
        module_id: &str,
        evaluation: &Evaluation,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let completion = ModuleCompletion {
            student_id: ctx.student_id.clone(),
            module_id: module_id.to_string(),
            score: evaluation.score,
            is_fast_tracked: evaluation.mode.is_fast_track(),
            completed_at: now,
        };
        self.store.record_completion(&completion)?;
        tracing::info!(
            student_id = %ctx.student_id,
            module_id,
            score = evaluation.score,
            fast_track = completion.is_fast_tracked,
            "quiz passed"
        );

        let mut events = vec![Event::QuizPassed {
            student_id: ctx.student_id.clone(),
            module_id: module_id.to_string(),
            score: evaluation.score,
            is_fast_tracked: completion.is_fast_tracked,
            at: now,
        }];
        if let Some(next) = ModuleGate::unlocked_by(outline, module_id)? {
            events.push(Event::ModuleUnlocked {
                student_id: ctx.student_id.clone(),
                module_id: next.to_string(),
                at: now,
            });
        }
        if let Some(event) = record_course_completion(&self.store, course, &ctx.student_id, now)? {
            events.push(event);
        }
        Ok(events)
    }
}

fn completed_ids<S: ProgressStore>(store: &S, student_id: &str) -> Result<HashSet<String>> {
    Ok(store
        .completions_for(student_id)?
        .into_iter()
        .map(|c| c.module_id)
        .collect())
}

/// Completions for the modules of `outline`, in outline order.
fn course_completions<S: ProgressStore>(
    store: &S,
    student_id: &str,
    outline: &CourseOutline,
) -> Result<Vec<ModuleCompletion>> {
    let mut completions = store.completions_for(student_id)?;
    completions.retain(|c| outline.index_of(&c.module_id).is_ok());
    completions.sort_by_key(|c| outline.index_of(&c.module_id).unwrap_or(usize::MAX));
    Ok(completions)
}

fn ensure_open(
    outline: &CourseOutline,
    module_id: &str,
    completed: &HashSet<String>,
    ctx: &SessionContext,
) -> Result<()> {
    if completed.contains(module_id) {
        return Err(ValidationError::AlreadyCompleted {
            module_id: module_id.to_string(),
        }
        .into());
    }
    if ModuleGate::is_locked(outline, module_id, completed, ctx.role)? {
        return Err(ValidationError::ModuleLocked {
            module_id: module_id.to_string(),
        }
        .into());
    }
    Ok(())
}

fn resolve_sample(module: &Module, ids: &[String]) -> Result<Vec<Question>> {
    let mut seen = HashSet::new();
    let mut sample = Vec::with_capacity(ids.len());
    for id in ids {
        require_id("question_id", id)?;
        if !seen.insert(id.as_str()) {
            return Err(ValidationError::DuplicateId {
                collection: "quiz sample".into(),
                id: id.clone(),
            }
            .into());
        }
        let question = module
            .question(id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Question, id.as_str()))?;
        sample.push(question.clone());
    }
    Ok(sample)
}

/// Stamp the course complete the first time every item is done.
fn record_course_completion<S: ProgressStore>(
    store: &S,
    course: &Course,
    student_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<Event>> {
    if store.course_completed_at(student_id, &course.id)?.is_some() {
        return Ok(None);
    }
    let content_ids: Vec<&str> = course.contents().map(|c| c.id.as_str()).collect();
    let progress = store.content_progress_for(student_id, &content_ids)?;
    let completed = completed_ids(store, student_id)?;
    if !is_course_complete(course, &progress, &completed) {
        return Ok(None);
    }
    if !store.mark_course_completed(student_id, &course.id, now)? {
        return Ok(None);
    }
    tracing::info!(student_id, course_id = %course.id, "course completed");
    Ok(Some(Event::CourseCompleted {
        student_id: student_id.to_string(),
        course_id: course.id.clone(),
        at: now,
    }))
}
