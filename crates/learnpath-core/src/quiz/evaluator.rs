//! Quiz grading and the per-attempt state machine.
//!
//! ## State Transitions
//!
//! ```text
//! NotStarted -> InProgress -> Passed
//!                   ^  |
//!                   |  v
//!                  Failed
//! ```
//!
//! A failed attempt keeps nothing: the caller draws a fresh sample and tries
//! again, as often as it likes. Abandoning an attempt in progress discards the
//! sample and returns to `NotStarted`.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{QuestionSampler, QuizMode};
use crate::course::{Module, Question, OPTION_COUNT};
use crate::error::{require_id, Result, ValidationError};
use crate::events::Event;
use crate::progress::ModuleCompletion;

/// Chosen option index per question id. Unanswered questions count as wrong.
pub type Answers = HashMap<String, usize>;

/// `round(100 * correct / total)`, halves rounded up.
pub fn score_percent(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((200 * correct + total) / (2 * total)) as u32
}

/// Grading result for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub mode: QuizMode,
    pub correct_count: usize,
    pub question_count: usize,
    pub score: u32,
    pub required_score: u32,
    pub is_passed: bool,
}

impl Evaluation {
    pub fn outcome(&self) -> QuizOutcome {
        QuizOutcome {
            is_passed: self.is_passed,
            score: self.score,
            required_score: (!self.is_passed).then_some(self.required_score),
        }
    }
}

/// What the caller sees after submitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutcome {
    pub is_passed: bool,
    pub score: u32,
    /// Present only on failure.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub required_score: Option<u32>,
}

pub struct QuizEvaluator;

impl QuizEvaluator {
    pub fn threshold(module: &Module, mode: QuizMode) -> u32 {
        match mode {
            QuizMode::Standard => module.passing_score,
            QuizMode::FastTrack => module.fast_track_score,
        }
    }

    /// Grade `answers` against `sample`.
    ///
    /// # Errors
    /// Returns a validation error for an empty sample, an answer to a question
    /// outside the sample, or an option index past the last option.
    pub fn evaluate(
        sample: &[Question],
        answers: &Answers,
        mode: QuizMode,
        module: &Module,
    ) -> Result<Evaluation> {
        if sample.is_empty() {
            return Err(ValidationError::EmptyCollection("quiz sample".into()).into());
        }
        let in_sample: HashSet<&str> = sample.iter().map(|q| q.id.as_str()).collect();
        for (question_id, &index) in answers {
            if !in_sample.contains(question_id.as_str()) {
                return Err(ValidationError::AnswerOutsideSample(question_id.clone()).into());
            }
            if index >= OPTION_COUNT {
                return Err(ValidationError::OptionOutOfRange {
                    question_id: question_id.clone(),
                    index,
                }
                .into());
            }
        }

        let correct_count = sample
            .iter()
            .filter(|q| answers.get(&q.id) == Some(&q.correct_option_index))
            .count();
        let score = score_percent(correct_count, sample.len());
        let required_score = Self::threshold(module, mode);
        Ok(Evaluation {
            mode,
            correct_count,
            question_count: sample.len(),
            score,
            required_score,
            is_passed: score >= required_score,
        })
    }

    /// Read-only view of a passed module's quiz with every answer revealed.
    pub fn review(module: &Module, completion: &ModuleCompletion) -> QuizReview {
        let questions = module
            .question_bank
            .iter()
            .map(|q| ReviewedQuestion {
                question_id: q.id.clone(),
                text: q.text.clone(),
                options: q
                    .options
                    .iter()
                    .enumerate()
                    .map(|(i, text)| ReviewedOption {
                        text: text.clone(),
                        is_correct: i == q.correct_option_index,
                    })
                    .collect(),
                explanation: q.explanation.clone(),
            })
            .collect();
        QuizReview {
            module_id: module.id.clone(),
            score: completion.score,
            is_fast_tracked: completion.is_fast_tracked,
            completed_at: completion.completed_at,
            selectable: false,
            questions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewedOption {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewedQuestion {
    pub question_id: String,
    pub text: String,
    pub options: Vec<ReviewedOption>,
    pub explanation: String,
}

/// Answer-reveal view shown once a module is passed. Selection is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizReview {
    pub module_id: String,
    pub score: u32,
    pub is_fast_tracked: bool,
    pub completed_at: DateTime<Utc>,
    pub selectable: bool,
    pub questions: Vec<ReviewedQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizState {
    NotStarted,
    InProgress,
    Passed,
    Failed,
}

/// Result of [`QuizAttempt::submit`].
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptResult {
    pub evaluation: Evaluation,
    /// Present only on a pass; the caller persists it.
    pub completion: Option<ModuleCompletion>,
    pub event: Event,
}

/// One student's run at one module quiz.
#[derive(Debug, Clone)]
pub struct QuizAttempt<'m> {
    id: Uuid,
    student_id: String,
    module: &'m Module,
    mode: QuizMode,
    state: QuizState,
    sample_size: usize,
    sample: Vec<Question>,
    samples_drawn: u32,
}

impl<'m> QuizAttempt<'m> {
    /// # Errors
    /// Returns a validation error for a blank student id or a module without
    /// questions.
    pub fn new(student_id: &str, module: &'m Module, mode: QuizMode) -> Result<Self> {
        require_id("student_id", student_id)?;
        if !module.has_quiz() {
            return Err(
                ValidationError::EmptyCollection(format!("question bank of {}", module.id)).into(),
            );
        }
        let sample_size = match mode {
            QuizMode::Standard => module.standard_sample_size,
            QuizMode::FastTrack => module.fast_track_sample_size,
        };
        Ok(Self {
            id: Uuid::new_v4(),
            student_id: student_id.to_string(),
            module,
            mode,
            sample_size,
            state: QuizState::NotStarted,
            sample: Vec::new(),
            samples_drawn: 0,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> QuizState {
        self.state
    }

    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    pub fn sample(&self) -> &[Question] {
        &self.sample
    }

    pub fn samples_drawn(&self) -> u32 {
        self.samples_drawn
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Override the module's sample size for this attempt.
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Draw a sample and move to `InProgress`. Valid from `NotStarted` and
    /// `Failed`.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Event> {
        match self.state {
            QuizState::NotStarted | QuizState::Failed => {}
            QuizState::Passed => {
                return Err(ValidationError::AlreadyCompleted {
                    module_id: self.module.id.clone(),
                }
                .into())
            }
            QuizState::InProgress => return Err(self.bad_transition("start")),
        }
        self.sample = QuestionSampler::sample(
            &self.module.question_bank,
            self.mode,
            self.sample_size(),
            rng,
        );
        self.samples_drawn += 1;
        self.state = QuizState::InProgress;
        Ok(Event::QuizSampled {
            attempt_id: self.id.to_string(),
            module_id: self.module.id.clone(),
            mode: self.mode,
            question_count: self.sample.len(),
            at: Utc::now(),
        })
    }

    /// Grade the current sample. A pass is terminal; a fail discards the
    /// sample so the next `start` draws a new one.
    pub fn submit(&mut self, answers: &Answers, now: DateTime<Utc>) -> Result<AttemptResult> {
        if self.state != QuizState::InProgress {
            return Err(self.bad_transition("submit"));
        }
        let evaluation = QuizEvaluator::evaluate(&self.sample, answers, self.mode, self.module)?;
        let module_id = self.module.id.clone();

        if evaluation.is_passed {
            self.state = QuizState::Passed;
            let completion = ModuleCompletion {
                student_id: self.student_id.clone(),
                module_id: module_id.clone(),
                score: evaluation.score,
                is_fast_tracked: self.mode.is_fast_track(),
                completed_at: now,
            };
            let event = Event::QuizPassed {
                student_id: self.student_id.clone(),
                module_id,
                score: evaluation.score,
                is_fast_tracked: completion.is_fast_tracked,
                at: now,
            };
            Ok(AttemptResult {
                evaluation,
                completion: Some(completion),
                event,
            })
        } else {
            self.state = QuizState::Failed;
            self.sample.clear();
            Ok(AttemptResult {
                evaluation,
                completion: None,
                event: Event::QuizFailed {
                    student_id: self.student_id.clone(),
                    module_id,
                    score: evaluation.score,
                    required_score: evaluation.required_score,
                    at: now,
                },
            })
        }
    }

    /// Drop the sample of an attempt in progress. No persistence effect.
    pub fn abandon(&mut self) {
        if self.state == QuizState::InProgress {
            self.sample.clear();
            self.state = QuizState::NotStarted;
        }
    }

    fn bad_transition(&self, action: &str) -> crate::error::CoreError {
        ValidationError::InvalidValue {
            field: "quiz_state".into(),
            message: format!("cannot {action} while {:?}", self.state),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::Difficulty;
    use rand::SeedableRng;
    use rand_pcg::Mcg128Xsl64;

    fn question(i: usize, difficulty: Difficulty) -> Question {
        Question {
            id: format!("q{i}"),
            text: format!("Question {i}"),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_option_index: i % OPTION_COUNT,
            explanation: format!("because {i}"),
            difficulty,
        }
    }

    fn module_with(n: usize) -> Module {
        let mut module = Module::new("m1");
        module.question_bank = (0..n)
            .map(|i| {
                let d = match i % 3 {
                    0 => Difficulty::Easy,
                    1 => Difficulty::Medium,
                    _ => Difficulty::Hard,
                };
                question(i, d)
            })
            .collect();
        module
    }

    /// Answer the first `correct` questions right and the rest wrong.
    fn answers_for(sample: &[Question], correct: usize) -> Answers {
        sample
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let choice = if i < correct {
                    q.correct_option_index
                } else {
                    (q.correct_option_index + 1) % OPTION_COUNT
                };
                (q.id.clone(), choice)
            })
            .collect()
    }

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(score_percent(7, 10), 70);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(0, 0), 0);
    }

    #[test]
    fn standard_threshold_boundary() {
        let module = module_with(100);
        let sample = &module.question_bank;
        let pass = QuizEvaluator::evaluate(sample, &answers_for(sample, 70), QuizMode::Standard, &module)
            .unwrap();
        assert!(pass.is_passed);
        assert_eq!(pass.outcome().required_score, None);

        let fail = QuizEvaluator::evaluate(sample, &answers_for(sample, 69), QuizMode::Standard, &module)
            .unwrap();
        assert!(!fail.is_passed);
        assert_eq!(fail.outcome().required_score, Some(70));
    }

    #[test]
    fn fast_track_threshold_boundary() {
        let module = module_with(100);
        let sample = &module.question_bank;
        let fail = QuizEvaluator::evaluate(sample, &answers_for(sample, 84), QuizMode::FastTrack, &module)
            .unwrap();
        assert!(!fail.is_passed);
        assert_eq!(fail.required_score, 85);
        let pass = QuizEvaluator::evaluate(sample, &answers_for(sample, 85), QuizMode::FastTrack, &module)
            .unwrap();
        assert!(pass.is_passed);
    }

    #[test]
    fn unanswered_counts_wrong() {
        let module = module_with(10);
        let sample = &module.question_bank;
        let mut answers = answers_for(sample, 10);
        answers.remove("q0");
        answers.remove("q1");
        answers.remove("q2");
        let eval = QuizEvaluator::evaluate(sample, &answers, QuizMode::Standard, &module).unwrap();
        assert_eq!(eval.correct_count, 7);
        assert_eq!(eval.score, 70);
    }

    #[test]
    fn rejects_malformed_submissions() {
        let module = module_with(4);
        let sample = &module.question_bank[..2];
        let mut answers = Answers::new();
        answers.insert("q3".into(), 0);
        assert!(QuizEvaluator::evaluate(sample, &answers, QuizMode::Standard, &module).is_err());

        let mut answers = Answers::new();
        answers.insert("q0".into(), 4);
        assert!(QuizEvaluator::evaluate(sample, &answers, QuizMode::Standard, &module).is_err());

        assert!(QuizEvaluator::evaluate(&[], &Answers::new(), QuizMode::Standard, &module).is_err());
    }

    #[test]
    fn failed_attempt_draws_new_sample_then_passes() {
        let module = module_with(30);
        let mut rng = Mcg128Xsl64::seed_from_u64(99);
        let mut attempt = QuizAttempt::new("s1", &module, QuizMode::Standard).unwrap();
        assert_eq!(attempt.state(), QuizState::NotStarted);

        attempt.start(&mut rng).unwrap();
        assert_eq!(attempt.sample().len(), 10);
        let answers = answers_for(attempt.sample(), 3);
        let result = attempt.submit(&answers, Utc::now()).unwrap();
        assert!(result.completion.is_none());
        assert_eq!(attempt.state(), QuizState::Failed);
        assert!(attempt.sample().is_empty());
        assert!(attempt.submit(&answers, Utc::now()).is_err());

        attempt.start(&mut rng).unwrap();
        assert_eq!(attempt.samples_drawn(), 2);
        let answers = answers_for(attempt.sample(), 10);
        let result = attempt.submit(&answers, Utc::now()).unwrap();
        let completion = result.completion.unwrap();
        assert_eq!(completion.score, 100);
        assert!(!completion.is_fast_tracked);
        assert!(matches!(result.event, Event::QuizPassed { .. }));
        assert_eq!(attempt.state(), QuizState::Passed);
        assert!(attempt.start(&mut rng).is_err());
    }

    #[test]
    fn abandon_discards_sample() {
        let module = module_with(12);
        let mut rng = Mcg128Xsl64::seed_from_u64(1);
        let mut attempt = QuizAttempt::new("s1", &module, QuizMode::FastTrack).unwrap();
        attempt.start(&mut rng).unwrap();
        assert!(attempt.start(&mut rng).is_err());
        attempt.abandon();
        assert_eq!(attempt.state(), QuizState::NotStarted);
        assert!(attempt.sample().is_empty());
    }

    #[test]
    fn quizless_module_rejected() {
        let module = Module::new("empty");
        assert!(QuizAttempt::new("s1", &module, QuizMode::Standard).is_err());
    }

    #[test]
    fn review_reveals_every_answer() {
        let module = module_with(3);
        let completion = ModuleCompletion {
            student_id: "s1".into(),
            module_id: "m1".into(),
            score: 90,
            is_fast_tracked: true,
            completed_at: Utc::now(),
        };
        let review = QuizEvaluator::review(&module, &completion);
        assert!(!review.selectable);
        assert_eq!(review.questions.len(), 3);
        for (q, reviewed) in module.question_bank.iter().zip(&review.questions) {
            let correct: Vec<usize> = reviewed
                .options
                .iter()
                .enumerate()
                .filter(|(_, o)| o.is_correct)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(correct, [q.correct_option_index]);
            assert_eq!(reviewed.explanation, q.explanation);
        }
    }
}
