//! Module quizzes: sampling, grading, and the answer-reveal review.

mod evaluator;
mod sampler;

pub use evaluator::{
    score_percent, Answers, AttemptResult, Evaluation, QuizAttempt, QuizEvaluator, QuizOutcome,
    QuizReview, QuizState, ReviewedOption, ReviewedQuestion,
};
pub use sampler::QuestionSampler;

use serde::{Deserialize, Serialize};

/// Attempt policy for a module quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    /// Easy/medium/hard sample against the module's passing score.
    Standard,
    /// Medium/hard sample against the higher fast-track score.
    FastTrack,
}

impl QuizMode {
    pub fn is_fast_track(self) -> bool {
        self == QuizMode::FastTrack
    }
}

impl std::fmt::Display for QuizMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuizMode::Standard => f.write_str("standard"),
            QuizMode::FastTrack => f.write_str("fast_track"),
        }
    }
}

impl std::str::FromStr for QuizMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "standard" => Ok(QuizMode::Standard),
            "fast_track" | "fasttrack" => Ok(QuizMode::FastTrack),
            other => Err(format!("unknown quiz mode: {other}")),
        }
    }
}
