//! Per-student progress records and the read model built from them.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::course::{Content, Course, CourseOutline};

/// Engagement with one content item, keyed by (student, content).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentProgress {
    pub student_id: String,
    pub content_id: String,
    pub engaged_seconds: u64,
    pub is_completed: bool,
    pub updated_at: DateTime<Utc>,
}

/// What the store did with an incoming progress write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// No row existed yet.
    Inserted,
    /// The stored row moved forward.
    Advanced,
    /// The write carried nothing newer than what was stored.
    StaleIgnored,
}

impl ContentProgress {
    pub fn new(student_id: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            content_id: content_id.into(),
            engaged_seconds: 0,
            is_completed: false,
            updated_at: Utc::now(),
        }
    }

    /// Merge `incoming` into `self`: max of seconds, OR of completion.
    ///
    /// The stored value never regresses regardless of write order.
    pub fn merge(&mut self, incoming: &ContentProgress) -> MergeOutcome {
        let seconds = self.engaged_seconds.max(incoming.engaged_seconds);
        let completed = self.is_completed || incoming.is_completed;
        if seconds == self.engaged_seconds && completed == self.is_completed {
            return MergeOutcome::StaleIgnored;
        }
        self.engaged_seconds = seconds;
        self.is_completed = completed;
        self.updated_at = self.updated_at.max(incoming.updated_at);
        MergeOutcome::Advanced
    }

    /// Share of `content` done, as counted by the course percentage.
    pub fn contribution(&self, content: &Content) -> f64 {
        if self.is_completed {
            1.0
        } else if content.min_engagement_seconds > 0 {
            (self.engaged_seconds as f64 / content.min_engagement_seconds as f64).min(0.9)
        } else if self.engaged_seconds > 0 {
            0.1
        } else {
            0.0
        }
    }
}

/// Record of a passing quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleCompletion {
    pub student_id: String,
    pub module_id: String,
    pub score: u32,
    pub is_fast_tracked: bool,
    pub completed_at: DateTime<Utc>,
}

/// Everything a UI needs to render one student's standing in one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProgress {
    pub student_id: String,
    pub course_id: String,
    pub content_progress: Vec<ContentProgress>,
    pub completed_modules: Vec<ModuleCompletion>,
    /// 0.0 ..= 100.0
    pub completion_pct: f64,
    pub course_completed_at: Option<DateTime<Utc>>,
}

impl StudentProgress {
    pub fn completed_module_ids(&self) -> HashSet<String> {
        self.completed_modules
            .iter()
            .map(|m| m.module_id.clone())
            .collect()
    }

    pub fn completion(&self, module_id: &str) -> Option<&ModuleCompletion> {
        self.completed_modules.iter().find(|m| m.module_id == module_id)
    }

    pub fn content(&self, content_id: &str) -> Option<&ContentProgress> {
        self.content_progress.iter().find(|p| p.content_id == content_id)
    }
}

/// Aggregate completion percentage over every content item and every
/// quiz-bearing module in the outline.
pub fn completion_pct(
    outline: &CourseOutline,
    content_progress: &[ContentProgress],
    completed_modules: &HashSet<String>,
) -> f64 {
    let by_content: HashMap<&str, &ContentProgress> = content_progress
        .iter()
        .map(|p| (p.content_id.as_str(), p))
        .collect();

    let mut items = 0usize;
    let mut sum = 0.0;
    for module in outline.modules() {
        for content in &module.contents {
            items += 1;
            if let Some(progress) = by_content.get(content.id.as_str()) {
                sum += progress.contribution(content);
            }
        }
        if module.has_quiz() {
            items += 1;
            if completed_modules.contains(&module.id) {
                sum += 1.0;
            }
        }
    }

    if items == 0 {
        return 0.0;
    }
    100.0 * sum / items as f64
}

/// True when every content item is completed and every quiz module passed.
/// A course with nothing to do is never complete.
pub fn is_course_complete(
    course: &Course,
    content_progress: &[ContentProgress],
    completed_modules: &HashSet<String>,
) -> bool {
    let done: HashSet<&str> = content_progress
        .iter()
        .filter(|p| p.is_completed)
        .map(|p| p.content_id.as_str())
        .collect();

    let mut items = 0usize;
    for module in course.modules() {
        for content in &module.contents {
            items += 1;
            if !done.contains(content.id.as_str()) {
                return false;
            }
        }
        if module.has_quiz() {
            items += 1;
            if !completed_modules.contains(&module.id) {
                return false;
            }
        }
    }
    items > 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleGrade {
    pub module_id: String,
    pub score: u32,
    pub is_fast_tracked: bool,
    pub completed_at: DateTime<Utc>,
}

/// Scores of one student in one course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    pub student_id: String,
    pub course_id: String,
    pub grades: Vec<ModuleGrade>,
    /// Rounded to two decimals; 0 with no grades.
    pub average_score: f64,
    pub highest_score: u32,
    pub lowest_score: u32,
}

impl GradeSummary {
    pub fn from_completions(
        student_id: &str,
        course_id: &str,
        completions: &[ModuleCompletion],
    ) -> Self {
        let grades: Vec<ModuleGrade> = completions
            .iter()
            .map(|c| ModuleGrade {
                module_id: c.module_id.clone(),
                score: c.score,
                is_fast_tracked: c.is_fast_tracked,
                completed_at: c.completed_at,
            })
            .collect();
        let scores: Vec<u32> = grades.iter().map(|g| g.score).collect();
        let average_score = if scores.is_empty() {
            0.0
        } else {
            let mean = scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64;
            (mean * 100.0).round() / 100.0
        };
        Self {
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
            average_score,
            highest_score: scores.iter().copied().max().unwrap_or(0),
            lowest_score: scores.iter().copied().min().unwrap_or(0),
            grades,
        }
    }
}
