//! Course structure as authored upstream.
//!
//! These types are read-only to the engine. They deserialize from the JSON
//! course documents handed over by the authoring side.

mod catalog;
mod outline;

pub use catalog::CourseCatalog;
pub use outline::{CourseOutline, OutlineCache};

use serde::{Deserialize, Serialize};

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Image,
    Pdf,
    Doc,
    Link,
    Text,
}

/// One unit of study material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    #[serde(default)]
    pub url: Option<String>,
    /// Focused seconds required before the item counts as complete.
    /// Zero means untimed.
    #[serde(default)]
    pub min_engagement_seconds: u64,
}

impl Content {
    pub fn is_timed(&self) -> bool {
        self.min_engagement_seconds > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub correct_option_index: usize,
    #[serde(default)]
    pub explanation: String,
    pub difficulty: Difficulty,
}

/// The unit of lock/unlock: content items plus an optional quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(default)]
    pub question_bank: Vec<Question>,
    #[serde(default = "default_passing_score")]
    pub passing_score: u32,
    #[serde(default = "default_fast_track_score")]
    pub fast_track_score: u32,
    #[serde(default = "default_standard_sample_size")]
    pub standard_sample_size: usize,
    #[serde(default = "default_fast_track_sample_size")]
    pub fast_track_sample_size: usize,
}

fn default_passing_score() -> u32 {
    70
}
fn default_fast_track_score() -> u32 {
    85
}
fn default_standard_sample_size() -> usize {
    10
}
fn default_fast_track_sample_size() -> usize {
    5
}

impl Module {
    /// A module with default thresholds and no content.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            contents: Vec::new(),
            question_bank: Vec::new(),
            passing_score: default_passing_score(),
            fast_track_score: default_fast_track_score(),
            standard_sample_size: default_standard_sample_size(),
            fast_track_sample_size: default_fast_track_sample_size(),
        }
    }

    pub fn has_quiz(&self) -> bool {
        !self.question_bank.is_empty()
    }

    pub fn content(&self, content_id: &str) -> Option<&Content> {
        self.contents.iter().find(|c| c.id == content_id)
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.question_bank.iter().find(|q| q.id == question_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Bumped upstream whenever the chapter/module structure changes.
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl Course {
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.chapters.iter().flat_map(|ch| ch.modules.iter())
    }

    pub fn contents(&self) -> impl Iterator<Item = &Content> {
        self.modules().flat_map(|m| m.contents.iter())
    }

    /// Every answer key must point at one of the question's options.
    ///
    /// # Errors
    /// `OptionOutOfRange` for the first question whose key does not.
    pub fn check_answer_keys(&self) -> crate::error::Result<()> {
        let bad = self
            .modules()
            .flat_map(|m| m.question_bank.iter())
            .find(|q| q.correct_option_index >= OPTION_COUNT);
        match bad {
            Some(q) => Err(crate::error::ValidationError::OptionOutOfRange {
                question_id: q.id.clone(),
                index: q.correct_option_index,
            }
            .into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_defaults_apply_when_absent() {
        let json = r#"{"id": "m1", "contents": [{"id": "c1", "type": "video"}]}"#;
        let module: Module = serde_json::from_str(json).unwrap();
        assert_eq!(module.passing_score, 70);
        assert_eq!(module.fast_track_score, 85);
        assert_eq!(module.standard_sample_size, 10);
        assert_eq!(module.fast_track_sample_size, 5);
        assert_eq!(module.contents[0].min_engagement_seconds, 0);
        assert!(!module.has_quiz());
    }

    #[test]
    fn question_parses_difficulty() {
        let json = r#"{
            "id": "q1", "text": "2+2?", "options": ["1","2","3","4"],
            "correct_option_index": 3, "difficulty": "hard"
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.difficulty, Difficulty::Hard);
        assert!(q.explanation.is_empty());
    }
}
