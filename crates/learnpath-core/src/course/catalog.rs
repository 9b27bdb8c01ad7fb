//! Read-only course lookup.

use std::collections::BTreeMap;
use std::path::Path;

use super::{Content, Course, Module};
use crate::error::{CoreError, EntityKind, Result};

/// Courses handed over by the authoring side, keyed by course id.
#[derive(Debug, Clone, Default)]
pub struct CourseCatalog {
    courses: BTreeMap<String, Course>,
}

impl CourseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_courses(courses: impl IntoIterator<Item = Course>) -> Self {
        let mut catalog = Self::new();
        for course in courses {
            catalog.insert(course);
        }
        catalog
    }

    /// Insert or replace a course.
    pub fn insert(&mut self, course: Course) {
        self.courses.insert(course.id.clone(), course);
    }

    /// Load one course document from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if a
    /// question's answer key is out of range.
    pub fn load_file(&mut self, path: &Path) -> Result<&Course> {
        let raw = std::fs::read_to_string(path)?;
        let course: Course = serde_json::from_str(&raw)?;
        course.check_answer_keys()?;
        let id = course.id.clone();
        self.insert(course);
        self.course(&id)
    }

    /// Load every `*.json` file in `dir`.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                self.load_file(&path)?;
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    pub fn course(&self, course_id: &str) -> Result<&Course> {
        self.courses
            .get(course_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Course, course_id))
    }

    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }

    /// Locate a module and the course that owns it.
    pub fn find_module(&self, module_id: &str) -> Result<(&Course, &Module)> {
        self.courses
            .values()
            .find_map(|course| {
                course
                    .modules()
                    .find(|m| m.id == module_id)
                    .map(|m| (course, m))
            })
            .ok_or_else(|| CoreError::not_found(EntityKind::Module, module_id))
    }

    /// Locate a content item together with its course and module.
    pub fn find_content(&self, content_id: &str) -> Result<(&Course, &Module, &Content)> {
        self.courses
            .values()
            .find_map(|course| {
                course.modules().find_map(|m| {
                    m.content(content_id).map(|content| (course, m, content))
                })
            })
            .ok_or_else(|| CoreError::not_found(EntityKind::Content, content_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{Chapter, ContentType, Difficulty, Question};
    use crate::error::{CoreError, ValidationError};
    use std::io::Write;

    fn sample_course() -> Course {
        let mut module = Module::new("m1");
        module.contents.push(Content {
            id: "c1".into(),
            title: "Intro".into(),
            content_type: ContentType::Video,
            url: None,
            min_engagement_seconds: 60,
        });
        Course {
            id: "course-a".into(),
            title: "A".into(),
            version: 1,
            chapters: vec![Chapter {
                id: "ch".into(),
                title: String::new(),
                modules: vec![module],
            }],
        }
    }

    #[test]
    fn finds_content_and_module() {
        let catalog = CourseCatalog::from_courses([sample_course()]);
        let (course, module, content) = catalog.find_content("c1").unwrap();
        assert_eq!(course.id, "course-a");
        assert_eq!(module.id, "m1");
        assert_eq!(content.min_engagement_seconds, 60);
        assert!(catalog.find_module("m2").is_err());
    }

    #[test]
    fn loads_json_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("a.json")).unwrap();
        file.write_all(serde_json::to_string(&sample_course()).unwrap().as_bytes())
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut catalog = CourseCatalog::new();
        assert_eq!(catalog.load_dir(dir.path()).unwrap(), 1);
        assert!(catalog.course("course-a").is_ok());
    }

    #[test]
    fn rejects_answer_key_outside_options() {
        let mut course = sample_course();
        course.chapters[0].modules[0].question_bank.push(Question {
            id: "q1".into(),
            text: "?".into(),
            options: Default::default(),
            correct_option_index: 4,
            explanation: String::new(),
            difficulty: Difficulty::Easy,
        });
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(&path, serde_json::to_string(&course).unwrap()).unwrap();

        let mut catalog = CourseCatalog::new();
        let err = catalog.load_file(&path).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::OptionOutOfRange { index: 4, .. })
        ));
        assert!(catalog.course("course-a").is_err());
    }
}
