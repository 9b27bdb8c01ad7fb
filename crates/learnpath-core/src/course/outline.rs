//! Flattened module order for one course version.

use std::collections::HashMap;
use std::sync::Arc;

use super::{Course, Module};
use crate::error::{require_id, CoreError, EntityKind, Result, ValidationError};

/// Modules of a course in chapter order, then module order within a chapter.
///
/// Built once per course version and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CourseOutline {
    course_id: String,
    version: u64,
    modules: Vec<Module>,
    index: HashMap<String, usize>,
}

impl CourseOutline {
    /// Flatten `course` into one indexable sequence.
    ///
    /// # Errors
    /// Returns a validation error if a module id is blank or appears twice,
    /// or if an answer key is out of range.
    pub fn build(course: &Course) -> Result<Self> {
        require_id("course_id", &course.id)?;
        course.check_answer_keys()?;
        let modules: Vec<Module> = course.modules().cloned().collect();
        let mut index = HashMap::with_capacity(modules.len());
        for (i, module) in modules.iter().enumerate() {
            require_id("module_id", &module.id)?;
            if index.insert(module.id.clone(), i).is_some() {
                return Err(ValidationError::DuplicateId {
                    collection: "module".into(),
                    id: module.id.clone(),
                }
                .into());
            }
        }
        Ok(Self {
            course_id: course.id.clone(),
            version: course.version,
            modules,
            index,
        })
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn get(&self, index: usize) -> Option<&Module> {
        self.modules.get(index)
    }

    /// Position of `module_id` in the flattened sequence.
    pub fn index_of(&self, module_id: &str) -> Result<usize> {
        self.index
            .get(module_id)
            .copied()
            .ok_or_else(|| CoreError::not_found(EntityKind::Module, module_id))
    }

    pub fn module(&self, module_id: &str) -> Result<&Module> {
        let i = self.index_of(module_id)?;
        Ok(&self.modules[i])
    }

    /// The module holding `content_id`, if any.
    pub fn module_for_content(&self, content_id: &str) -> Option<&Module> {
        self.modules
            .iter()
            .find(|m| m.contents.iter().any(|c| c.id == content_id))
    }
}

/// Memoizes outlines by course id and version.
#[derive(Debug, Default)]
pub struct OutlineCache {
    outlines: HashMap<String, Arc<CourseOutline>>,
}

impl OutlineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached outline for this course version, building it on a miss
    /// or when the version changed.
    pub fn get_or_build(&mut self, course: &Course) -> Result<Arc<CourseOutline>> {
        if let Some(outline) = self.outlines.get(&course.id) {
            if outline.version() == course.version {
                return Ok(Arc::clone(outline));
            }
        }
        let outline = Arc::new(CourseOutline::build(course)?);
        tracing::debug!(
            course_id = %course.id,
            version = course.version,
            modules = outline.len(),
            "built course outline"
        );
        self.outlines.insert(course.id.clone(), Arc::clone(&outline));
        Ok(outline)
    }

    pub fn len(&self) -> usize {
        self.outlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outlines.is_empty()
    }
}
