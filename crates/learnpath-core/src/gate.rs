//! Module lock/unlock policy.
//!
//! A module is open to a student when it is first in the outline or when the
//! module right before it has a passing completion. Instructors and
//! administrators bypass the gate; authorization itself happens upstream.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::course::CourseOutline;
use crate::error::{require_id, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Administrator,
}

impl Role {
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Instructor | Role::Administrator)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" | "teacher" => Ok(Role::Instructor),
            "administrator" | "admin" => Ok(Role::Administrator),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Caller identity passed into every service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub student_id: String,
    pub role: Role,
}

impl SessionContext {
    pub fn student(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            role: Role::Student,
        }
    }

    pub fn with_role(student_id: impl Into<String>, role: Role) -> Self {
        Self {
            student_id: student_id.into(),
            role,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_id("student_id", &self.student_id)?;
        Ok(())
    }
}

/// Lock state of one module, for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleLockState {
    pub module_id: String,
    pub index: usize,
    pub locked: bool,
    pub completed: bool,
}

pub struct ModuleGate;

impl ModuleGate {
    /// Whether `module_id` is locked for a caller with `role`.
    ///
    /// # Errors
    /// Returns `NotFound` if the module is not in the outline.
    pub fn is_locked(
        outline: &CourseOutline,
        module_id: &str,
        completed_module_ids: &HashSet<String>,
        role: Role,
    ) -> Result<bool> {
        let index = outline.index_of(module_id)?;
        if role.is_elevated() {
            return Ok(false);
        }
        Ok(Self::locked_at(outline, index, completed_module_ids))
    }

    fn locked_at(outline: &CourseOutline, index: usize, completed: &HashSet<String>) -> bool {
        if index == 0 {
            return false;
        }
        outline
            .get(index - 1)
            .map_or(true, |prev| !completed.contains(&prev.id))
    }

    /// Lock state for every module in outline order.
    pub fn lock_states(
        outline: &CourseOutline,
        completed_module_ids: &HashSet<String>,
        role: Role,
    ) -> Vec<ModuleLockState> {
        outline
            .modules()
            .iter()
            .enumerate()
            .map(|(index, module)| ModuleLockState {
                module_id: module.id.clone(),
                index,
                locked: !role.is_elevated() && Self::locked_at(outline, index, completed_module_ids),
                completed: completed_module_ids.contains(&module.id),
            })
            .collect()
    }

    /// The module that a pass on `module_id` opens, if there is one.
    pub fn unlocked_by<'a>(outline: &'a CourseOutline, module_id: &str) -> Result<Option<&'a str>> {
        let index = outline.index_of(module_id)?;
        Ok(outline.get(index + 1).map(|m| m.id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::{Chapter, Course, Module};
    use crate::error::CoreError;
    use proptest::prelude::*;

    fn outline(n: usize) -> CourseOutline {
        let modules = (0..n).map(|i| Module::new(format!("m{i}"))).collect();
        let course = Course {
            id: "c".into(),
            title: String::new(),
            version: 0,
            chapters: vec![Chapter {
                id: "ch".into(),
                title: String::new(),
                modules,
            }],
        };
        CourseOutline::build(&course).unwrap()
    }

    fn completed(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn second_module_opens_after_first_completes() {
        let o = outline(3);
        assert!(ModuleGate::is_locked(&o, "m1", &completed(&[]), Role::Student).unwrap());
        assert!(!ModuleGate::is_locked(&o, "m1", &completed(&["m0"]), Role::Student).unwrap());
        // Completion two steps back does not open m2.
        assert!(ModuleGate::is_locked(&o, "m2", &completed(&["m0"]), Role::Student).unwrap());
    }

    #[test]
    fn elevated_roles_bypass() {
        let o = outline(3);
        assert!(!ModuleGate::is_locked(&o, "m2", &completed(&[]), Role::Instructor).unwrap());
        assert!(!ModuleGate::is_locked(&o, "m2", &completed(&[]), Role::Administrator).unwrap());
    }

    #[test]
    fn unknown_module_errors() {
        let o = outline(2);
        let err = ModuleGate::is_locked(&o, "zz", &completed(&[]), Role::Student).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn lock_states_and_next_module() {
        let o = outline(3);
        let states = ModuleGate::lock_states(&o, &completed(&["m0"]), Role::Student);
        let locked: Vec<_> = states.iter().map(|s| s.locked).collect();
        assert_eq!(locked, [false, false, true]);
        assert!(states[0].completed);
        assert_eq!(ModuleGate::unlocked_by(&o, "m0").unwrap(), Some("m1"));
        assert_eq!(ModuleGate::unlocked_by(&o, "m2").unwrap(), None);
    }

    #[test]
    fn role_parses_aliases() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Administrator);
        assert_eq!("Teacher".parse::<Role>().unwrap(), Role::Instructor);
        assert!("guest".parse::<Role>().is_err());
    }

    proptest! {
        #[test]
        fn first_module_never_locked(mask in proptest::collection::vec(any::<bool>(), 1..12)) {
            let o = outline(mask.len());
            let done: HashSet<String> = mask
                .iter()
                .enumerate()
                .filter(|(_, d)| **d)
                .map(|(i, _)| format!("m{i}"))
                .collect();
            prop_assert!(!ModuleGate::is_locked(&o, "m0", &done, Role::Student).unwrap());
        }

        #[test]
        fn locked_iff_predecessor_incomplete(mask in proptest::collection::vec(any::<bool>(), 2..12)) {
            let o = outline(mask.len());
            let done: HashSet<String> = mask
                .iter()
                .enumerate()
                .filter(|(_, d)| **d)
                .map(|(i, _)| format!("m{i}"))
                .collect();
            for i in 1..mask.len() {
                let locked = ModuleGate::is_locked(&o, &format!("m{i}"), &done, Role::Student).unwrap();
                prop_assert_eq!(locked, !done.contains(&format!("m{}", i - 1)));
            }
        }
    }
}
