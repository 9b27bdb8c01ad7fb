use std::path::PathBuf;

use clap::Subcommand;
use learnpath_core::{Config, Course, CourseOutline, Role, SessionContext};
use serde::Serialize;

use super::{courses_dir, load_catalog, open_service, print_json, CmdResult};

#[derive(Subcommand)]
pub enum CourseAction {
    /// Install a course document (JSON) into the data directory
    Import {
        /// Path to the course JSON file
        file: PathBuf,
    },
    /// List installed courses
    List,
    /// Show a course outline in gate order
    Show {
        /// Course ID
        course_id: String,
    },
    /// Lock state of every module for a caller
    Modules {
        /// Course ID
        course_id: String,
        #[arg(long)]
        student: String,
        /// student | instructor | administrator
        #[arg(long, default_value = "student")]
        role: Role,
    },
}

#[derive(Serialize)]
struct CourseSummary<'a> {
    id: &'a str,
    title: &'a str,
    version: u64,
    modules: usize,
    contents: usize,
}

#[derive(Serialize)]
struct OutlineEntry<'a> {
    index: usize,
    module_id: &'a str,
    title: &'a str,
    contents: usize,
    questions: usize,
    passing_score: u32,
    fast_track_score: u32,
}

fn summary(course: &Course) -> CourseSummary<'_> {
    CourseSummary {
        id: &course.id,
        title: &course.title,
        version: course.version,
        modules: course.modules().count(),
        contents: course.contents().count(),
    }
}

pub fn run(action: CourseAction) -> CmdResult {
    match action {
        CourseAction::Import { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let course: Course = serde_json::from_str(&raw)?;
            // Reject malformed outlines before they reach the catalog.
            CourseOutline::build(&course)?;
            let target = courses_dir()?.join(format!("{}.json", course.id));
            std::fs::write(&target, raw)?;
            tracing::info!(course_id = %course.id, path = %target.display(), "course imported");
            print_json(&summary(&course))?;
        }
        CourseAction::List => {
            let catalog = load_catalog()?;
            let courses: Vec<_> = catalog.courses().map(summary).collect();
            print_json(&courses)?;
        }
        CourseAction::Show { course_id } => {
            let catalog = load_catalog()?;
            let outline = CourseOutline::build(catalog.course(&course_id)?)?;
            let entries: Vec<_> = outline
                .modules()
                .iter()
                .enumerate()
                .map(|(index, m)| OutlineEntry {
                    index,
                    module_id: &m.id,
                    title: &m.title,
                    contents: m.contents.len(),
                    questions: m.question_bank.len(),
                    passing_score: m.passing_score,
                    fast_track_score: m.fast_track_score,
                })
                .collect();
            print_json(&entries)?;
        }
        CourseAction::Modules {
            course_id,
            student,
            role,
        } => {
            let mut service = open_service(&Config::load()?)?;
            let ctx = SessionContext::with_role(student, role);
            print_json(&service.module_states(&ctx, &course_id)?)?;
        }
    }
    Ok(())
}
