use clap::Subcommand;
use learnpath_core::{Config, SessionContext};

use super::{open_service, print_json, CmdResult};

#[derive(Subcommand)]
pub enum ProgressAction {
    /// Show a student's progress in a course
    Show {
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
    },
    /// Report engagement for one content item
    Report {
        #[arg(long)]
        student: String,
        #[arg(long)]
        content: String,
        /// Focused seconds so far
        #[arg(long)]
        seconds: u64,
        /// Mark the item completed
        #[arg(long)]
        completed: bool,
    },
}

pub fn run(action: ProgressAction) -> CmdResult {
    let mut service = open_service(&Config::load()?)?;
    match action {
        ProgressAction::Show { student, course } => {
            print_json(&service.get_student_progress(&student, &course)?)?;
        }
        ProgressAction::Report {
            student,
            content,
            seconds,
            completed,
        } => {
            let ctx = SessionContext::student(student);
            let ack = service.report_content_progress(&ctx, &content, seconds, completed)?;
            print_json(&ack)?;
        }
    }
    Ok(())
}
