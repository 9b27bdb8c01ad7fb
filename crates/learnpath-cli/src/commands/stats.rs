use clap::Subcommand;
use learnpath_core::Config;

use super::{open_service, print_json, CmdResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Quiz scores per module with average, highest and lowest
    Grades {
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
    },
}

pub fn run(action: StatsAction) -> CmdResult {
    let mut service = open_service(&Config::load()?)?;

    match action {
        StatsAction::Grades { student, course } => {
            print_json(&service.grade_summary(&student, &course)?)?;
        }
    }
    Ok(())
}
