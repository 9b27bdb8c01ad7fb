use clap::Subcommand;
use learnpath_core::{Answers, Config, QuizMode, Role, SessionContext};
use rand::SeedableRng;
use rand_pcg::Mcg128Xsl64;

use super::{open_service, print_json, CmdResult};

#[derive(Subcommand)]
pub enum QuizAction {
    /// Draw a question sample for a module
    Draw {
        #[arg(long)]
        student: String,
        #[arg(long)]
        module: String,
        /// standard | fast-track
        #[arg(long, default_value = "standard")]
        mode: QuizMode,
        /// Seed for a reproducible sample
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "student")]
        role: Role,
    },
    /// Grade answers for a drawn sample
    Submit {
        #[arg(long)]
        student: String,
        #[arg(long)]
        module: String,
        #[arg(long, default_value = "standard")]
        mode: QuizMode,
        /// Question IDs of the sample, comma-separated
        #[arg(long, value_delimiter = ',', required = true)]
        questions: Vec<String>,
        /// Answers as QUESTION=OPTION pairs, comma-separated (options are 0-3)
        #[arg(long, value_delimiter = ',')]
        answers: Vec<String>,
        #[arg(long, default_value = "student")]
        role: Role,
    },
    /// Show a passed module's questions with the answers revealed
    Review {
        #[arg(long)]
        student: String,
        #[arg(long)]
        module: String,
    },
}

fn parse_answers(pairs: &[String]) -> Result<Answers, Box<dyn std::error::Error>> {
    let mut answers = Answers::new();
    for pair in pairs {
        let (question, option) = pair
            .split_once('=')
            .ok_or_else(|| format!("answer must be QUESTION=OPTION, got '{pair}'"))?;
        let option: usize = option
            .trim()
            .parse()
            .map_err(|_| format!("option for '{question}' is not a number: '{option}'"))?;
        answers.insert(question.trim().to_string(), option);
    }
    Ok(answers)
}

pub fn run(action: QuizAction) -> CmdResult {
    let mut service = open_service(&Config::load()?)?;
    match action {
        QuizAction::Draw {
            student,
            module,
            mode,
            seed,
            role,
        } => {
            let ctx = SessionContext::with_role(student, role);
            let draw = match seed {
                Some(seed) => {
                    let mut rng = Mcg128Xsl64::seed_from_u64(seed);
                    service.draw_quiz(&ctx, &module, mode, &mut rng)?
                }
                None => service.draw_quiz(&ctx, &module, mode, &mut rand::thread_rng())?,
            };
            print_json(&draw)?;
        }
        QuizAction::Submit {
            student,
            module,
            mode,
            questions,
            answers,
            role,
        } => {
            let ctx = SessionContext::with_role(student, role);
            let answers = parse_answers(&answers)?;
            let result = service.submit_quiz_attempt(&ctx, &module, mode, &questions, &answers)?;
            print_json(&result)?;
        }
        QuizAction::Review { student, module } => {
            let ctx = SessionContext::student(student);
            print_json(&service.review_quiz(&ctx, &module)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_answer_pairs() {
        let answers = parse_answers(&["q1=0".into(), " q2 = 3".into()]).unwrap();
        assert_eq!(answers.get("q1"), Some(&0));
        assert_eq!(answers.get("q2"), Some(&3));
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert!(parse_answers(&["q1".into()]).is_err());
        assert!(parse_answers(&["q1=x".into()]).is_err());
    }
}
