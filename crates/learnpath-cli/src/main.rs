use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "learnpath-cli", version, about = "Learnpath CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Course catalog and module outline
    Course {
        #[command(subcommand)]
        action: commands::course::CourseAction,
    },
    /// Student progress
    Progress {
        #[command(subcommand)]
        action: commands::progress::ProgressAction,
    },
    /// Quiz draw, submission and review
    Quiz {
        #[command(subcommand)]
        action: commands::quiz::QuizAction,
    },
    /// Engagement tracking sessions
    Study {
        #[command(subcommand)]
        action: commands::study::StudyAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Grade statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
}

fn init_tracing() {
    // Logs go to stderr so stdout stays machine-readable JSON.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("LEARNPATH_LOG").unwrap_or_else(|_| "learnpath=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Course { action } => commands::course::run(action),
        Commands::Progress { action } => commands::progress::run(action),
        Commands::Quiz { action } => commands::quiz::run(action),
        Commands::Study { action } => commands::study::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Stats { action } => commands::stats::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
