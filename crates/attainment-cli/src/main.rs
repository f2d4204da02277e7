//! attainment CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "attainment", version, about = "Pupil progress scoring and reporting")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot JSON file (defaults to the config's `snapshot`, then ./attainment-snapshot.json)
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report on one unit for every assigned pupil, or for one pupil
    Report {
        /// Unit id
        #[arg(long)]
        unit: String,

        /// Restrict the report to one pupil
        #[arg(long)]
        pupil: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,

        /// Also save the JSON report to this path
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Report on one pupil across every unit of a subject
    Subject {
        /// Subject name
        #[arg(long)]
        subject: String,

        /// Pupil id
        #[arg(long)]
        pupil: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Record a teacher override for one pupil's activity
    Override {
        #[arg(long)]
        activity: String,

        #[arg(long)]
        pupil: String,

        /// Score in [0, 1]
        #[arg(long)]
        score: f64,

        /// Feedback text stored as teacher feedback on the activity
        #[arg(long)]
        feedback: Option<String>,

        /// Per-criterion score, e.g. "C1=0.5" (repeatable)
        #[arg(long = "criterion")]
        criteria: Vec<String>,
    },

    /// Clear a teacher override so the automatic score applies again
    Reset {
        #[arg(long)]
        activity: String,

        #[arg(long)]
        pupil: String,
    },

    /// Remove AI marker scores from every submission of an activity
    ClearAiMarks {
        #[arg(long)]
        activity: String,
    },

    /// Check a snapshot's references and submission bodies
    Validate {
        /// Exit with an error if any issue is found
        #[arg(long)]
        strict: bool,
    },

    /// Compare two saved unit reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Change in activities average that counts as movement
        #[arg(long, default_value = "0.05")]
        threshold: f64,

        /// Exit code 1 if any pupil declined
        #[arg(long)]
        fail_on_decline: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create a starter config and sample snapshot
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("attainment=info")),
        )
        .init();

    let cli = Cli::parse();
    let paths = commands::Paths {
        config: cli.config,
        snapshot: cli.snapshot,
    };

    let result = match cli.command {
        Commands::Report {
            unit,
            pupil,
            format,
            output,
        } => commands::report::execute(&paths, unit, pupil, format, output).await,
        Commands::Subject {
            subject,
            pupil,
            format,
        } => commands::subject::execute(&paths, subject, pupil, format).await,
        Commands::Override {
            activity,
            pupil,
            score,
            feedback,
            criteria,
        } => {
            commands::mutate::override_score(&paths, activity, pupil, score, feedback, criteria)
                .await
        }
        Commands::Reset { activity, pupil } => {
            commands::mutate::reset(&paths, activity, pupil).await
        }
        Commands::ClearAiMarks { activity } => {
            commands::mutate::clear_ai_marks(&paths, activity).await
        }
        Commands::Validate { strict } => commands::validate::execute(&paths, strict),
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_decline,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_decline, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
