//! # Clinical Summary CLI (`csum`)
//!
//! ## Usage
//!
//! ```bash
//! csum --config ./config/csum.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `csum run <id>` | Run the summary pipeline and write the patient's report |
//! | `csum similar <id>` | Find the most similar patient |
//! | `csum report <id>` | Print the sections of a saved report |
//!
//! Exit status of `run`: 0 on success, 2 when the patient is not in the
//! dataset, 1 when the run aborted.
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use clinical_summary::config;
use clinical_summary::dataset::Dataset;
use clinical_summary::embedding::create_provider;
use clinical_summary::models::canonical_id;
use clinical_summary::pipeline::{Pipeline, RunOutcome};
use clinical_summary::report::{read_report, SEGMENTS_MARKER};
use clinical_summary::similar::{find_similar, preview};

const PREVIEW_CHARS: usize = 2500;

/// Clinical Summary CLI: per-patient clinical summaries via
/// retrieval-augmented generation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/csum.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "csum",
    about = "Clinical Summary: per-patient clinical summaries from tabular records and notes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/csum.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the summary pipeline for one patient.
    ///
    /// Writes `output_informe_<id>.txt` into the configured output
    /// directory, replacing any previous report.
    Run {
        /// Patient identifier.
        patient_id: String,
    },

    /// Find the patient most similar to the given one.
    ///
    /// Embeds the aggregated text of every patient with clinical notes and
    /// prints the closest one with its cosine similarity.
    Similar {
        /// Patient identifier.
        patient_id: String,
    },

    /// Print the sections of a previously written report.
    Report {
        /// Patient identifier.
        patient_id: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("csum=info,clinical_summary=info,clinical_summary_core=info")
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Run { patient_id } => {
            let patient_id = canonical_id(&patient_id);
            let pipeline = Pipeline::from_config(cfg)?;
            match pipeline.run_pipeline(&patient_id).await {
                RunOutcome::Success { report_path } => {
                    println!("Report written: {}", report_path.display());
                    Ok(ExitCode::SUCCESS)
                }
                RunOutcome::PatientNotFound => {
                    println!("Patient {} not found.", patient_id);
                    Ok(ExitCode::from(2))
                }
                RunOutcome::Aborted { stage, error } => {
                    println!("Aborted at {}: {}", stage, error);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Similar { patient_id } => {
            let patient_id = canonical_id(&patient_id);
            let dataset = Dataset::load(&cfg.data.dir)?;
            let provider = create_provider(&cfg.embedding)?;
            let today = chrono::Local::now().date_naive();

            match find_similar(
                &dataset,
                provider.as_ref(),
                &patient_id,
                cfg.embedding.batch_size,
                today,
            )
            .await?
            {
                Some(found) => {
                    println!(
                        "Most similar patient to {}: {} ({:.2}%)",
                        patient_id,
                        found.neighbor.patient_id,
                        found.score_percent()
                    );
                    println!();
                    println!("--- Patient {} ---", patient_id);
                    println!("{}", preview(&found.query_text, PREVIEW_CHARS));
                    println!();
                    println!("--- Patient {} ---", found.neighbor.patient_id);
                    println!("{}", preview(&found.neighbor_text, PREVIEW_CHARS));
                }
                None => println!("No similar patient found for {}.", patient_id),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Report { patient_id } => {
            let patient_id = canonical_id(&patient_id);
            match read_report(&cfg.output.dir, &patient_id)? {
                Some(sections) => {
                    println!("DADES IDENTIFICATIVES\n{}\n", sections.identification);
                    println!("LÍNIA TEMPORAL D'EPISODIS\n{}\n", sections.timeline);
                    println!("RESUM CLÍNIC ESTRUCTURAT\n{}", sections.summary);
                    if !sections.segments.is_empty() {
                        println!("\n{}", SEGMENTS_MARKER);
                        for (i, segment) in sections.segments.iter().enumerate() {
                            println!("\nCHUNK {}:\n{}", i + 1, segment);
                        }
                    }
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    println!("No report found for patient {}.", patient_id);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
