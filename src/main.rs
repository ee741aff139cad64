//! # eCFR Analyzer CLI (`ecfr`)
//!
//! Commands for loading the Electronic Code of Federal Regulations into
//! local SQLite databases and analyzing the result.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ecfr init` | Create both SQLite databases and their schemas |
//! | `ecfr load` | Full refresh: agencies, titles, word counts, versions, chapter index |
//! | `ecfr similar` | Rank cross-title near-duplicate chapters |
//! | `ecfr stats` | Row counts and vector coverage |
//! | `ecfr report word-counts` | Word counts by title, chapter, and agency |
//! | `ecfr report versions` | Version-history summaries per title |
//! | `ecfr structure <title>` | Summarize a title's structure tree |

mod api;
mod chunk;
mod config;
mod db;
mod embedding;
mod index;
mod load;
mod migrate;
mod models;
mod report;
mod similar;
mod stats;
mod wordcount;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// eCFR Analyzer — ingest the Electronic Code of Federal Regulations and
/// analyze word counts, revision history, and cross-title redundancy.
#[derive(Parser)]
#[command(
    name = "ecfr",
    about = "eCFR Analyzer — ingestion and analysis for the Electronic Code of Federal Regulations",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ecfr.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize both databases (relational + vector store). Idempotent.
    Init,

    /// Run a full data refresh from the eCFR API.
    ///
    /// Clears the vector store, then rebuilds all five relational tables
    /// inside one transaction. On any failure the tables roll back to their
    /// previous contents; the vector-store clear is not transactional.
    Load,

    /// Find the most similar cross-title chapter pairs.
    ///
    /// Compares every stored chapter embedding against the rest of the
    /// corpus and prints the strongest cross-title pairs side by side.
    Similar,

    /// Show row counts and vector-store coverage.
    Stats,

    /// Reporting views over the loaded data.
    Report {
        #[command(subcommand)]
        view: ReportView,
    },

    /// Fetch and summarize the JSON structure tree for a title.
    Structure {
        /// Title number.
        title: i64,
    },
}

#[derive(Subcommand)]
enum ReportView {
    /// Word counts by title and chapter.
    WordCounts {
        /// Also aggregate word counts per agency via CFR references.
        #[arg(long)]
        by_agency: bool,
    },

    /// Version-history summary per title.
    Versions {
        /// Restrict to one title number.
        #[arg(long)]
        title: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Databases initialized successfully.");
        }
        Commands::Load => {
            load::run_load(&cfg).await?;
        }
        Commands::Similar => {
            similar::run_similar(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Report { view } => match view {
            ReportView::WordCounts { by_agency } => {
                report::run_word_counts(&cfg, by_agency).await?;
            }
            ReportView::Versions { title } => {
                report::run_versions(&cfg, title).await?;
            }
        },
        Commands::Structure { title } => {
            report::run_structure(&cfg, title).await?;
        }
    }

    Ok(())
}
