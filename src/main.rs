use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use covagg::ablation::AblationVariants;
use covagg::artifact::{ArtifactPatterns, DEFAULT_COVERAGE_PATTERN, DEFAULT_INITIAL_PATTERN};
use covagg::cli::{self, Workspace};
use covagg::compare::{Level, VariantPair};
use covagg::logging;
use covagg::sink::CsvDirSink;

/// covagg: coverage aggregation and comparison across test-generator variants.
#[derive(Parser)]
#[command(name = "covagg", version, about)]
struct Cli {
    /// Root of the artifact store (<variant>/<project>/<file>/<function>/).
    #[arg(long, global = true, default_value = "ai_test_logs")]
    base_path: PathBuf,

    /// Directory the reports are written to.
    #[arg(long, global = true, default_value = "coverage_results")]
    output_dir: PathBuf,

    /// Regex matching the final coverage file name.
    #[arg(long, global = true, default_value = DEFAULT_COVERAGE_PATTERN)]
    coverage_pattern: String,

    /// Regex matching the first-iteration log file name.
    #[arg(long, global = true, default_value = DEFAULT_INITIAL_PATTERN)]
    initial_pattern: String,

    /// Only keep functions whose initial statement coverage is below 100%.
    #[arg(long, global = true)]
    important: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-function tables for every variant and project.
    Functions,

    /// Per-file averages for every variant.
    Files,

    /// Per-project averages for every variant.
    Projects,

    /// Compare two variants side by side.
    Compare {
        /// Comparison granularity.
        #[arg(long, value_enum, default_value = "function")]
        level: Level,

        /// First variant (default: no_reflect when both no_reflect and
        /// llm4cpp exist, else the first in sorted order).
        #[arg(long)]
        first: Option<String>,

        /// Second variant (default: llm4cpp when both exist, else the first
        /// other variant in sorted order).
        #[arg(long)]
        second: Option<String>,
    },

    /// Ablation tables relative to a full variant.
    Ablation {
        /// Variant with every capability enabled.
        #[arg(long, default_value = "llm4cpp")]
        full: String,

        /// First ablated variant.
        #[arg(long, default_value = "no_reflect")]
        without_x: String,

        /// Second ablated variant.
        #[arg(long, default_value = "no_context")]
        without_y: String,

        /// Row label for the first ablated variant.
        #[arg(long, default_value = "W/o reflect")]
        x_label: String,

        /// Row label for the second ablated variant.
        #[arg(long, default_value = "W/o context")]
        y_label: String,
    },

    /// List incomplete function folders and functions unique to one variant.
    Audit {
        /// First variant (default: llm4cpp when both llm4cpp and no_reflect
        /// exist, else the first in sorted order).
        #[arg(long)]
        first: Option<String>,

        /// Second variant (default: no_reflect when both exist, else the
        /// first other variant in sorted order).
        #[arg(long)]
        second: Option<String>,
    },

    /// Run every report with default settings.
    All {
        /// Variant compared first when both preferred variants exist.
        #[arg(long, default_value = "no_reflect")]
        prefer_first: String,

        /// Variant compared second when both preferred variants exist.
        #[arg(long, default_value = "llm4cpp")]
        prefer_second: String,
    },
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let patterns = ArtifactPatterns::new(&cli.coverage_pattern, &cli.initial_pattern)
        .context("Invalid artifact pattern")?;
    let ws = Workspace::load(&cli.base_path, &patterns, cli.important)?;
    let mut sink = CsvDirSink::new(&cli.output_dir).with_context(|| {
        format!("Failed to prepare output directory {}", cli.output_dir.display())
    })?;

    let output = match cli.command {
        Commands::Functions => cli::cmd_functions(&ws, &mut sink)?,
        Commands::Files => cli::cmd_files(&ws, &mut sink)?,
        Commands::Projects => cli::cmd_projects(&ws, &mut sink)?,
        Commands::Compare {
            level,
            first,
            second,
        } => cli::cmd_compare(
            &ws,
            &mut sink,
            level,
            first.as_deref(),
            second.as_deref(),
            &VariantPair::default(),
        )?,
        Commands::Ablation {
            full,
            without_x,
            without_y,
            x_label,
            y_label,
        } => {
            let variants = AblationVariants {
                full,
                without_x,
                without_y,
                x_label,
                y_label,
            };
            cli::cmd_ablation(&ws, &mut sink, &variants)?
        }
        Commands::Audit { first, second } => cli::cmd_audit(
            &ws,
            &mut sink,
            first.as_deref(),
            second.as_deref(),
            &VariantPair::default().reversed(),
        )?,
        Commands::All {
            prefer_first,
            prefer_second,
        } => {
            let preferred = VariantPair {
                first: prefer_first,
                second: prefer_second,
            };
            cli::cmd_all(&ws, &mut sink, &preferred)?
        }
    };
    print!("{output}");
    println!("Output directory: {}", sink.root().display());

    Ok(())
}
