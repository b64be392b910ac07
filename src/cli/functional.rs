//! `functional` and `normalize` commands.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::cli::FineRank;
use crate::engine::function::FunctionDatabase;
use crate::engine::normalize::{median_depth, normalize_by_median_depth};
use crate::model::metadata::Database;
use crate::parsing::taxatable::{format_taxatable, read_taxatable};
use crate::pipeline::{function_to_files, write_atomic};
use crate::utils::paths::{default_normalized_taxatable, default_results_dir};

#[derive(Args)]
pub struct FunctionalArgs {
    /// The taxatable
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// The path to the folder containing the database
    #[arg(short, long, required = true)]
    pub database: PathBuf,

    /// The output folder [default: results-YYMMDD]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// The level to collapse to
    #[arg(short, long, value_enum, default_value = "strain")]
    pub level: FineRank,
}

/// Execute the functional command
///
/// Writes `<stem>.normalized.txt` and `<stem>.kegg.txt` into the output folder.
///
/// # Errors
///
/// Returns an error if the database has no function file or an input cannot be read.
#[allow(clippy::needless_pass_by_value)]
pub fn run_functional(args: FunctionalArgs) -> anyhow::Result<()> {
    let output = args.output.unwrap_or_else(default_results_dir);
    std::fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    let database = Database::load(&args.database)?;
    let function_path = database.function_path()?;
    info!(path = %function_path.display(), "Loading the functional database");
    let db = FunctionDatabase::load(&function_path)?;

    if let Some((normalized, kegg)) = function_to_files(&args.input, &db, args.level.into(), &output)? {
        println!("{}", normalized.display());
        println!("{}", kegg.display());
    }
    Ok(())
}

#[derive(Args)]
pub struct NormalizeArgs {
    /// The taxatable to normalize
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// The normalized taxatable [default: taxatable.normalized-YYMMDD.txt]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the normalize command
///
/// # Errors
///
/// Returns an error if the taxatable cannot be read or the output cannot be written.
#[allow(clippy::needless_pass_by_value)]
pub fn run_normalize(args: NormalizeArgs) -> anyhow::Result<()> {
    let output = args.output.unwrap_or_else(default_normalized_taxatable);
    super::ensure_parent(&output)?;

    let table = read_taxatable(&args.input)?;
    let normalized = normalize_by_median_depth(&table);
    info!(median = median_depth(&table), rows = normalized.len(), "Normalized by median depth");
    write_atomic(&output, format_taxatable(&normalized).as_bytes())?;
    Ok(())
}
