use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::cli::FineRank;
use crate::engine::coverage::{estimate_coverage_with, format_coverage, CoverageConfig};
use crate::model::metadata::Database;
use crate::model::shear::ConfusionModel;
use crate::parsing::alignment::{read_alignment, AlignmentFormat};
use crate::pipeline::write_atomic;
use crate::utils::paths::default_coverage_table;

#[derive(Args)]
pub struct CoverageArgs {
    /// The alignment (BURST .b6, UTree .tsv or Bowtie2 .sam)
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// The path to the folder containing the database
    #[arg(short, long, required = true)]
    pub database: PathBuf,

    /// The coverage table [default: coverage-YYMMDD.txt]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// The level to collapse to
    #[arg(short, long, value_enum, default_value = "strain")]
    pub level: FineRank,

    /// Genome bin size in base pairs
    #[arg(long, default_value = "100")]
    pub bin_size: u64,
}

/// Execute the coverage command
///
/// # Errors
///
/// Returns an error if the database, model or alignment cannot be loaded.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: CoverageArgs) -> anyhow::Result<()> {
    let output = args.output.unwrap_or_else(default_coverage_table);
    super::ensure_parent(&output)?;

    let database = Database::load(&args.database)?;
    let model = ConfusionModel::load(&database.shear_path()?)?;

    let format = AlignmentFormat::from_extension(&args.input).unwrap_or(AlignmentFormat::Blast6);
    let alignment = read_alignment(&args.input, format)?;
    info!(format = %format, hits = alignment.len(), "Loaded alignment");

    let config = CoverageConfig {
        bin_size: args.bin_size,
    };
    let table = estimate_coverage_with(&alignment, &model, args.level.into(), &config);
    write_atomic(&output, format_coverage(&table).as_bytes())?;
    info!(taxa = table.len(), path = %output.display(), "Wrote coverage table");
    Ok(())
}
