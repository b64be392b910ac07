use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::core::rank::{Level, RankError};
use crate::engine::redistribute::{FallbackPolicy, RedistributionConfig};
use crate::model::metadata::Database;
use crate::model::shear::ConfusionModel;
use crate::parsing::taxatable::read_taxatable;
use crate::pipeline::redistribute_to_files;
use crate::utils::paths::default_taxatable;

/// Same as [`Level`] parsing, minus `off`
fn parse_redistribute_level(s: &str) -> Result<Level, RankError> {
    match s.parse()? {
        Level::Off => Err(RankError::Invalid(s.to_string())),
        level => Ok(level),
    }
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum FallbackArg {
    /// Keep counts the model cannot split on their original taxon
    #[default]
    Retain,
    /// Move them to an explicit unclassified row
    Unclassified,
}

impl From<FallbackArg> for FallbackPolicy {
    fn from(arg: FallbackArg) -> Self {
        match arg {
            FallbackArg::Retain => Self::Retain,
            FallbackArg::Unclassified => Self::Unclassified,
        }
    }
}

#[derive(Args)]
pub struct RedistributeArgs {
    /// The taxatable
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// The path to the database folder
    #[arg(short, long, required = true)]
    pub database: PathBuf,

    /// The level to collapse to (kingdom..strain or all)
    #[arg(short, long, default_value = "strain", value_parser = parse_redistribute_level)]
    pub level: Level,

    /// The output file [default: taxatable-YYMMDD.txt]; with `-l all` the
    /// rank is inserted before the extension
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// What to do with counts the confusion model cannot split
    #[arg(long, value_enum, default_value = "retain")]
    pub fallback: FallbackArg,
}

/// Execute the redistribute command
///
/// # Errors
///
/// Returns an error if the database, model or taxatable cannot be loaded, or
/// an output cannot be written.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: RedistributeArgs) -> anyhow::Result<()> {
    let output = args.output.unwrap_or_else(default_taxatable);
    super::ensure_parent(&output)?;

    let database = Database::load(&args.database)?;
    let model = ConfusionModel::load(&database.shear_path()?)?;
    info!(references = model.len(), "Loaded confusion model");

    let table = read_taxatable(&args.input)?;
    info!(
        path = %args.input.display(),
        rows = table.len(),
        samples = table.samples().len(),
        "Beginning redistribution"
    );

    let config = RedistributionConfig {
        fallback: args.fallback.into(),
    };
    let written = redistribute_to_files(&table, &model, args.level, &output, &config)?;
    for (_, path) in &written {
        println!("{}", path.display());
    }
    Ok(())
}
