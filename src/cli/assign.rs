use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::aligners::{build_aligner, AlignerConfig, AlignerKind};
use crate::model::metadata::Database;
use crate::parsing::taxatable::format_taxatable;
use crate::pipeline::write_atomic;
use crate::utils::paths::default_taxatable;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum AssignAligner {
    /// Guess from the file extension
    #[default]
    Auto,
    Burst,
    BurstTax,
    Utree,
    Bowtie2,
}

impl AssignAligner {
    /// The aligner that produced `input`
    fn resolve(self, input: &std::path::Path) -> AlignerKind {
        match self {
            Self::Auto => AlignerKind::sniff(input),
            Self::Burst => AlignerKind::Burst,
            Self::BurstTax => AlignerKind::BurstTax,
            Self::Utree => AlignerKind::Utree,
            Self::Bowtie2 => AlignerKind::Bowtie2,
        }
    }
}

#[derive(Args)]
pub struct AssignTaxonomyArgs {
    /// The aligner that produced the alignment
    #[arg(short, long, value_enum, default_value = "auto")]
    pub aligner: AssignAligner,

    /// Take BURST's own assignment per read
    #[arg(long = "capitalist", overrides_with = "no_capitalist")]
    pub capitalist_flag: bool,

    /// Assign BURST reads by LCA over all hits
    #[arg(long, overrides_with = "capitalist_flag")]
    pub no_capitalist: bool,

    /// The alignment output file
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// The path to the database folder
    #[arg(short, long, default_value = ".")]
    pub database: PathBuf,

    /// The taxatable [default: taxatable-YYMMDD.txt]
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl AssignTaxonomyArgs {
    #[must_use]
    pub fn capitalist(&self) -> bool {
        !self.no_capitalist
    }
}

/// Execute the assign-taxonomy command
///
/// # Errors
///
/// Returns an error if the database or alignment cannot be loaded.
#[allow(clippy::needless_pass_by_value)]
pub fn run(args: AssignTaxonomyArgs) -> anyhow::Result<()> {
    let output = args.output.clone().unwrap_or_else(default_taxatable);
    super::ensure_parent(&output)?;

    let kind = args.aligner.resolve(&args.input);
    let database = Database::load(&args.database)?;
    let config = AlignerConfig {
        capitalist: args.capitalist(),
        ..AlignerConfig::new(database)
    };
    let aligner = build_aligner(kind, &config);
    info!(aligner = %kind, input = %args.input.display(), "Assigning taxonomy");

    let table = aligner.post_align(&args.input)?;
    write_atomic(&output, format_taxatable(&table).as_bytes())?;
    info!(rows = table.len(), samples = table.samples().len(), path = %output.display(), "Wrote taxatable");
    Ok(())
}
