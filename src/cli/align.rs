//! `align` and `pipeline` commands.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::aligners::{build_aligner, default_threads, AlignerChoice, AlignerConfig};
use crate::core::rank::Level;
use crate::model::metadata::Database;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::utils::paths::default_results_dir;

#[derive(Args)]
pub struct AlignArgs {
    /// The aligner to use (burst, burst-tax, utree, bowtie2 or all)
    #[arg(short, long, default_value = "burst")]
    pub aligner: AlignerChoice,

    /// The file containing the combined seqs
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// The path to the database folder
    #[arg(short, long, default_value = ".")]
    pub database: PathBuf,

    /// The output folder directory [default: results-YYMMDD]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of threads to use [default: all cores]
    #[arg(short, long)]
    pub threads: Option<usize>,
}

/// Execute the align command
///
/// Runs each selected aligner into the output directory without assigning
/// taxonomy.
///
/// # Errors
///
/// Returns an error if the database cannot be loaded or an aligner fails.
#[allow(clippy::needless_pass_by_value)]
pub fn run_align(args: AlignArgs) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    let output = args.output.unwrap_or_else(default_results_dir);
    std::fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    let database = Database::load(&args.database)?;
    let config = AlignerConfig {
        threads: args.threads.unwrap_or_else(default_threads),
        ..AlignerConfig::new(database)
    };

    for kind in args.aligner.kinds() {
        let aligner = build_aligner(kind, &config);
        let artifact = aligner.align(&args.input, &output)?;
        info!(aligner = aligner.name(), path = %artifact.display(), "Alignment complete");
        println!("{}", artifact.display());
    }
    Ok(())
}

#[derive(Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct PipelineArgs {
    /// The aligner to use (burst is capitalist, use burst-tax to redistribute BURST hits)
    #[arg(short, long, default_value = "burst")]
    pub aligner: AlignerChoice,

    /// The file containing the combined seqs
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// The path to the database folder
    #[arg(short, long, default_value = ".")]
    pub database: PathBuf,

    /// The output folder directory [default: results-YYMMDD]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// The level to collapse taxatables and functions to (kingdom..strain, all or off)
    #[arg(short, long, default_value = "strain")]
    pub level: Level,

    /// Run functional profiling (normalizes the taxatable by median depth)
    #[arg(long = "function", overrides_with = "no_function")]
    pub function_flag: bool,

    /// Skip functional profiling
    #[arg(long, overrides_with = "function_flag")]
    pub no_function: bool,

    /// Let BURST pick a single taxon per read
    #[arg(long = "capitalist", overrides_with = "no_capitalist")]
    pub capitalist_flag: bool,

    /// Assign BURST reads by LCA over all hits
    #[arg(long, overrides_with = "capitalist_flag")]
    pub no_capitalist: bool,

    /// Number of threads to use [default: all cores]
    #[arg(short, long)]
    pub threads: Option<usize>,
}

impl PipelineArgs {
    #[must_use]
    pub fn function(&self) -> bool {
        !self.no_function
    }

    #[must_use]
    pub fn capitalist(&self) -> bool {
        !self.no_capitalist
    }
}

/// Execute the pipeline command
///
/// # Errors
///
/// Returns the error of the first stage that fails.
#[allow(clippy::needless_pass_by_value)]
pub fn run_pipeline(args: PipelineArgs) -> anyhow::Result<()> {
    let output = args.output.clone().unwrap_or_else(default_results_dir);
    let mut config = PipelineConfig::new(&args.input, &args.database, output);
    config.aligner = args.aligner;
    config.level = args.level;
    config.function = args.function();
    config.capitalist = args.capitalist();
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    let report = Pipeline::new(config)?.run()?;
    info!(
        state = %report.state,
        executed = ?report.executed,
        skipped = ?report.skipped,
        "Pipeline report"
    );
    for path in &report.outputs {
        println!("{}", path.display());
    }
    Ok(())
}
