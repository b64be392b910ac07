use clap::Parser;
use tracing_subscriber::EnvFilter;

use shogun::cli;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cli.log.filter()))
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Commands::Align(args) => cli::align::run_align(args)?,
        cli::Commands::Pipeline(args) => cli::align::run_pipeline(args)?,
        cli::Commands::Redistribute(args) => cli::redistribute::run(args)?,
        cli::Commands::Functional(args) => cli::functional::run_functional(args)?,
        cli::Commands::Normalize(args) => cli::functional::run_normalize(args)?,
        cli::Commands::Coverage(args) => cli::coverage::run(args)?,
        cli::Commands::AssignTaxonomy(args) => cli::assign::run(args)?,
    }

    Ok(())
}
