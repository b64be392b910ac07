//! Command-line interface for shogun.
//!
//! Available commands:
//!
//! - **align**: Run one or all aligners over combined reads
//! - **pipeline**: Align, redistribute and profile functions in one go
//! - **redistribute**: Collapse a taxatable to a rank using the confusion model
//! - **functional**: Predict KEGG orthology abundances from a taxatable
//! - **normalize**: Rescale a taxatable to the median sample depth
//! - **coverage**: Score how completely each taxon's genomes were observed
//! - **assign-taxonomy**: Turn an existing alignment into a taxatable
//!
//! ## Usage
//!
//! ```text
//! # Full pipeline with BURST, collapsing to species
//! shogun pipeline -i combined_seqs.fna -d rep82 -o results -l species
//!
//! # Re-run only the redistribution on an existing taxatable
//! shogun redistribute -i taxatable.burst.txt -d rep82 -l all -o out/taxatable.all.txt
//!
//! # Coverage confidence from a BURST alignment
//! shogun --log info coverage -i alignment.burst.b6 -d rep82 -l genus
//! ```

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::core::rank::TaxonomyRank;

pub mod align;
pub mod assign;
pub mod coverage;
pub mod functional;
pub mod redistribute;

#[derive(Parser)]
#[command(name = "shogun")]
#[command(author = "Knights Lab")]
#[command(version)]
#[command(about = "Taxonomic and functional profiling of shallow shotgun metagenomes")]
#[command(
    long_about = "shogun aligns combined reads against a reference database, assigns them to taxa and redistributes ambiguous assignments to a requested rank using a precomputed confusion model.\n\nOutputs are per-sample taxatables, optional KEGG functional profiles and coverage confidence tables."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// The log level to record
    #[arg(long, global = true, value_enum, default_value = "warning")]
    pub log: LogLevel,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a SHOGUN alignment algorithm
    Align(align::AlignArgs),

    /// Run the SHOGUN pipeline, including taxonomic and functional profiling
    Pipeline(align::PipelineArgs),

    /// Run the SHOGUN redistribution algorithm on a taxonomic profile
    Redistribute(redistribute::RedistributeArgs),

    /// Run the SHOGUN functional algorithm on a taxonomic profile
    Functional(functional::FunctionalArgs),

    /// Normalize a taxonomic profile by median depth
    Normalize(functional::NormalizeArgs),

    /// Show confidence of coverage of microbes
    Coverage(coverage::CoverageArgs),

    /// Run the SHOGUN taxonomic profile algorithm on an alignment output
    AssignTaxonomy(assign::AssignTaxonomyArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Critical,
}

impl LogLevel {
    /// `EnvFilter` directives for this level
    #[must_use]
    pub fn filter(self) -> &'static str {
        match self {
            Self::Debug => "shogun=debug,info",
            Self::Info => "shogun=info",
            Self::Warning => "shogun=warn",
            Self::Critical => "shogun=error",
        }
    }
}

/// Ranks fine enough for functional profiling and coverage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FineRank {
    Genus,
    Species,
    #[default]
    Strain,
}

impl From<FineRank> for TaxonomyRank {
    fn from(rank: FineRank) -> Self {
        match rank {
            FineRank::Genus => Self::Genus,
            FineRank::Species => Self::Species,
            FineRank::Strain => Self::Strain,
        }
    }
}

/// Create the directory an output file will be written into
pub(crate) fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }
    Ok(())
}
