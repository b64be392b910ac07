//! # shogun
//!
//! Taxonomic and functional profiling of shallow shotgun metagenomes.
//!
//! Reads aligned against a reference database rarely land on a single
//! strain: many are only resolvable to a genus or family. `shogun` takes the
//! per-sample counts produced from those alignments and uses a precomputed
//! confusion ("shear") model of the database to push ambiguous counts down
//! to the requested rank, conserving every read.
//!
//! ## Features
//!
//! - **Redistribution**: collapse or expand a taxatable to any of the eight ranks
//! - **Coverage confidence**: how much of each reference genome was actually observed
//! - **Aligners**: BURST, UTree and Bowtie2 behind one [`aligners::Aligner`] trait
//! - **Functional profiling**: KEGG orthology abundances from genus, species or strain tables
//! - **Resumable pipeline**: completed stages are fingerprinted and skipped on re-runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use shogun::{redistribute, ConfusionModel, Database, TaxonomyRank};
//! use shogun::parsing::taxatable::{format_taxatable, read_taxatable};
//! use std::path::Path;
//!
//! let db = Database::load(Path::new("rep82")).unwrap();
//! let model = ConfusionModel::load(&db.shear_path().unwrap()).unwrap();
//!
//! let table = read_taxatable(Path::new("taxatable.burst.txt")).unwrap();
//! let species = redistribute(&table, &model, TaxonomyRank::Species);
//! print!("{}", format_taxatable(&species));
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Ranks, lineages and abundance tables
//! - [`model`]: Database metadata, confusion model and reference taxonomy
//! - [`parsing`]: Taxatable and alignment readers and writers
//! - [`engine`]: Redistribution, coverage, assignment and functional profiling
//! - [`aligners`]: External aligner processes
//! - [`pipeline`]: Staged, cached end-to-end runs
//! - [`cli`]: Command-line interface implementation

pub mod aligners;
pub mod cli;
pub mod core;
pub mod engine;
pub mod model;
pub mod parsing;
pub mod pipeline;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::lineage::Lineage;
pub use core::rank::{Level, TaxonomyRank};
pub use core::table::AbundanceTable;
pub use engine::coverage::{estimate_coverage, CoverageTable};
pub use engine::redistribute::{redistribute, FallbackPolicy, RedistributionConfig};
pub use model::metadata::Database;
pub use model::shear::ConfusionModel;
pub use pipeline::{Pipeline, PipelineConfig, PipelineError};
