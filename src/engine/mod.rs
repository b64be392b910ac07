//! Redistribution, coverage and profiling algorithms.
//!
//! Everything here is pure: functions take borrowed tables and models and
//! return new values, so callers are free to run them in parallel over a
//! shared `Arc<ConfusionModel>`.
//!
//! ## Redistribution
//!
//! Counts are moved to a target rank in one of three ways:
//!
//! | Source row | Result |
//! |------------|--------|
//! | At or below the target | Aggregated onto its ancestor at the target |
//! | Above the target, known to the model | Split by the model's weights |
//! | Above the target, unknown to the model | [`FallbackPolicy`] |
//!
//! ## Example
//!
//! ```rust,no_run
//! use shogun::core::TaxonomyRank;
//! use shogun::engine::redistribute;
//! use shogun::model::ConfusionModel;
//! use shogun::parsing::taxatable::read_taxatable;
//! use std::path::Path;
//!
//! let model = ConfusionModel::load(Path::new("rep82/sheared_bayes.txt")).unwrap();
//! let table = read_taxatable(Path::new("taxatable.burst.txt")).unwrap();
//! let species = redistribute(&table, &model, TaxonomyRank::Species);
//! println!("{} species", species.len());
//! ```

pub mod apportion;
pub mod assign;
pub mod coverage;
pub mod function;
pub mod normalize;
pub mod redistribute;

pub use apportion::{apportion, apportion_among};
pub use assign::{assign_taxonomy, AssignmentMode};
pub use coverage::{
    estimate_coverage, estimate_coverage_with, format_coverage, CoverageConfig, CoverageRow,
    CoverageTable,
};
pub use function::{format_function_profile, profile_functions, FunctionDatabase, FunctionProfile};
pub use normalize::{median_depth, normalize_by_median_depth};
pub use redistribute::{redistribute, redistribute_with, FallbackPolicy, RedistributionConfig};
