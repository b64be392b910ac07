//! The end-to-end SHOGUN pipeline: align, assign, redistribute, profile.
//!
//! ```text
//! NotStarted ──align, assign──▶ Aligned ──redistribute──▶ Redistributed ──function──▶ FunctionProfiled ──▶ Done
//!                                  ▲                            │
//!                                  └──────── next aligner ──────┘   (aligner = all)
//! ```
//!
//! Every stage writes its outputs atomically and records a fingerprint of
//! its inputs in `.shogun-cache.json`, so re-running the pipeline over the
//! same inputs skips completed stages.

use std::path::PathBuf;

use thiserror::Error;

use crate::aligners::AlignerError;
use crate::model::metadata::MetadataError;
use crate::model::shear::ModelError;
use crate::parsing::ParseError;

pub mod artifact;
pub mod orchestrator;

pub use artifact::{fingerprint, write_atomic, ArtifactCache, ArtifactStatus, MANIFEST_FILE};
pub use orchestrator::{
    function_to_files, level_outputs, redistribute_to_files, Pipeline, PipelineConfig,
    PipelineReport, PipelineState,
};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Output {} is claimed by more than one stage", path.display())]
    ArtifactConflict { path: PathBuf },

    #[error("Input {} does not exist", .0.display())]
    MissingInput(PathBuf),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Aligner(#[from] AlignerError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
