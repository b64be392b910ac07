//! Small helpers shared by the pipeline and the CLI.

pub mod paths;
