//! External aligners behind a uniform capability.
//!
//! Each aligner knows how to build its command line from the database
//! metadata, where its output lands, and how to turn that output into a
//! taxatable. Binaries are looked up on `PATH`.
//!
//! | Kind | Binary | Artifact | Assignment |
//! |------|--------|----------|------------|
//! | `burst` | `burst15` | `alignment.burst.b6` | aligner's own taxonomy column |
//! | `burst-tax` | `burst15` | `alignment.burst.b6` | LCA over all hits |
//! | `utree` | `utree-search_gg` | `alignment.utree.tsv` | aligner's lineage |
//! | `bowtie2` | `bowtie2` | `alignment.bowtie2.sam` | LCA via `general.taxonomy` |
//!
//! Aligners write to a hidden `.partial` file and rename it into place only
//! after the process exits successfully, so a completed artifact is never
//! half-written.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::table::AbundanceTable;
use crate::engine::assign::{assign_taxonomy, AssignmentMode};
use crate::model::metadata::{Database, MetadataError};
use crate::model::taxonomy::ReferenceTaxonomy;
use crate::parsing::alignment::{read_alignment, AlignmentFormat};
use crate::parsing::ParseError;

pub mod bowtie2;
pub mod burst;
pub mod utree;

pub use bowtie2::Bowtie2;
pub use burst::Burst;
pub use utree::Utree;

#[derive(Error, Debug)]
pub enum AlignerError {
    #[error("Unknown aligner '{0}' (expected one of burst, burst-tax, utree, bowtie2, all)")]
    Unknown(String),

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{aligner} failed with {status}: {command}{}", stderr_suffix(.stderr))]
    Failed {
        aligner: String,
        status: String,
        command: String,
        stderr: String,
    },

    #[error("{aligner} exited successfully but wrote no output to {}", path.display())]
    MissingOutput { aligner: String, path: PathBuf },

    #[error("Failed to move {} into place: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

fn stderr_suffix(stderr: &str) -> String {
    let last = stderr.lines().rev().find(|l| !l.trim().is_empty());
    last.map(|l| format!(" ({})", l.trim())).unwrap_or_default()
}

/// Aligners bundled with SHOGUN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignerKind {
    /// BURST in capitalist mode
    Burst,
    /// BURST reporting all equally good hits, assigned by LCA
    BurstTax,
    Utree,
    Bowtie2,
}

impl AlignerKind {
    /// Aligners run by the `all` choice
    pub const ALL: [AlignerKind; 3] = [Self::Burst, Self::Utree, Self::Bowtie2];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Burst => "burst",
            Self::BurstTax => "burst-tax",
            Self::Utree => "utree",
            Self::Bowtie2 => "bowtie2",
        }
    }

    /// Guess the aligner that produced `path` from its extension, falling
    /// back to BURST with a warning
    #[must_use]
    pub fn sniff(path: &Path) -> Self {
        match AlignmentFormat::from_extension(path) {
            Some(AlignmentFormat::Blast6) => Self::Burst,
            Some(AlignmentFormat::Sam) => Self::Bowtie2,
            Some(AlignmentFormat::Utree) => Self::Utree,
            None => {
                warn!(
                    path = %path.display(),
                    "Unrecognized alignment file extension, assuming burst"
                );
                Self::Burst
            }
        }
    }
}

impl std::fmt::Display for AlignerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One aligner, or every bundled aligner in turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignerChoice {
    One(AlignerKind),
    All,
}

impl AlignerChoice {
    #[must_use]
    pub fn kinds(self) -> Vec<AlignerKind> {
        match self {
            Self::One(kind) => vec![kind],
            Self::All => AlignerKind::ALL.to_vec(),
        }
    }

    #[must_use]
    pub fn is_all(self) -> bool {
        matches!(self, Self::All)
    }
}

impl Default for AlignerChoice {
    fn default() -> Self {
        Self::One(AlignerKind::Burst)
    }
}

impl std::fmt::Display for AlignerChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::One(kind) => write!(f, "{kind}"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for AlignerChoice {
    type Err = AlignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        if lowered == "all" {
            return Ok(Self::All);
        }
        AlignerKind::from_str(&lowered, true)
            .map(Self::One)
            .map_err(|_| AlignerError::Unknown(s.to_string()))
    }
}

/// Settings shared by every aligner, fixed before any aligner is built
#[derive(Debug, Clone)]
pub struct AlignerConfig {
    pub database: Database,
    pub threads: usize,
    /// Let BURST resolve each read to a single taxon itself
    pub capitalist: bool,
}

impl AlignerConfig {
    #[must_use]
    pub fn new(database: Database) -> Self {
        Self {
            database,
            threads: default_threads(),
            capitalist: true,
        }
    }
}

/// All available cores, or 1 when that cannot be determined
#[must_use]
pub fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// The aligner capability
pub trait Aligner: Send + Sync {
    /// Short name used in artifact and table names
    fn name(&self) -> &'static str;

    /// Output format of the aligner
    fn format(&self) -> AlignmentFormat;

    /// File name of the alignment artifact
    fn artifact_name(&self) -> String {
        let ext = match self.format() {
            AlignmentFormat::Blast6 => "b6",
            AlignmentFormat::Utree => "tsv",
            AlignmentFormat::Sam => "sam",
        };
        format!("alignment.{}.{ext}", self.name())
    }

    /// Index files and parameters that determine the aligner's output
    fn parameters(&self) -> Vec<String>;

    /// Command line aligning `input` into `output`
    ///
    /// # Errors
    ///
    /// Returns `AlignerError::Metadata` if the database has no index for this aligner.
    fn command(&self, input: &Path, output: &Path) -> Result<Command, AlignerError>;

    /// Align `input` into `output_dir`, returning the artifact path
    ///
    /// # Errors
    ///
    /// Returns `AlignerError` if the process cannot be started, exits
    /// unsuccessfully, or leaves no output behind.
    fn align(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, AlignerError> {
        let artifact = output_dir.join(self.artifact_name());
        let partial = output_dir.join(format!(".{}.partial", self.artifact_name()));
        let mut command = self.command(input, &partial)?;

        info!(aligner = self.name(), input = %input.display(), "Running aligner");
        run_command(self.name(), &mut command)?;

        if !partial.is_file() {
            return Err(AlignerError::MissingOutput {
                aligner: self.name().to_string(),
                path: partial,
            });
        }
        std::fs::rename(&partial, &artifact).map_err(|source| AlignerError::Io {
            path: artifact.clone(),
            source,
        })?;
        Ok(artifact)
    }

    /// Turn an alignment artifact into a per-sample taxatable
    ///
    /// # Errors
    ///
    /// Returns `AlignerError::Parse` if the alignment or taxonomy cannot be read.
    fn post_align(&self, alignment: &Path) -> Result<AbundanceTable, AlignerError>;
}

/// Build the aligner for `kind`
#[must_use]
pub fn build_aligner(kind: AlignerKind, config: &AlignerConfig) -> Box<dyn Aligner> {
    match kind {
        AlignerKind::Burst => Box::new(Burst::new(config.clone(), config.capitalist)),
        AlignerKind::BurstTax => Box::new(Burst::new(config.clone(), false)),
        AlignerKind::Utree => Box::new(Utree::new(config.clone())),
        AlignerKind::Bowtie2 => Box::new(Bowtie2::new(config.clone())),
    }
}

/// Command line as a single printable string
#[must_use]
pub fn command_line(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a child process to completion
///
/// # Errors
///
/// Returns `AlignerError::Spawn` if the program cannot be started and
/// `AlignerError::Failed` with the exit status and command line if it exits
/// unsuccessfully.
pub fn run_command(aligner: &str, command: &mut Command) -> Result<(), AlignerError> {
    let line = command_line(command);
    debug!(command = %line, "Spawning");

    let output = command.output().map_err(|source| AlignerError::Spawn {
        program: command.get_program().to_string_lossy().into_owned(),
        source,
    })?;

    if !output.status.success() {
        return Err(AlignerError::Failed {
            aligner: aligner.to_string(),
            status: output.status.to_string(),
            command: line,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(())
}

/// Taxonomy for LCA assignment; empty when the database names none
pub(crate) fn load_taxonomy(database: &Database) -> Result<ReferenceTaxonomy, AlignerError> {
    match database.taxonomy_path() {
        Ok(path) => Ok(ReferenceTaxonomy::load(&path)?),
        Err(MetadataError::MissingKey { .. }) => Ok(ReferenceTaxonomy::default()),
        Err(e) => Err(e.into()),
    }
}

/// Shared `post_align`: parse the artifact and assign each read
pub(crate) fn assign_alignment(
    database: &Database,
    alignment: &Path,
    format: AlignmentFormat,
    mode: AssignmentMode,
) -> Result<AbundanceTable, AlignerError> {
    let taxonomy = load_taxonomy(database)?;
    let raw = read_alignment(alignment, format)?;
    debug!(hits = raw.len(), path = %alignment.display(), "Parsed alignment");
    Ok(assign_taxonomy(&raw, &taxonomy, mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::metadata::DatabaseMetadata;

    fn config() -> AlignerConfig {
        let metadata = DatabaseMetadata {
            burst: Some("burst/rep82".to_string()),
            utree: Some("utree/rep82.ctr".to_string()),
            bowtie2: Some("bowtie2/rep82".to_string()),
            ..DatabaseMetadata::default()
        };
        AlignerConfig {
            database: Database::new("/db", metadata),
            threads: 4,
            capitalist: true,
        }
    }

    #[test]
    fn test_choice_from_str() {
        assert_eq!("all".parse::<AlignerChoice>().unwrap(), AlignerChoice::All);
        assert_eq!(
            "burst-tax".parse::<AlignerChoice>().unwrap(),
            AlignerChoice::One(AlignerKind::BurstTax)
        );
        assert_eq!(
            "Bowtie2".parse::<AlignerChoice>().unwrap(),
            AlignerChoice::One(AlignerKind::Bowtie2)
        );
        assert!(matches!(
            "blast".parse::<AlignerChoice>(),
            Err(AlignerError::Unknown(_))
        ));
    }

    #[test]
    fn test_artifact_names() {
        let config = config();
        let names: Vec<String> = AlignerKind::ALL
            .iter()
            .map(|&kind| build_aligner(kind, &config).artifact_name())
            .collect();
        assert_eq!(
            names,
            vec!["alignment.burst.b6", "alignment.utree.tsv", "alignment.bowtie2.sam"]
        );
        assert_eq!(
            build_aligner(AlignerKind::BurstTax, &config).artifact_name(),
            "alignment.burst.b6"
        );
    }

    #[test]
    fn test_sniff() {
        assert_eq!(AlignerKind::sniff(Path::new("a.b6")), AlignerKind::Burst);
        assert_eq!(AlignerKind::sniff(Path::new("a.sam")), AlignerKind::Bowtie2);
        assert_eq!(AlignerKind::sniff(Path::new("a.txt")), AlignerKind::Utree);
        assert_eq!(AlignerKind::sniff(Path::new("a.paf")), AlignerKind::Burst);
    }

    #[test]
    fn test_spawn_failure_names_program() {
        let mut command = Command::new("shogun-test-no-such-binary");
        let err = run_command("burst", &mut command).unwrap_err();
        assert!(matches!(err, AlignerError::Spawn { .. }));
        assert!(err.to_string().contains("shogun-test-no-such-binary"));
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_reports_status_and_command() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo 'index missing' >&2; exit 3"]);
        let err = run_command("bowtie2", &mut command).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bowtie2 failed"));
        assert!(msg.contains("sh -c"));
        assert!(msg.contains("index missing"));
    }

    #[cfg(unix)]
    #[test]
    fn test_align_renames_partial_output() {
        struct Touch;

        impl Aligner for Touch {
            fn name(&self) -> &'static str {
                "touch"
            }
            fn format(&self) -> AlignmentFormat {
                AlignmentFormat::Utree
            }
            fn parameters(&self) -> Vec<String> {
                Vec::new()
            }
            fn command(&self, _input: &Path, output: &Path) -> Result<Command, AlignerError> {
                let mut command = Command::new("sh");
                command.arg("-c").arg(format!("printf 'S1_1\\tk__A\\n' > '{}'", output.display()));
                Ok(command)
            }
            fn post_align(&self, _alignment: &Path) -> Result<AbundanceTable, AlignerError> {
                Ok(AbundanceTable::default())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let artifact = Touch.align(Path::new("reads.fna"), dir.path()).unwrap();
        assert_eq!(artifact, dir.path().join("alignment.touch.tsv"));
        assert!(artifact.is_file());
        assert!(!dir.path().join(".alignment.touch.tsv.partial").exists());
    }
}
