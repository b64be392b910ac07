use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::pipeline::PipelineError;

/// Manifest file kept in every output directory
pub const MANIFEST_FILE: &str = ".shogun-cache.json";

const MANIFEST_VERSION: u32 = 1;

/// State of a stage's outputs on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// At least one output does not exist
    Missing,
    /// An output exists but is empty, e.g. left by an interrupted run
    Partial,
    /// Outputs exist but were produced from different inputs or parameters
    Stale,
    /// Outputs exist and match the current inputs
    Complete,
}

impl ArtifactStatus {
    #[must_use]
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}

/// One completed stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub fingerprint: String,
    pub artifacts: Vec<PathBuf>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    stages: BTreeMap<String, ManifestEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            stages: BTreeMap::new(),
        }
    }
}

/// Stage outputs recorded in an output directory's manifest
#[derive(Debug)]
pub struct ArtifactCache {
    path: PathBuf,
    manifest: Manifest,
}

impl ArtifactCache {
    /// Open the manifest in `dir`, starting empty when there is none.
    ///
    /// An unreadable or corrupt manifest is logged and ignored; every stage
    /// then falls back to checking its outputs on disk.
    #[must_use]
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(MANIFEST_FILE);
        let manifest = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable artifact manifest");
                Manifest::default()
            }),
            Err(_) => Manifest::default(),
        };
        debug!(path = %path.display(), stages = manifest.stages.len(), "Opened artifact manifest");
        Self { path, manifest }
    }

    #[must_use]
    pub fn entry(&self, stage: &str) -> Option<&ManifestEntry> {
        self.manifest.stages.get(stage)
    }

    /// Check whether `stage` can be skipped.
    ///
    /// Outputs that all exist and are non-empty are complete when the
    /// recorded fingerprint matches, or when the stage was never recorded
    /// (outputs from an earlier run without a manifest).
    #[must_use]
    pub fn status(&self, stage: &str, fingerprint: &str, artifacts: &[PathBuf]) -> ArtifactStatus {
        for artifact in artifacts {
            match std::fs::metadata(artifact) {
                Err(_) => return ArtifactStatus::Missing,
                Ok(meta) if meta.len() == 0 => {
                    warn!(
                        stage,
                        path = %artifact.display(),
                        "Found an empty artifact, recomputing"
                    );
                    return ArtifactStatus::Partial;
                }
                Ok(_) => {}
            }
        }

        match self.entry(stage) {
            Some(entry) if entry.fingerprint == fingerprint => ArtifactStatus::Complete,
            Some(_) => ArtifactStatus::Stale,
            None => {
                info!(stage, "Outputs exist without a manifest entry, treating as complete");
                ArtifactStatus::Complete
            }
        }
    }

    /// Record a completed stage and save the manifest
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Io` if the manifest cannot be written.
    pub fn record(
        &mut self,
        stage: &str,
        fingerprint: String,
        artifacts: Vec<PathBuf>,
    ) -> Result<(), PipelineError> {
        self.manifest.stages.insert(
            stage.to_string(),
            ManifestEntry {
                fingerprint,
                artifacts,
                completed_at: Utc::now(),
            },
        );
        self.save()
    }

    fn save(&self) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(&self.manifest).map_err(|e| PipelineError::Io {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        write_atomic(&self.path, json.as_bytes())
    }
}

/// MD5 over a stage name, its input files (path, size, mtime) and parameters
///
/// # Errors
///
/// Returns `PipelineError::MissingInput` if an input cannot be inspected.
pub fn fingerprint(stage: &str, inputs: &[&Path], params: &[String]) -> Result<String, PipelineError> {
    let mut context = md5::Context::new();
    context.consume(stage.as_bytes());
    for input in inputs {
        let meta =
            std::fs::metadata(input).map_err(|_| PipelineError::MissingInput(input.to_path_buf()))?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_nanos());
        context.consume(b"\0");
        context.consume(input.to_string_lossy().as_bytes());
        context.consume(meta.len().to_le_bytes());
        context.consume(mtime.to_le_bytes());
    }
    for param in params {
        context.consume(b"\0");
        context.consume(param.as_bytes());
    }
    Ok(format!("{:x}", context.compute()))
}

/// Write `contents` to a temporary file next to `path` and rename it into place
///
/// # Errors
///
/// Returns `PipelineError::Io` naming `path` if any step fails.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    let io_err = |source: std::io::Error| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(contents).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
