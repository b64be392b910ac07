use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the metadata file at the root of every database directory
pub const METADATA_FILE: &str = "metadata.yaml";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Unable to load database at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Database metadata {} has no '{key}' entry", path.display())]
    MissingKey { path: PathBuf, key: String },
}

/// Files shared by every aligner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralFiles {
    /// Reference name -> lineage map
    #[serde(default)]
    pub taxonomy: Option<String>,

    /// Reference FASTA the indexes were built from
    #[serde(default)]
    pub fasta: Option<String>,

    /// Shear confusion model
    #[serde(default)]
    pub shear: Option<String>,
}

/// Contents of `metadata.yaml`
///
/// ```yaml
/// general:
///   taxonomy: rep82.tax
///   fasta: rep82.fna
///   shear: sheared_bayes.txt
/// function: function/ko-strain.tsv
/// burst: burst/rep82
/// utree: utree/rep82.ctr
/// bowtie2: bowtie2/rep82
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    #[serde(default)]
    pub general: GeneralFiles,

    #[serde(default)]
    pub function: Option<String>,

    #[serde(default)]
    pub burst: Option<String>,

    #[serde(default)]
    pub utree: Option<String>,

    #[serde(default)]
    pub bowtie2: Option<String>,
}

/// A database directory and its parsed metadata
#[derive(Debug, Clone)]
pub struct Database {
    root: PathBuf,
    metadata: DatabaseMetadata,
}

impl Database {
    /// Load `<dir>/metadata.yaml`
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::NotFound` if the metadata file is missing, or
    /// `MetadataError::Io`/`MetadataError::Parse` if it cannot be read.
    pub fn load(dir: &Path) -> Result<Self, MetadataError> {
        let path = dir.join(METADATA_FILE);
        if !path.is_file() {
            return Err(MetadataError::NotFound(path));
        }
        debug!(path = %path.display(), "Loading database metadata");
        let content = std::fs::read_to_string(&path).map_err(|source| MetadataError::Io {
            path: path.clone(),
            source,
        })?;
        let metadata = serde_yaml::from_str(&content)
            .map_err(|source| MetadataError::Parse { path, source })?;
        Ok(Self {
            root: dir.to_path_buf(),
            metadata,
        })
    }

    #[must_use]
    pub fn new(root: impl Into<PathBuf>, metadata: DatabaseMetadata) -> Self {
        Self {
            root: root.into(),
            metadata,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    fn resolve(&self, value: Option<&String>, key: &str) -> Result<PathBuf, MetadataError> {
        value
            .map(|v| self.root.join(v))
            .ok_or_else(|| MetadataError::MissingKey {
                path: self.root.join(METADATA_FILE),
                key: key.to_string(),
            })
    }

    /// Path of the shear confusion model (`general.shear`)
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::MissingKey` if the key is absent.
    pub fn shear_path(&self) -> Result<PathBuf, MetadataError> {
        self.resolve(self.metadata.general.shear.as_ref(), "general.shear")
    }

    /// Path of the reference taxonomy (`general.taxonomy`)
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::MissingKey` if the key is absent.
    pub fn taxonomy_path(&self) -> Result<PathBuf, MetadataError> {
        self.resolve(self.metadata.general.taxonomy.as_ref(), "general.taxonomy")
    }

    /// Path of the function database (`function`)
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::MissingKey` if the key is absent.
    pub fn function_path(&self) -> Result<PathBuf, MetadataError> {
        self.resolve(self.metadata.function.as_ref(), "function")
    }

    /// Index prefix for an aligner (`burst`, `utree` or `bowtie2`)
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::MissingKey` if the aligner has no entry.
    pub fn aligner_index(&self, aligner: &str) -> Result<PathBuf, MetadataError> {
        let value = match aligner {
            "burst" => self.metadata.burst.as_ref(),
            "utree" => self.metadata.utree.as_ref(),
            "bowtie2" => self.metadata.bowtie2.as_ref(),
            _ => None,
        };
        self.resolve(value, aligner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = "general:
  taxonomy: rep82.tax
  fasta: rep82.fna
  shear: sheared_bayes.txt
function: function/ko.tsv
burst: burst/rep82
";

    #[test]
    fn test_load_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(METADATA_FILE), METADATA).unwrap();

        let db = Database::load(dir.path()).unwrap();
        assert_eq!(db.shear_path().unwrap(), dir.path().join("sheared_bayes.txt"));
        assert_eq!(db.taxonomy_path().unwrap(), dir.path().join("rep82.tax"));
        assert_eq!(db.aligner_index("burst").unwrap(), dir.path().join("burst/rep82"));
    }

    #[test]
    fn test_missing_aligner_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(METADATA_FILE), METADATA).unwrap();

        let db = Database::load(dir.path()).unwrap();
        let err = db.aligner_index("utree").unwrap_err();
        assert!(matches!(err, MetadataError::MissingKey { ref key, .. } if key == "utree"));
    }

    #[test]
    fn test_missing_metadata_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Database::load(dir.path()).unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
        assert!(err.to_string().contains("metadata.yaml"));
    }

    #[test]
    fn test_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(METADATA_FILE), "general: [unclosed").unwrap();
        let err = Database::load(dir.path()).unwrap_err();
        assert!(matches!(err, MetadataError::Parse { .. }));
    }
}
