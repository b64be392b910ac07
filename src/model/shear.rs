use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::core::lineage::Lineage;
use crate::core::rank::TaxonomyRank;
use crate::parsing::open_text;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Confusion model not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read confusion model {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed confusion model {origin} (line {line}): {message}")]
    Malformed {
        origin: String,
        line: usize,
        message: String,
    },

    #[error("Confusion model {origin} (line {line}): taxon '{taxon}' is inconsistent with the rank hierarchy: {reason}")]
    InconsistentTaxon {
        origin: String,
        line: usize,
        taxon: String,
        reason: String,
    },
}

/// One sheared reference genome
#[derive(Debug, Clone, PartialEq)]
pub struct ShearEntry {
    /// Full lineage of the reference, usually down to strain
    pub lineage: Lineage,

    /// Genome length in bases (0 when unknown)
    pub genome_length: u64,

    /// Sheared reads from this reference whose LCA landed at each rank,
    /// indexed by `rank.index() - 1`
    pub rank_hits: [f64; 8],
}

impl ShearEntry {
    pub fn new(lineage: impl Into<Lineage>, genome_length: u64) -> Self {
        Self {
            lineage: lineage.into(),
            genome_length,
            rank_hits: [0.0; 8],
        }
    }

    #[must_use]
    pub fn with_hits(mut self, rank: TaxonomyRank, hits: f64) -> Self {
        self.rank_hits[rank.index() - 1] = hits;
        self
    }

    /// Sheared reads of this reference that were resolved only as far as `rank`
    #[must_use]
    pub fn hits_at(&self, rank: TaxonomyRank) -> f64 {
        self.rank_hits[rank.index() - 1]
    }
}

/// The "shear" confusion model: how reads landing on a taxon spread over the
/// references beneath it.
///
/// Loaded once per database and never mutated afterwards, so a single
/// instance can be shared across threads behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ConfusionModel {
    entries: Vec<ShearEntry>,

    /// Index: lineage (every ancestor of every reference) -> entry indices
    by_prefix: HashMap<Lineage, Vec<usize>>,

    /// Index: reference name (leaf component, with and without its `t__`
    /// prefix) -> entry index
    by_name: HashMap<String, usize>,
}

impl ConfusionModel {
    /// Load a model from a tab-separated shear file (optionally gzipped)
    ///
    /// # Errors
    ///
    /// Returns `ModelError::NotFound` if the file does not exist, `ModelError::Io`
    /// if it cannot be read, and `ModelError::Malformed` or
    /// `ModelError::InconsistentTaxon` if its content is invalid.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }
        let io_err = |source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut content = String::new();
        open_text(path)
            .map_err(io_err)?
            .read_to_string(&mut content)
            .map_err(io_err)?;

        let model = Self::from_text(&content, &path.display().to_string())?;
        debug!(
            path = %path.display(),
            references = model.len(),
            "Loaded confusion model"
        );
        Ok(model)
    }

    /// Parse a model from shear text. `origin` names the source in errors.
    ///
    /// ```text
    /// #OTU ID	genome_length	1	2	3	4	5	6	7	8
    /// k__A;p__B;c__C;o__D;f__E;g__F;s__G;t__H	4200000	0	0	0	1	3	40	200	600
    /// ```
    ///
    /// Rank columns may be numbered `1`..`8` or named `kingdom`..`strain`.
    /// Unknown columns are ignored and empty cells read as 0.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Malformed` for a missing header, unparsable or
    /// negative numbers, or duplicate references, and
    /// `ModelError::InconsistentTaxon` for lineages that do not fit the eight
    /// ranks.
    pub fn from_text(text: &str, origin: &str) -> Result<Self, ModelError> {
        let malformed = |line: usize, message: String| ModelError::Malformed {
            origin: origin.to_string(),
            line,
            message,
        };

        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
            .filter(|(_, l)| !l.trim().is_empty());

        let (header_line, header) = lines
            .next()
            .ok_or_else(|| malformed(1, "file is empty".to_string()))?;
        let columns = parse_header(header);
        if !columns.iter().any(|c| matches!(c, Column::Rank(_))) {
            return Err(malformed(
                header_line,
                "header has no rank columns (expected 1..8 or kingdom..strain)".to_string(),
            ));
        }

        let mut entries = Vec::new();
        for (line_num, line) in lines {
            if line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let lineage = Lineage::new(fields[0]);
            if lineage.is_unclassified() {
                debug!(line = line_num, "Skipping shear row without a lineage");
                continue;
            }
            if let Some(reason) = lineage.inconsistency() {
                return Err(ModelError::InconsistentTaxon {
                    origin: origin.to_string(),
                    line: line_num,
                    taxon: lineage.to_string(),
                    reason,
                });
            }

            let mut entry = ShearEntry::new(lineage, 0);
            for (column, raw) in columns.iter().zip(fields.iter().skip(1)) {
                let raw = raw.trim();
                if raw.is_empty() || matches!(column, Column::Ignored) {
                    continue;
                }
                let value: f64 = raw.parse().map_err(|_| {
                    malformed(line_num, format!("invalid number '{raw}'"))
                })?;
                if !value.is_finite() || value < 0.0 {
                    return Err(malformed(
                        line_num,
                        format!("weights must be finite and non-negative, found '{raw}'"),
                    ));
                }
                match column {
                    Column::GenomeLength => {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        {
                            entry.genome_length = value.round() as u64;
                        }
                    }
                    Column::Rank(rank) => entry.rank_hits[rank.index() - 1] = value,
                    Column::Ignored => {}
                }
            }
            entries.push((line_num, entry));
        }

        let mut model = Self::default();
        for (line_num, entry) in entries {
            if model.get(&entry.lineage).is_some() {
                return Err(malformed(
                    line_num,
                    format!("duplicate reference '{}'", entry.lineage),
                ));
            }
            model.push(entry);
        }
        Ok(model)
    }

    /// Build a model directly from entries
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InconsistentTaxon` or `ModelError::Malformed` under
    /// the same rules as [`ConfusionModel::from_text`].
    pub fn from_entries(entries: Vec<ShearEntry>) -> Result<Self, ModelError> {
        let mut model = Self::default();
        for (i, entry) in entries.into_iter().enumerate() {
            if let Some(reason) = entry.lineage.inconsistency() {
                return Err(ModelError::InconsistentTaxon {
                    origin: "<entries>".to_string(),
                    line: i + 1,
                    taxon: entry.lineage.to_string(),
                    reason,
                });
            }
            if entry.rank_hits.iter().any(|h| !h.is_finite() || *h < 0.0) {
                return Err(ModelError::Malformed {
                    origin: "<entries>".to_string(),
                    line: i + 1,
                    message: format!("negative or non-finite weight for '{}'", entry.lineage),
                });
            }
            if model.get(&entry.lineage).is_some() {
                return Err(ModelError::Malformed {
                    origin: "<entries>".to_string(),
                    line: i + 1,
                    message: format!("duplicate reference '{}'", entry.lineage),
                });
            }
            model.push(entry);
        }
        Ok(model)
    }

    fn push(&mut self, entry: ShearEntry) {
        let index = self.entries.len();
        for prefix in entry.lineage.prefixes() {
            self.by_prefix.entry(prefix).or_default().push(index);
        }
        if let Some(leaf) = entry.lineage.leaf() {
            self.by_name.entry(leaf.to_string()).or_insert(index);
            if let Some((_, bare)) = leaf.split_once("__") {
                self.by_name.entry(bare.to_string()).or_insert(index);
            }
        }
        self.entries.push(entry);
    }

    #[must_use]
    pub fn entries(&self) -> &[ShearEntry] {
        &self.entries
    }

    /// Entry for an exact reference lineage
    #[must_use]
    pub fn get(&self, lineage: &Lineage) -> Option<&ShearEntry> {
        self.by_prefix
            .get(lineage)?
            .iter()
            .map(|&i| &self.entries[i])
            .find(|e| &e.lineage == lineage)
    }

    /// Every reference at or below `lineage`
    pub fn references_under<'a>(
        &'a self,
        lineage: &Lineage,
    ) -> impl Iterator<Item = &'a ShearEntry> + 'a {
        self.by_prefix
            .get(lineage)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(move |&i| &self.entries[i])
    }

    /// Find a reference by its full lineage or by its leaf name (e.g. an
    /// accession appearing as the subject of an alignment)
    #[must_use]
    pub fn find_reference(&self, name: &str) -> Option<&ShearEntry> {
        if name.contains(';') {
            return self.get(&Lineage::new(name));
        }
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    /// Number of references
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    GenomeLength,
    Rank(TaxonomyRank),
    Ignored,
}

fn parse_header(header: &str) -> Vec<Column> {
    header
        .split('\t')
        .skip(1)
        .map(|name| {
            let name = name.trim().to_lowercase();
            if name == "genome_length" || name == "length" {
                return Column::GenomeLength;
            }
            let rank = name
                .parse::<usize>()
                .ok()
                .and_then(|i| TaxonomyRank::from_index(i).ok())
                .or_else(|| name.parse::<TaxonomyRank>().ok());
            rank.map_or(Column::Ignored, Column::Rank)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SHEAR: &str = "#OTU ID\tgenome_length\t1\t2\t3\t4\t5\t6\t7\t8
k__A;p__B;c__C;o__D;f__E;g__F;s__G;t__H1\t5000\t0\t0\t0\t0\t1\t7\t20\t72
k__A;p__B;c__C;o__D;f__E;g__F;s__G;t__H2\t3000\t0\t0\t0\t0\t1\t3\t30\t66
k__A;p__B;c__C;o__D;f__E;g__F;s__I;t__J\t\t0\t0\t0\t0\t0\t5\t10\t85
";

    #[test]
    fn test_parse_shear_text() {
        let model = ConfusionModel::from_text(SHEAR, "test").unwrap();
        assert_eq!(model.len(), 3);

        let h1 = model
            .get(&Lineage::new("k__A;p__B;c__C;o__D;f__E;g__F;s__G;t__H1"))
            .unwrap();
        assert_eq!(h1.genome_length, 5000);
        assert!((h1.hits_at(TaxonomyRank::Genus) - 7.0).abs() < f64::EPSILON);

        let j = model.find_reference("J").unwrap();
        assert_eq!(j.genome_length, 0);
    }

    #[test]
    fn test_references_under() {
        let model = ConfusionModel::from_text(SHEAR, "test").unwrap();
        let genus = Lineage::new("k__A;p__B;c__C;o__D;f__E;g__F");
        assert_eq!(model.references_under(&genus).count(), 3);
        let species = Lineage::new("k__A;p__B;c__C;o__D;f__E;g__F;s__G");
        assert_eq!(model.references_under(&species).count(), 2);
        assert_eq!(model.references_under(&Lineage::new("k__Z")).count(), 0);
    }

    #[test]
    fn test_named_rank_columns() {
        let text = "taxonomy\tgenus\tspecies\nk__A;p__B;c__C;o__D;f__E;g__F;s__G\t4\t6\n";
        let model = ConfusionModel::from_text(text, "test").unwrap();
        let entry = &model.entries()[0];
        assert!((entry.hits_at(TaxonomyRank::Species) - 6.0).abs() < f64::EPSILON);
        assert!((entry.hits_at(TaxonomyRank::Kingdom)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_rank_columns_is_malformed() {
        let err = ConfusionModel::from_text("#OTU ID\tfoo\nk__A\t1\n", "test").unwrap_err();
        assert!(matches!(err, ModelError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_bad_number_is_malformed() {
        let err = ConfusionModel::from_text("#OTU ID\t1\nk__A\tabc\n", "shear.txt").unwrap_err();
        assert!(err.to_string().contains("shear.txt"));
        assert!(matches!(err, ModelError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_negative_weight_is_malformed() {
        let err = ConfusionModel::from_text("#OTU ID\t1\nk__A\t-1\n", "test").unwrap_err();
        assert!(matches!(err, ModelError::Malformed { .. }));
    }

    #[test]
    fn test_inconsistent_taxon() {
        let err = ConfusionModel::from_text("#OTU ID\t1\nk__A;g__B\t1\n", "test").unwrap_err();
        match err {
            ModelError::InconsistentTaxon { taxon, line, .. } => {
                assert_eq!(taxon, "k__A;g__B");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_reference() {
        let text = "#OTU ID\t1\nk__A;p__B\t1\nk__A;p__B\t2\n";
        let err = ConfusionModel::from_text(text, "test").unwrap_err();
        assert!(matches!(err, ModelError::Malformed { line: 3, .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfusionModel::load(Path::new("/nonexistent/sheared_bayes.txt")).unwrap_err();
        assert!(matches!(err, ModelError::NotFound(_)));
        assert!(err.to_string().contains("/nonexistent/sheared_bayes.txt"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::with_suffix(".txt").unwrap();
        file.write_all(SHEAR.as_bytes()).unwrap();
        file.flush().unwrap();

        let model = ConfusionModel::load(file.path()).unwrap();
        assert_eq!(model.len(), 3);
    }

    #[test]
    fn test_from_entries() {
        let model = ConfusionModel::from_entries(vec![
            ShearEntry::new("taxonA;child1", 0).with_hits(TaxonomyRank::Kingdom, 7.0),
            ShearEntry::new("taxonA;child2", 0).with_hits(TaxonomyRank::Kingdom, 3.0),
        ])
        .unwrap();
        assert_eq!(model.references_under(&Lineage::new("taxonA")).count(), 2);

        let dup = ConfusionModel::from_entries(vec![
            ShearEntry::new("k__A", 0),
            ShearEntry::new("k__A", 0),
        ]);
        assert!(dup.is_err());
    }
}
