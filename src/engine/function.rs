use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::io::BufRead;
use std::path::Path;

use tracing::debug;

use crate::core::lineage::Lineage;
use crate::core::rank::TaxonomyRank;
use crate::core::table::AbundanceTable;
use crate::parsing::{open_text, ParseError};

/// First header cell of a functional profile
pub const KEGG_HEADER: &str = "#KEGG ID";

/// KEGG orthology annotations per reference lineage (`function` in the
/// database metadata)
///
/// ```text
/// k__A;p__B;...;t__GCF_000005845	K00001:2,K00002,K00845:1
/// ```
#[derive(Debug, Clone, Default)]
pub struct FunctionDatabase {
    entries: Vec<(Lineage, BTreeMap<String, f64>)>,
    by_prefix: HashMap<Lineage, Vec<usize>>,
}

impl FunctionDatabase {
    /// Load a function database (optionally gzipped)
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` if the file cannot be read and
    /// `ParseError::InvalidFormat` naming the line for malformed entries.
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let reader = open_text(path).map_err(|e| ParseError::Io(e).in_file(path))?;
        let mut db = Self::default();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (lineage, annotations) = line.split_once('\t').unwrap_or((line, ""));
            let kos = parse_annotations(annotations).map_err(|msg| {
                ParseError::InvalidFormat(format!("{} line {}: {msg}", path.display(), i + 1))
            })?;
            db.insert(Lineage::new(lineage), kos);
        }
        debug!(path = %path.display(), entries = db.len(), "Loaded function database");
        Ok(db)
    }

    pub fn insert(&mut self, lineage: Lineage, kos: BTreeMap<String, f64>) {
        let index = self.entries.len();
        for prefix in lineage.prefixes() {
            self.by_prefix.entry(prefix).or_default().push(index);
        }
        self.entries.push((lineage, kos));
    }

    /// Mean KO counts over every annotated reference under `taxon`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_profile(&self, taxon: &Lineage) -> Option<BTreeMap<String, f64>> {
        let indices = self.by_prefix.get(taxon)?;
        let mut sum: BTreeMap<String, f64> = BTreeMap::new();
        for &i in indices {
            for (ko, count) in &self.entries[i].1 {
                *sum.entry(ko.clone()).or_insert(0.0) += count;
            }
        }
        let n = indices.len() as f64;
        Some(sum.into_iter().map(|(ko, total)| (ko, total / n)).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_annotations(raw: &str) -> Result<BTreeMap<String, f64>, String> {
    let mut kos = BTreeMap::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (ko, count) = match item.split_once(':') {
            Some((ko, count)) => {
                let count: f64 = count
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid count in '{item}'"))?;
                if !count.is_finite() || count < 0.0 {
                    return Err(format!("negative or non-finite count in '{item}'"));
                }
                (ko.trim(), count)
            }
            None => (item, 1.0),
        };
        *kos.entry(ko.to_string()).or_insert(0.0) += count;
    }
    Ok(kos)
}

/// KO × sample counts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionProfile {
    samples: Vec<String>,
    rows: BTreeMap<String, Vec<f64>>,
}

impl FunctionProfile {
    #[must_use]
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Rounded count for a KO in a sample, 0 when absent
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn get(&self, ko: &str, sample: &str) -> u64 {
        let Some(index) = self.samples.iter().position(|s| s == sample) else {
            return 0;
        };
        self.rows
            .get(ko)
            .map_or(0, |row| row[index].round() as u64)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Predict KO abundances from a taxatable.
///
/// The table is first collapsed to `rank`; every taxon contributes its count
/// times the mean KO profile of the annotated references beneath it. Taxa
/// without annotations contribute nothing.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn profile_functions(
    table: &AbundanceTable,
    db: &FunctionDatabase,
    rank: TaxonomyRank,
) -> FunctionProfile {
    let collapsed = table.collapse(rank);
    let n_samples = collapsed.samples().len();
    let mut profile = FunctionProfile {
        samples: collapsed.samples().to_vec(),
        rows: BTreeMap::new(),
    };
    let mut unannotated = 0usize;

    for (taxon, row) in collapsed.rows() {
        let Some(mean) = db.mean_profile(taxon) else {
            unannotated += 1;
            continue;
        };
        for (ko, per_genome) in mean {
            let cells = profile
                .rows
                .entry(ko)
                .or_insert_with(|| vec![0.0; n_samples]);
            for (&sample, &count) in row {
                cells[sample] += count as f64 * per_genome;
            }
        }
    }

    if unannotated > 0 {
        debug!(rank = %rank, taxa = unannotated, "Taxa without functional annotations");
    }
    profile
}

/// Render a functional profile with counts rounded to integers
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_function_profile(profile: &FunctionProfile) -> String {
    let mut out = String::from(KEGG_HEADER);
    for sample in &profile.samples {
        out.push('\t');
        out.push_str(sample);
    }
    out.push('\n');

    for (ko, cells) in &profile.rows {
        out.push_str(ko);
        for value in cells {
            let _ = write!(out, "\t{}", value.round() as u64);
        }
        out.push('\n');
    }
    out
}
