use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::core::lineage::Lineage;
use crate::parsing::{open_text, ParseError};

/// Reference name -> lineage map (`general.taxonomy` in the database)
///
/// ```text
/// GCF_000005845.2	k__Bacteria;p__Proteobacteria;...;t__GCF_000005845.2
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReferenceTaxonomy {
    lineages: HashMap<String, Lineage>,
}

impl ReferenceTaxonomy {
    /// Load a two-column reference taxonomy file
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` if the file cannot be read and
    /// `ParseError::InvalidFormat` if a line has fewer than two fields.
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let reader = open_text(path)?;
        let mut taxonomy = Self::default();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((reference, lineage)) = line.split_once('\t') else {
                return Err(ParseError::InvalidFormat(format!(
                    "{} line {}: expected '<reference>\\t<lineage>'",
                    path.display(),
                    i + 1
                )));
            };
            taxonomy.insert(reference.trim(), Lineage::new(lineage));
        }
        Ok(taxonomy)
    }

    pub fn insert(&mut self, reference: impl Into<String>, lineage: Lineage) {
        self.lineages.insert(reference.into(), lineage);
    }

    /// Lineage for an alignment subject. Subjects that are themselves
    /// lineages resolve to themselves.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<Lineage> {
        if let Some(lineage) = self.lineages.get(reference) {
            return Some(lineage.clone());
        }
        reference.contains(';').then(|| Lineage::new(reference))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lineages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lineages.is_empty()
    }
}
