use std::collections::BTreeMap;

use crate::core::lineage::Lineage;
use crate::core::rank::TaxonomyRank;

/// Sparse lineage × sample count table.
///
/// Rows are kept in lineage order and samples in insertion order, so two tables
/// built from the same data serialize identically. Combinations that were never
/// counted are absent; serialization fills them with 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbundanceTable {
    samples: Vec<String>,
    rows: BTreeMap<Lineage, BTreeMap<usize, u64>>,
}

impl AbundanceTable {
    pub fn new<S: Into<String>>(samples: impl IntoIterator<Item = S>) -> Self {
        let mut table = Self::default();
        for sample in samples {
            table.sample_index_or_insert(sample);
        }
        table
    }

    #[must_use]
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    #[must_use]
    pub fn sample_index(&self, sample: &str) -> Option<usize> {
        self.samples.iter().position(|s| s == sample)
    }

    /// Index of `sample`, adding it as a new column when unseen
    pub fn sample_index_or_insert(&mut self, sample: impl Into<String>) -> usize {
        let sample = sample.into();
        if let Some(index) = self.sample_index(&sample) {
            return index;
        }
        self.samples.push(sample);
        self.samples.len() - 1
    }

    /// Add `count` to a cell; the row is created even for a zero count
    ///
    /// # Panics
    ///
    /// Panics if `sample` is not a valid sample index.
    pub fn add(&mut self, lineage: Lineage, sample: usize, count: u64) {
        assert!(sample < self.samples.len(), "sample index {sample} out of range");
        *self.rows.entry(lineage).or_default().entry(sample).or_insert(0) += count;
    }

    /// Add `count` for a named sample, creating the column when needed
    pub fn add_for_sample(&mut self, lineage: Lineage, sample: &str, count: u64) {
        let index = self.sample_index_or_insert(sample);
        self.add(lineage, index, count);
    }

    /// Count for a cell, 0 when absent
    #[must_use]
    pub fn get(&self, lineage: &Lineage, sample: usize) -> u64 {
        self.rows
            .get(lineage)
            .and_then(|row| row.get(&sample))
            .copied()
            .unwrap_or(0)
    }

    /// Count for a named sample, 0 when the sample or cell is absent
    #[must_use]
    pub fn get_by_name(&self, lineage: &str, sample: &str) -> u64 {
        self.sample_index(sample)
            .map_or(0, |index| self.get(&Lineage::new(lineage), index))
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Lineage, &BTreeMap<usize, u64>)> {
        self.rows.iter()
    }

    pub fn lineages(&self) -> impl Iterator<Item = &Lineage> {
        self.rows.keys()
    }

    #[must_use]
    pub fn contains(&self, lineage: &Lineage) -> bool {
        self.rows.contains_key(lineage)
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Total count per sample, in sample order
    #[must_use]
    pub fn sample_totals(&self) -> Vec<u64> {
        let mut totals = vec![0u64; self.samples.len()];
        for row in self.rows.values() {
            for (&sample, &count) in row {
                totals[sample] += count;
            }
        }
        totals
    }

    /// Aggregate every row deeper than `rank` onto its ancestor at `rank`.
    ///
    /// Rows at or above `rank` are kept as they are. No counts are split, so this
    /// is exact and never consults a confusion model.
    #[must_use]
    pub fn collapse(&self, rank: TaxonomyRank) -> Self {
        let mut collapsed = Self {
            samples: self.samples.clone(),
            rows: BTreeMap::new(),
        };
        for (lineage, row) in &self.rows {
            let target = lineage.truncate(rank);
            for (&sample, &count) in row {
                collapsed.add(target.clone(), sample, count);
            }
        }
        collapsed
    }
}
