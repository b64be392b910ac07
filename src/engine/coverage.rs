use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::lineage::Lineage;
use crate::core::rank::TaxonomyRank;
use crate::engine::apportion::apportion_among;
use crate::model::shear::ConfusionModel;
use crate::parsing::alignment::{AlignmentHit, RawAlignment};
use crate::parsing::taxatable::OTU_HEADER;

/// Coverage estimation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Genome bin width in bases
    pub bin_size: u64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self { bin_size: 100 }
    }
}

/// Coverage summary for one taxon
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageRow {
    /// Reads assigned to the taxon, fractional when shared
    pub hits: f64,

    /// Fraction of genome bins touched by at least one hit
    pub percent_coverage: f64,

    /// Fraction of bins expected to be touched by this many hits
    pub expected_coverage: f64,

    /// Observed over expected, clipped to [0, 1]
    pub confidence: f64,
}

/// Coverage rows keyed by taxon at a single rank
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageTable {
    rank: Option<TaxonomyRank>,
    rows: BTreeMap<Lineage, CoverageRow>,
}

impl CoverageTable {
    #[must_use]
    pub fn rank(&self) -> Option<TaxonomyRank> {
        self.rank
    }

    #[must_use]
    pub fn get(&self, lineage: &Lineage) -> Option<&CoverageRow> {
        self.rows.get(lineage)
    }

    /// Confidence for a taxon; taxa without hits score 0
    #[must_use]
    pub fn confidence(&self, lineage: &Lineage) -> f64 {
        self.rows.get(lineage).map_or(0.0, |row| row.confidence)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Lineage, &CoverageRow)> {
        self.rows.iter()
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

/// Per-reference accumulator
#[derive(Debug)]
struct ReferenceCoverage {
    lineage: Lineage,
    genome_length: u64,
    hits: f64,
    /// Sum over reads of weight × bins spanned
    weighted_span_bins: f64,
    bins: BTreeSet<u64>,
    max_end: u64,
}

impl ReferenceCoverage {
    fn new(lineage: Lineage, genome_length: u64) -> Self {
        Self {
            lineage,
            genome_length,
            hits: 0.0,
            weighted_span_bins: 0.0,
            bins: BTreeSet::new(),
            max_end: 0,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, bin_size: u64) -> CoverageRow {
        let extent = if self.genome_length > 0 {
            self.genome_length
        } else {
            self.max_end
        };
        let total_bins = extent.div_ceil(bin_size).max(1) as f64;

        let observed = (self.bins.len() as f64 / total_bins).min(1.0);
        let expected = 1.0 - (-self.weighted_span_bins / total_bins).exp();
        let confidence = if self.hits <= 0.0 || expected <= 0.0 {
            0.0
        } else {
            (observed / expected).clamp(0.0, 1.0)
        };

        CoverageRow {
            hits: self.hits,
            percent_coverage: observed,
            expected_coverage: expected,
            confidence,
        }
    }
}

/// Estimate coverage confidence at `rank` with the default 100 bp bins
#[must_use]
pub fn estimate_coverage(
    alignment: &RawAlignment,
    model: &ConfusionModel,
    rank: TaxonomyRank,
) -> CoverageTable {
    estimate_coverage_with(alignment, model, rank, &CoverageConfig::default())
}

/// Estimate how completely each taxon at `rank` was observed.
///
/// Reads hitting several references are shared among them with weights from
/// the confusion model, restricted to the taxa the read actually hit; when
/// the model has nothing for those taxa the read is split equally. Each
/// reference's confidence compares observed bin coverage against the
/// coverage expected from its weighted hits, and references are combined
/// onto their ancestor at `rank` as a hit-weighted mean.
#[must_use]
pub fn estimate_coverage_with(
    alignment: &RawAlignment,
    model: &ConfusionModel,
    rank: TaxonomyRank,
    config: &CoverageConfig,
) -> CoverageTable {
    let bin_size = config.bin_size.max(1);
    let mut references: BTreeMap<String, ReferenceCoverage> = BTreeMap::new();
    let mut unresolved = 0usize;

    for (_, hits) in alignment.by_read() {
        let resolved: Vec<(&AlignmentHit, Lineage)> = hits
            .into_iter()
            .filter_map(|hit| resolve_lineage(model, hit).map(|l| (hit, l)))
            .collect();
        if resolved.is_empty() {
            unresolved += 1;
            continue;
        }

        for (reference, weight) in read_weights(model, &resolved, rank) {
            let entry = references.entry(reference.clone()).or_insert_with(|| {
                let (hit, lineage) = resolved
                    .iter()
                    .find(|(hit, _)| hit.reference == reference)
                    .map(|(hit, lineage)| (*hit, lineage.clone()))
                    .unzip();
                ReferenceCoverage::new(
                    lineage.unwrap_or_else(Lineage::unclassified),
                    hit.and_then(|h| model.find_reference(&h.reference))
                        .map_or(0, |e| e.genome_length),
                )
            });
            entry.hits += weight;

            let mut span_bins = 0u64;
            for (hit, _) in resolved.iter().filter(|(hit, _)| hit.reference == reference) {
                if hit.span() == 0 {
                    continue;
                }
                let first = (hit.start - 1) / bin_size;
                let last = (hit.end - 1) / bin_size;
                entry.bins.extend(first..=last);
                entry.max_end = entry.max_end.max(hit.end);
                span_bins = span_bins.max(last - first + 1);
            }
            #[allow(clippy::cast_precision_loss)]
            let span_bins = span_bins as f64;
            entry.weighted_span_bins += weight * span_bins;
        }
    }

    if unresolved > 0 {
        debug!(reads = unresolved, "Reads without a resolvable reference");
    }

    aggregate(references.into_values(), rank, bin_size)
}

/// Lineage of a hit's reference: the model's entry, else what the aligner reported
fn resolve_lineage(model: &ConfusionModel, hit: &AlignmentHit) -> Option<Lineage> {
    model
        .find_reference(&hit.reference)
        .map(|entry| entry.lineage.clone())
        .or_else(|| hit.lineage.clone())
        .filter(|lineage| !lineage.is_unclassified())
}

/// Share of one read given to each distinct reference it hit
#[allow(clippy::cast_precision_loss)]
fn read_weights(
    model: &ConfusionModel,
    resolved: &[(&AlignmentHit, Lineage)],
    rank: TaxonomyRank,
) -> Vec<(String, f64)> {
    // Distinct references in first-hit order, each with its taxon at `rank`
    let mut refs: Vec<(&str, Lineage)> = Vec::new();
    for (hit, lineage) in resolved {
        if !refs.iter().any(|(name, _)| *name == hit.reference) {
            refs.push((hit.reference.as_str(), lineage.truncate(rank)));
        }
    }
    if refs.len() == 1 {
        return vec![(refs[0].0.to_string(), 1.0)];
    }

    let source = resolved
        .iter()
        .skip(1)
        .fold(resolved[0].1.clone(), |acc, (_, l)| acc.lca(l));
    let taxa: BTreeSet<&Lineage> = refs.iter().map(|(_, taxon)| taxon).collect();

    let Some(shares) = apportion_among(model, &source, rank, |t| taxa.contains(t)) else {
        let equal = 1.0 / refs.len() as f64;
        return refs.iter().map(|(name, _)| ((*name).to_string(), equal)).collect();
    };

    refs.iter()
        .map(|(name, taxon)| {
            let share = shares
                .iter()
                .find(|(t, _)| t == taxon)
                .map_or(0.0, |(_, w)| *w);
            let siblings = refs.iter().filter(|(_, t)| t == taxon).count() as f64;
            ((*name).to_string(), share / siblings)
        })
        .collect()
}

fn aggregate(
    references: impl Iterator<Item = ReferenceCoverage>,
    rank: TaxonomyRank,
    bin_size: u64,
) -> CoverageTable {
    let mut sums: BTreeMap<Lineage, CoverageRow> = BTreeMap::new();
    for reference in references {
        let score = reference.score(bin_size);
        let row = sums.entry(reference.lineage.truncate(rank)).or_default();
        row.hits += score.hits;
        row.percent_coverage += score.hits * score.percent_coverage;
        row.expected_coverage += score.hits * score.expected_coverage;
        row.confidence += score.hits * score.confidence;
    }

    let rows = sums
        .into_iter()
        .map(|(lineage, sum)| {
            let row = if sum.hits > 0.0 {
                CoverageRow {
                    hits: sum.hits,
                    percent_coverage: sum.percent_coverage / sum.hits,
                    expected_coverage: sum.expected_coverage / sum.hits,
                    confidence: (sum.confidence / sum.hits).clamp(0.0, 1.0),
                }
            } else {
                CoverageRow::default()
            };
            (lineage, row)
        })
        .collect();

    CoverageTable {
        rank: Some(rank),
        rows,
    }
}

/// Render a coverage table with five decimals per value
#[must_use]
pub fn format_coverage(table: &CoverageTable) -> String {
    let mut out = format!("{OTU_HEADER}\thits\tpercent_coverage\texpected_coverage\tconfidence\n");
    for (lineage, row) in table.rows() {
        let _ = writeln!(
            out,
            "{lineage}\t{:.5}\t{:.5}\t{:.5}\t{:.5}",
            row.hits, row.percent_coverage, row.expected_coverage, row.confidence
        );
    }
    out
}
