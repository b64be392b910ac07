use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::lineage::Lineage;
use crate::core::rank::TaxonomyRank;
use crate::core::table::AbundanceTable;
use crate::engine::apportion::apportion;
use crate::model::shear::ConfusionModel;

/// What to do with counts on a taxon coarser than the target that the model
/// cannot split
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Keep the count on the source lineage
    #[default]
    Retain,

    /// Move the count to an explicit `unclassified` row
    Unclassified,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedistributionConfig {
    pub fallback: FallbackPolicy,
}

/// Collapse or expand every row of `table` to `target` with the default
/// configuration.
#[must_use]
pub fn redistribute(
    table: &AbundanceTable,
    model: &ConfusionModel,
    target: TaxonomyRank,
) -> AbundanceTable {
    redistribute_with(table, model, target, &RedistributionConfig::default())
}

/// Collapse or expand every row of `table` to `target`.
///
/// Rows at or below `target` aggregate onto their ancestor at `target`. Rows
/// above it are split across the model's candidates at `target`; rows the
/// model knows nothing about follow `config.fallback`. Each split is rounded
/// within its own row and sample with the largest-remainder method, so every
/// source cell hands out exactly its count.
#[must_use]
pub fn redistribute_with(
    table: &AbundanceTable,
    model: &ConfusionModel,
    target: TaxonomyRank,
    config: &RedistributionConfig,
) -> AbundanceTable {
    let mut out = AbundanceTable::new(table.samples().iter().cloned());
    let mut fallback_rows = 0usize;

    for (lineage, row) in table.rows() {
        if lineage.is_unclassified() || lineage.depth() >= target.index() {
            let taxon = if lineage.is_unclassified() {
                Lineage::unclassified()
            } else {
                lineage.truncate(target)
            };
            for (&sample, &count) in row {
                out.add(taxon.clone(), sample, count);
            }
            continue;
        }

        if let Some(weights) = apportion(model, lineage, target) {
            for (&sample, &count) in row {
                for ((taxon, _), share) in weights.iter().zip(split_count(count, &weights)) {
                    if share > 0 {
                        out.add(taxon.clone(), sample, share);
                    }
                }
            }
            continue;
        }

        fallback_rows += 1;
        let taxon = match config.fallback {
            FallbackPolicy::Retain => lineage.clone(),
            FallbackPolicy::Unclassified => Lineage::unclassified(),
        };
        for (&sample, &count) in row {
            out.add(taxon.clone(), sample, count);
        }
    }

    if fallback_rows > 0 {
        debug!(
            rank = %target,
            rows = fallback_rows,
            policy = ?config.fallback,
            "Rows without a confusion model entry"
        );
    }
    out
}

/// Split `count` by normalized `weights` into integers summing to `count`.
///
/// Every share is floored, then the shortfall is handed out one count at a
/// time to the largest fractional parts; ties go to the earlier lineage.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn split_count(count: u64, weights: &[(Lineage, f64)]) -> Vec<u64> {
    let mut shares: Vec<u64> = Vec::with_capacity(weights.len());
    let mut remainders: Vec<(usize, f64)> = Vec::new();
    for (i, (_, weight)) in weights.iter().enumerate() {
        let value = count as f64 * weight;
        let floor = value.floor();
        shares.push(floor as u64);
        if value > floor {
            remainders.push((i, value - floor));
        }
    }

    let assigned: u64 = shares.iter().sum();
    if assigned > count {
        // Float error pushed the floors over; take the excess back from the largest shares
        let mut excess = assigned - count;
        while excess > 0 {
            let Some(largest) = (0..shares.len()).max_by_key(|&i| shares[i]) else {
                break;
            };
            shares[largest] -= 1;
            excess -= 1;
        }
        return shares;
    }

    let shortfall = (count - assigned) as usize;
    // Stable sort keeps lineage order among equal remainders
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1));
    for &(i, _) in remainders.iter().take(shortfall) {
        shares[i] += 1;
    }
    // Remainders that round to zero can leave counts unassigned
    let placed: u64 = shares.iter().sum();
    if placed < count {
        if let Some(first) = shares.first_mut() {
            *first += count - placed;
        }
    }
    shares
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::shear::ShearEntry;

    fn scenario_model() -> ConfusionModel {
        ConfusionModel::from_entries(vec![
            ShearEntry::new("taxonA;child1", 0).with_hits(TaxonomyRank::Kingdom, 7.0),
            ShearEntry::new("taxonA;child2", 0).with_hits(TaxonomyRank::Kingdom, 3.0),
        ])
        .unwrap()
    }

    fn single_sample(rows: &[(&str, u64)]) -> AbundanceTable {
        let mut table = AbundanceTable::new(["S1"]);
        for &(lineage, count) in rows {
            table.add(Lineage::new(lineage), 0, count);
        }
        table
    }

    #[test]
    fn test_split_by_model_weights() {
        let table = single_sample(&[("taxonA", 100), ("taxonB", 50)]);
        let out = redistribute(&table, &scenario_model(), TaxonomyRank::Phylum);

        assert_eq!(out.get_by_name("taxonA;child1", "S1"), 70);
        assert_eq!(out.get_by_name("taxonA;child2", "S1"), 30);
        assert_eq!(out.get_by_name("taxonB", "S1"), 50);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_unclassified_fallback_policy() {
        let table = single_sample(&[("taxonA", 100), ("taxonB", 50)]);
        let config = RedistributionConfig {
            fallback: FallbackPolicy::Unclassified,
        };
        let out = redistribute_with(&table, &scenario_model(), TaxonomyRank::Phylum, &config);

        assert_eq!(out.get_by_name("unclassified", "S1"), 50);
        assert_eq!(out.get_by_name("taxonB", "S1"), 0);
        assert_eq!(out.sample_totals(), vec![150]);
    }

    #[test]
    fn test_deeper_rows_aggregate() {
        let table = single_sample(&[("k__A;p__B;c__C", 4), ("k__A;p__B;c__D", 6), ("k__A;p__E", 1)]);
        let out = redistribute(&table, &ConfusionModel::default(), TaxonomyRank::Phylum);
        assert_eq!(out.get_by_name("k__A;p__B", "S1"), 10);
        assert_eq!(out.get_by_name("k__A;p__E", "S1"), 1);
    }

    #[test]
    fn test_rounding_preserves_totals() {
        let model = ConfusionModel::from_entries(vec![
            ShearEntry::new("k__A;p__B", 0).with_hits(TaxonomyRank::Kingdom, 1.0),
            ShearEntry::new("k__A;p__C", 0).with_hits(TaxonomyRank::Kingdom, 1.0),
            ShearEntry::new("k__A;p__D", 0).with_hits(TaxonomyRank::Kingdom, 1.0),
        ])
        .unwrap();
        let table = single_sample(&[("k__A", 10)]);
        let out = redistribute(&table, &model, TaxonomyRank::Phylum);

        // 10 / 3 each: the one leftover count goes to the first lineage
        assert_eq!(out.get_by_name("k__A;p__B", "S1"), 4);
        assert_eq!(out.get_by_name("k__A;p__C", "S1"), 3);
        assert_eq!(out.get_by_name("k__A;p__D", "S1"), 3);
        assert_eq!(out.sample_totals(), vec![10]);
    }

    #[test]
    fn test_unclassified_rows_pass_through() {
        let table = single_sample(&[("unclassified", 9)]);
        let out = redistribute(&table, &scenario_model(), TaxonomyRank::Strain);
        assert_eq!(out.get_by_name("unclassified", "S1"), 9);
    }

    #[test]
    fn test_empty_table_keeps_samples() {
        let table = AbundanceTable::new(["S1", "S2"]);
        let out = redistribute(&table, &scenario_model(), TaxonomyRank::Genus);
        assert!(out.is_empty());
        assert_eq!(out.samples().len(), 2);
    }

    #[test]
    fn test_multiple_samples_are_independent() {
        let mut table = AbundanceTable::new(["S1", "S2"]);
        table.add(Lineage::new("taxonA"), 0, 10);
        table.add(Lineage::new("taxonA"), 1, 3);
        let out = redistribute(&table, &scenario_model(), TaxonomyRank::Phylum);

        assert_eq!(out.get_by_name("taxonA;child1", "S1"), 7);
        assert_eq!(out.get_by_name("taxonA;child2", "S1"), 3);
        // 2.1 + 0.9: the larger remainder wins the leftover count
        assert_eq!(out.get_by_name("taxonA;child1", "S2"), 2);
        assert_eq!(out.get_by_name("taxonA;child2", "S2"), 1);
        assert_eq!(out.sample_totals(), vec![10, 3]);
    }

    #[test]
    fn test_leftovers_stay_within_their_source_row() {
        let model = ConfusionModel::from_entries(vec![
            ShearEntry::new("k__A;p__B;c__C;o__D;f__E;g__G1;s__a", 0).with_hits(TaxonomyRank::Genus, 1.0),
            ShearEntry::new("k__A;p__B;c__C;o__D;f__E;g__G1;s__b", 0).with_hits(TaxonomyRank::Genus, 1.0),
            ShearEntry::new("k__A;p__B;c__C;o__D;f__E;g__G2;s__c", 0).with_hits(TaxonomyRank::Genus, 1.0),
            ShearEntry::new("k__A;p__B;c__C;o__D;f__E;g__G2;s__d", 0).with_hits(TaxonomyRank::Genus, 1.0),
        ])
        .unwrap();
        let table = single_sample(&[
            ("k__A;p__B;c__C;o__D;f__E;g__G1", 1),
            ("k__A;p__B;c__C;o__D;f__E;g__G2", 1),
        ]);

        let species = redistribute(&table, &model, TaxonomyRank::Species);
        assert_eq!(species.get_by_name("k__A;p__B;c__C;o__D;f__E;g__G1;s__a", "S1"), 1);
        assert_eq!(species.get_by_name("k__A;p__B;c__C;o__D;f__E;g__G2;s__c", "S1"), 1);

        let back = redistribute(&species, &model, TaxonomyRank::Genus);
        assert_eq!(back, table);
    }

    #[test]
    fn test_split_count_sums_to_count() {
        let weights = vec![
            (Lineage::new("k__A;p__B"), 0.5),
            (Lineage::new("k__A;p__C"), 0.25),
            (Lineage::new("k__A;p__D"), 0.25),
        ];
        // 1.5, 0.75, 0.75: both 0.75 remainders beat 0.5
        assert_eq!(split_count(3, &weights), vec![1, 1, 1]);
        assert_eq!(split_count(0, &weights), vec![0, 0, 0]);
        assert_eq!(split_count(7, &weights).iter().sum::<u64>(), 7);
    }
}
