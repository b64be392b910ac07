use std::collections::BTreeMap;

use crate::core::lineage::Lineage;
use crate::core::rank::TaxonomyRank;
use crate::model::shear::ConfusionModel;

/// Normalized weights for splitting counts on `source` across taxa at `target`.
///
/// A source at or below `target` maps entirely onto its ancestor at `target`.
/// A coarser source is split using the model: every reference under it
/// contributes its hits at the source's own rank, aggregated onto the
/// reference's ancestor at `target`. Weights sum to 1 and are returned in
/// lineage order.
///
/// Returns `None` when the source is unclassified or the model has no
/// positive weight for it.
#[must_use]
pub fn apportion(
    model: &ConfusionModel,
    source: &Lineage,
    target: TaxonomyRank,
) -> Option<Vec<(Lineage, f64)>> {
    apportion_among(model, source, target, |_| true)
}

/// [`apportion`] restricted to candidate taxa accepted by `keep`.
///
/// Weights are renormalized over the kept candidates. Used when the set of
/// plausible taxa is already known, e.g. the references a read actually hit.
#[must_use]
pub fn apportion_among(
    model: &ConfusionModel,
    source: &Lineage,
    target: TaxonomyRank,
    keep: impl Fn(&Lineage) -> bool,
) -> Option<Vec<(Lineage, f64)>> {
    if source.is_unclassified() {
        return None;
    }
    if source.depth() >= target.index() {
        let taxon = source.truncate(target);
        return keep(&taxon).then(|| vec![(taxon, 1.0)]);
    }
    let source_rank = source.rank()?;

    let mut weights: BTreeMap<Lineage, f64> = BTreeMap::new();
    for reference in model.references_under(source) {
        let weight = reference.hits_at(source_rank);
        if weight <= 0.0 || !weight.is_finite() {
            continue;
        }
        let taxon = reference.lineage.truncate(target);
        if keep(&taxon) {
            *weights.entry(taxon).or_insert(0.0) += weight;
        }
    }

    let total: f64 = weights.values().sum();
    if total <= 0.0 {
        return None;
    }
    Some(
        weights
            .into_iter()
            .map(|(taxon, weight)| (taxon, weight / total))
            .collect(),
    )
}
