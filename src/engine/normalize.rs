use crate::core::table::AbundanceTable;

/// Median of the per-sample totals (mean of the two middle values for an
/// even number of samples), 0 for a table without samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn median_depth(table: &AbundanceTable) -> f64 {
    let mut totals = table.sample_totals();
    if totals.is_empty() {
        return 0.0;
    }
    totals.sort_unstable();
    let mid = totals.len() / 2;
    if totals.len() % 2 == 0 {
        (totals[mid - 1] as f64 + totals[mid] as f64) / 2.0
    } else {
        totals[mid] as f64
    }
}

/// Rescale every sample to the median sample depth.
///
/// Each cell becomes `round(count * median / sample_total)`. Samples with no
/// counts stay empty.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn normalize_by_median_depth(table: &AbundanceTable) -> AbundanceTable {
    let median = median_depth(table);
    let totals = table.sample_totals();
    let mut normalized = AbundanceTable::new(table.samples().iter().cloned());

    for (lineage, row) in table.rows() {
        for (&sample, &count) in row {
            let total = totals[sample];
            if total == 0 {
                continue;
            }
            let scaled = (count as f64 * median / total as f64).round() as u64;
            if scaled > 0 {
                normalized.add(lineage.clone(), sample, scaled);
            }
        }
    }
    normalized
}
