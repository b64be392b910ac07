use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::lineage::Lineage;
use crate::core::table::AbundanceTable;
use crate::model::taxonomy::ReferenceTaxonomy;
use crate::parsing::alignment::{sample_from_read_id, AlignmentHit, RawAlignment};

/// How a read with several hits is placed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMode {
    /// Trust the aligner's own choice: the first hit that resolves
    Capitalist,

    /// Lowest common ancestor of every hit
    #[default]
    Lca,
}

/// Count reads per lineage per sample.
///
/// Hit lineages come from the aligner when it reports one, else from
/// `taxonomy`. Reads with no resolvable hit, or whose hits share no
/// ancestor, are dropped.
#[must_use]
pub fn assign_taxonomy(
    alignment: &RawAlignment,
    taxonomy: &ReferenceTaxonomy,
    mode: AssignmentMode,
) -> AbundanceTable {
    let mut table = AbundanceTable::default();
    let mut dropped = 0usize;

    let reads = alignment.by_read();
    let n_reads = reads.len();
    for (read, hits) in reads {
        let mut lineages = hits.iter().filter_map(|hit| hit_lineage(taxonomy, hit));
        let assigned = match mode {
            AssignmentMode::Capitalist => lineages.next(),
            AssignmentMode::Lca => lineages.reduce(|acc, lineage| acc.lca(&lineage)),
        };
        match assigned {
            Some(lineage) if !lineage.is_unclassified() => {
                table.add_for_sample(lineage, sample_from_read_id(read), 1);
            }
            _ => dropped += 1,
        }
    }

    debug!(
        reads = n_reads,
        dropped,
        rows = table.len(),
        "Assigned taxonomy"
    );
    table
}

fn hit_lineage(taxonomy: &ReferenceTaxonomy, hit: &AlignmentHit) -> Option<Lineage> {
    hit.lineage
        .clone()
        .or_else(|| taxonomy.resolve(&hit.reference))
        .filter(|lineage| !lineage.is_unclassified())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::alignment::{parse_alignment_text, AlignmentFormat};

    fn sam() -> RawAlignment {
        let text = "S1_1\t0\tref1\t1\t255\t10M\t*\t0\t0\tA\tI\n\
                    S1_1\t256\tref2\t1\t255\t10M\t*\t0\t0\tA\tI\n\
                    S1_2\t0\tref1\t1\t255\t10M\t*\t0\t0\tA\tI\n\
                    S2_1\t0\tref3\t1\t255\t10M\t*\t0\t0\tA\tI\n\
                    S2_2\t0\tunknown\t1\t255\t10M\t*\t0\t0\tA\tI\n";
        parse_alignment_text(text, AlignmentFormat::Sam).unwrap()
    }

    fn taxonomy() -> ReferenceTaxonomy {
        let mut taxonomy = ReferenceTaxonomy::default();
        taxonomy.insert("ref1", Lineage::new("k__A;p__B;c__C"));
        taxonomy.insert("ref2", Lineage::new("k__A;p__B;c__D"));
        taxonomy.insert("ref3", Lineage::new("k__E"));
        taxonomy
    }

    #[test]
    fn test_lca_assignment() {
        let table = assign_taxonomy(&sam(), &taxonomy(), AssignmentMode::Lca);
        assert_eq!(table.samples(), &["S1".to_string(), "S2".to_string()]);
        assert_eq!(table.get_by_name("k__A;p__B", "S1"), 1);
        assert_eq!(table.get_by_name("k__A;p__B;c__C", "S1"), 1);
        assert_eq!(table.get_by_name("k__E", "S2"), 1);
        assert_eq!(table.sample_totals(), vec![2, 1]);
    }

    #[test]
    fn test_capitalist_takes_first_hit() {
        let table = assign_taxonomy(&sam(), &taxonomy(), AssignmentMode::Capitalist);
        assert_eq!(table.get_by_name("k__A;p__B;c__C", "S1"), 2);
        assert_eq!(table.get_by_name("k__A;p__B", "S1"), 0);
    }

    #[test]
    fn test_disjoint_hits_are_dropped() {
        let text = "S1_1\tk__A;p__B\nS1_1\tk__Z\n";
        let aln = parse_alignment_text(text, AlignmentFormat::Utree).unwrap();
        let table = assign_taxonomy(&aln, &ReferenceTaxonomy::default(), AssignmentMode::Lca);
        assert!(table.is_empty());
    }

    #[test]
    fn test_aligner_lineage_takes_precedence() {
        let text = "S1_1\tref1\t99\t100\t0\t0\t1\t100\t1\t100\t0\t100\tk__Q;p__R\n";
        let aln = parse_alignment_text(text, AlignmentFormat::Blast6).unwrap();
        let table = assign_taxonomy(&aln, &taxonomy(), AssignmentMode::Capitalist);
        assert_eq!(table.get_by_name("k__Q;p__R", "S1"), 1);
    }
}
