//! Invariants of redistribution that must hold for any table and model.

use shogun::model::ShearEntry;
use shogun::{redistribute, AbundanceTable, ConfusionModel, Lineage, TaxonomyRank};

fn model() -> ConfusionModel {
    let base = "k__Bacteria;p__Firmicutes;c__Bacilli;o__Bacillales;f__Bacillaceae";
    ConfusionModel::from_entries(vec![
        ShearEntry::new(format!("{base};g__Bacillus;s__subtilis;t__168"), 4_200_000)
            .with_hits(TaxonomyRank::Family, 5.0)
            .with_hits(TaxonomyRank::Genus, 7.0)
            .with_hits(TaxonomyRank::Species, 1.0),
        ShearEntry::new(format!("{base};g__Bacillus;s__cereus;t__ATCC"), 5_400_000)
            .with_hits(TaxonomyRank::Family, 3.0)
            .with_hits(TaxonomyRank::Genus, 3.0)
            .with_hits(TaxonomyRank::Species, 1.0),
        ShearEntry::new(format!("{base};g__Geobacillus;s__kaustophilus;t__HTA426"), 3_500_000)
            .with_hits(TaxonomyRank::Family, 1.0),
    ])
    .unwrap()
}

fn table() -> AbundanceTable {
    let mut table = AbundanceTable::new(["S1", "S2", "S3"]);
    let rows: [(&str, [u64; 3]); 5] = [
        ("k__Bacteria;p__Firmicutes;c__Bacilli;o__Bacillales;f__Bacillaceae", [17, 3, 0]),
        ("k__Bacteria;p__Firmicutes;c__Bacilli;o__Bacillales;f__Bacillaceae;g__Bacillus", [101, 0, 7]),
        (
            "k__Bacteria;p__Firmicutes;c__Bacilli;o__Bacillales;f__Bacillaceae;g__Bacillus;s__subtilis;t__168",
            [5, 9, 1],
        ),
        ("k__Bacteria;p__Proteobacteria", [11, 0, 2]),
        ("unclassified", [4, 4, 4]),
    ];
    for (lineage, counts) in rows {
        for (sample, count) in counts.into_iter().enumerate() {
            if count > 0 {
                table.add(Lineage::new(lineage), sample, count);
            }
        }
    }
    table
}

#[test]
fn test_mass_is_conserved_at_every_rank() {
    let model = model();
    let table = table();
    let totals = table.sample_totals();

    for rank in TaxonomyRank::ALL {
        let redistributed = redistribute(&table, &model, rank);
        assert_eq!(redistributed.samples(), table.samples());
        assert_eq!(redistributed.sample_totals(), totals, "mass changed at {rank}");
    }
}

#[test]
fn test_collapse_is_idempotent() {
    let model = model();
    let table = table();

    for rank in TaxonomyRank::ALL {
        let once = redistribute(&table, &model, rank);
        let twice = redistribute(&once, &model, rank);
        assert_eq!(once, twice, "not idempotent at {rank}");
    }
}

#[test]
fn test_split_then_aggregate_round_trip() {
    let model = model();
    let table = table();

    let genus = redistribute(&table, &model, TaxonomyRank::Genus);
    let strain = redistribute(&genus, &model, TaxonomyRank::Strain);
    let back = redistribute(&strain, &model, TaxonomyRank::Genus);
    assert_eq!(back, genus);
}

#[test]
fn test_no_row_is_deeper_than_target() {
    let model = model();
    let table = table();

    for rank in TaxonomyRank::ALL {
        let redistributed = redistribute(&table, &model, rank);
        for lineage in redistributed.lineages() {
            assert!(
                lineage.is_unclassified() || lineage.depth() <= rank.index(),
                "{lineage} deeper than {rank}"
            );
        }
    }
}
