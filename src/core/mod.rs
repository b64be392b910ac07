//! Core data types for taxonomic abundance profiling.
//!
//! - [`TaxonomyRank`]: The eight canonical ranks, kingdom to strain
//! - [`Level`]: A requested collapse level (one rank, all ranks, or off)
//! - [`Lineage`]: A `;`-joined, rank-prefixed taxon identifier
//! - [`AbundanceTable`]: Sparse lineage × sample read counts
//!
//! ## Lineage Format
//!
//! | Rank    | Prefix | Example                  |
//! |---------|--------|--------------------------|
//! | kingdom | `k__`  | `k__Bacteria`            |
//! | phylum  | `p__`  | `p__Firmicutes`          |
//! | class   | `c__`  | `c__Bacilli`             |
//! | order   | `o__`  | `o__Lactobacillales`     |
//! | family  | `f__`  | `f__Streptococcaceae`    |
//! | genus   | `g__`  | `g__Streptococcus`       |
//! | species | `s__`  | `s__Streptococcus_mitis` |
//! | strain  | `t__`  | `t__GCF_000148585`       |
//!
//! The rank of a lineage is its depth once unnamed trailing components are
//! dropped, so `k__Bacteria;p__Firmicutes;c__` is a phylum-level assignment.

pub mod lineage;
pub mod rank;
pub mod table;

pub use lineage::Lineage;
pub use rank::{Level, RankError, TaxonomyRank};
pub use table::AbundanceTable;
