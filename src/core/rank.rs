use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RankError {
    #[error("Invalid taxonomic level '{0}' (expected one of kingdom, phylum, class, order, family, genus, species, strain, all, off)")]
    Invalid(String),

    #[error("Rank index {0} is outside 1..=8")]
    IndexOutOfRange(usize),
}

/// One of the eight canonical taxonomic ranks, ordered from coarsest to finest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyRank {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
    Strain,
}

impl TaxonomyRank {
    /// All ranks from kingdom to strain
    pub const ALL: [TaxonomyRank; 8] = [
        Self::Kingdom,
        Self::Phylum,
        Self::Class,
        Self::Order,
        Self::Family,
        Self::Genus,
        Self::Species,
        Self::Strain,
    ];

    /// 1-based depth of the rank (kingdom = 1, strain = 8)
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Kingdom => 1,
            Self::Phylum => 2,
            Self::Class => 3,
            Self::Order => 4,
            Self::Family => 5,
            Self::Genus => 6,
            Self::Species => 7,
            Self::Strain => 8,
        }
    }

    /// Rank at a 1-based depth
    ///
    /// # Errors
    ///
    /// Returns `RankError::IndexOutOfRange` unless `index` is in `1..=8`.
    pub fn from_index(index: usize) -> Result<Self, RankError> {
        index
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(RankError::IndexOutOfRange(index))
    }

    /// Single-letter lineage prefix (`k__`, `p__`, ...)
    #[must_use]
    pub fn prefix(self) -> char {
        match self {
            Self::Kingdom => 'k',
            Self::Phylum => 'p',
            Self::Class => 'c',
            Self::Order => 'o',
            Self::Family => 'f',
            Self::Genus => 'g',
            Self::Species => 's',
            Self::Strain => 't',
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Kingdom => "kingdom",
            Self::Phylum => "phylum",
            Self::Class => "class",
            Self::Order => "order",
            Self::Family => "family",
            Self::Genus => "genus",
            Self::Species => "species",
            Self::Strain => "strain",
        }
    }

    /// Ranks fine enough to feed functional profiling
    #[must_use]
    pub fn supports_functional_profiling(self) -> bool {
        self >= Self::Genus
    }
}

impl std::fmt::Display for TaxonomyRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TaxonomyRank {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|rank| rank.name() == lowered)
            .ok_or_else(|| RankError::Invalid(s.to_string()))
    }
}

/// The level a command collapses to: one rank, every rank, or no redistribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Rank(TaxonomyRank),
    All,
    Off,
}

impl Level {
    /// Ranks this level expands to, in kingdom-to-strain order
    #[must_use]
    pub fn ranks(self) -> Vec<TaxonomyRank> {
        match self {
            Self::Rank(rank) => vec![rank],
            Self::All => TaxonomyRank::ALL.to_vec(),
            Self::Off => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_off(self) -> bool {
        matches!(self, Self::Off)
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::Rank(TaxonomyRank::Strain)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rank(rank) => write!(f, "{rank}"),
            Self::All => write!(f, "all"),
            Self::Off => write!(f, "off"),
        }
    }
}

impl FromStr for Level {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "off" => Ok(Self::Off),
            _ => s.parse().map(Self::Rank),
        }
    }
}
