use serde::{Deserialize, Serialize};

use crate::core::rank::TaxonomyRank;

/// Label used for counts that could not be placed on any lineage
pub const UNCLASSIFIED: &str = "unclassified";

/// A taxon identifier: rank-prefixed names joined by `;`, coarsest first
///
/// ```text
/// k__Bacteria;p__Firmicutes;c__Bacilli;o__Lactobacillales;f__Streptococcaceae;g__Streptococcus
/// ```
///
/// Unnamed trailing components (`s__`, `t__`, or empty) are trimmed on
/// construction, so the depth of a lineage is the rank it was resolved to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lineage(String);

impl Lineage {
    pub fn new(s: impl AsRef<str>) -> Self {
        let components: Vec<&str> = s
            .as_ref()
            .split(';')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        let named = components
            .iter()
            .rposition(|c| !is_unnamed(c))
            .map_or(0, |last| last + 1);
        Self(components[..named].join(";"))
    }

    pub fn unclassified() -> Self {
        Self(UNCLASSIFIED.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(';').filter(|c| !c.is_empty())
    }

    /// Number of named components
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.is_unclassified() {
            0
        } else {
            self.components().count()
        }
    }

    /// Rank the lineage resolves to, `None` when it is empty or deeper than strain
    #[must_use]
    pub fn rank(&self) -> Option<TaxonomyRank> {
        TaxonomyRank::from_index(self.depth()).ok()
    }

    #[must_use]
    pub fn is_unclassified(&self) -> bool {
        self.0.is_empty() || self.0 == UNCLASSIFIED
    }

    /// Ancestor at `rank`, or the lineage itself when it is already at or above it
    #[must_use]
    pub fn truncate(&self, rank: TaxonomyRank) -> Self {
        if self.depth() <= rank.index() {
            return self.clone();
        }
        Self(self.components().take(rank.index()).collect::<Vec<_>>().join(";"))
    }

    /// True when `self` is `other` or one of its ancestors
    #[must_use]
    pub fn contains(&self, other: &Lineage) -> bool {
        if self.is_unclassified() || other.is_unclassified() {
            return false;
        }
        let mut theirs = other.components();
        self.components().all(|c| theirs.next() == Some(c))
    }

    /// Lowest common ancestor of two lineages (unclassified when they share nothing)
    #[must_use]
    pub fn lca(&self, other: &Lineage) -> Self {
        let shared: Vec<&str> = self
            .components()
            .zip(other.components())
            .take_while(|(a, b)| a == b)
            .map(|(a, _)| a)
            .collect();
        if shared.is_empty() || self.is_unclassified() || other.is_unclassified() {
            Self::unclassified()
        } else {
            Self(shared.join(";"))
        }
    }

    /// Last named component
    #[must_use]
    pub fn leaf(&self) -> Option<&str> {
        self.components().last()
    }

    /// Every proper and improper ancestor, coarsest first
    pub fn prefixes(&self) -> impl Iterator<Item = Lineage> + '_ {
        (1..=self.depth()).map(move |depth| {
            Self(self.components().take(depth).collect::<Vec<_>>().join(";"))
        })
    }

    /// Check the lineage against the rank enumeration.
    ///
    /// Returns a description of the first problem found: more than eight
    /// components, or a `x__` prefix that does not match its position.
    #[must_use]
    pub fn inconsistency(&self) -> Option<String> {
        let depth = self.depth();
        if depth > TaxonomyRank::Strain.index() {
            return Some(format!("{depth} ranks exceeds the maximum of 8"));
        }
        for (component, rank) in self.components().zip(TaxonomyRank::ALL) {
            if let Some(prefix) = rank_prefix(component) {
                if prefix != rank.prefix() {
                    return Some(format!(
                        "component '{component}' sits at {rank} but carries prefix '{prefix}__'"
                    ));
                }
            }
        }
        None
    }
}

impl std::fmt::Display for Lineage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lineage {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Lineage {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// The `x` of an `x__Name` component
fn rank_prefix(component: &str) -> Option<char> {
    let mut chars = component.chars();
    let letter = chars.next()?;
    if letter.is_ascii_lowercase() && component[1..].starts_with("__") {
        Some(letter)
    } else {
        None
    }
}

fn is_unnamed(component: &str) -> bool {
    component.is_empty() || (rank_prefix(component).is_some() && component.len() == 3)
}
