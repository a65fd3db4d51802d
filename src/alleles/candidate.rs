use std::fmt;
use std::sync::Arc;

use super::types::{sum_support, total_support, SupportByDirection};

/// Kind of allele a candidate (or call) represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub enum AlleleCategory {
    /// Matches the reference base.
    Reference,
    /// Single-base substitution.
    Snv,
    /// Multi-base substitution (reference and alternate of equal length).
    Mnv,
    /// Inserted sequence anchored at the preceding reference base.
    Insertion,
    /// Deleted sequence anchored at the preceding reference base.
    Deletion,
}

/// Anchoring state of a candidate's reference boundary.
///
/// Open sides mark candidates whose exact placement is still ambiguous,
/// typically indels truncated by a read edge inside a repeat run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub enum AnchorState {
    /// Both boundaries are fixed.
    FullyAnchored,
    /// The left boundary is still ambiguous.
    OpenLeft,
    /// The right boundary is still ambiguous.
    OpenRight,
    /// Neither boundary is fixed.
    OpenBoth,
}

impl AnchorState {
    /// Build the state from per-side openness flags.
    pub fn from_open_sides(open_left: bool, open_right: bool) -> Self {
        match (open_left, open_right) {
            (false, false) => AnchorState::FullyAnchored,
            (true, false) => AnchorState::OpenLeft,
            (false, true) => AnchorState::OpenRight,
            (true, true) => AnchorState::OpenBoth,
        }
    }

    /// Whether the left boundary is open.
    pub fn open_on_left(self) -> bool {
        matches!(self, AnchorState::OpenLeft | AnchorState::OpenBoth)
    }

    /// Whether the right boundary is open.
    pub fn open_on_right(self) -> bool {
        matches!(self, AnchorState::OpenRight | AnchorState::OpenBoth)
    }

    /// Whether both boundaries are fixed.
    pub fn is_fully_anchored(self) -> bool {
        matches!(self, AnchorState::FullyAnchored)
    }
}

/// Identity of a candidate within one chromosome: the composite signature
/// used as the storage key wherever candidates are merged by equality.
///
/// Ordering is coordinate-first so ordered maps yield candidates in
/// ascending genomic order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CandidateKey {
    /// 1-based start coordinate.
    pub coordinate: u32,
    /// Allele category.
    pub category: AlleleCategory,
    /// Reference bases.
    pub reference: String,
    /// Alternate bases.
    pub alternate: String,
}

/// A putative variant accumulating support until it becomes callable.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub struct CandidateAllele {
    /// Chromosome the candidate was observed on.
    #[cfg_attr(feature = "visualize", serde(serialize_with = "serialize_arc_str"))]
    pub chromosome: Arc<str>,
    /// 1-based start coordinate (anchor base for indels).
    pub coordinate: u32,
    /// Reference bases, uppercase ASCII.
    pub reference: String,
    /// Alternate bases, uppercase ASCII.
    pub alternate: String,
    /// Allele category.
    pub category: AlleleCategory,
    /// Support counts by evidence direction.
    pub support: SupportByDirection,
    /// Support inherited from representations collapsed into this candidate.
    pub collapsed_support: SupportByDirection,
    /// Boundary anchoring state.
    pub anchor: AnchorState,
}

#[cfg(feature = "visualize")]
fn serialize_arc_str<S: serde::Serializer>(v: &Arc<str>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(v)
}

impl CandidateAllele {
    /// Construct a fully anchored candidate.
    pub fn new(
        chromosome: impl Into<Arc<str>>,
        coordinate: u32,
        reference: impl Into<String>,
        alternate: impl Into<String>,
        category: AlleleCategory,
        support: SupportByDirection,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            coordinate,
            reference: reference.into(),
            alternate: alternate.into(),
            category,
            support,
            collapsed_support: [0; 3],
            anchor: AnchorState::FullyAnchored,
        }
    }

    /// Set the anchoring state, builder style.
    pub fn with_anchor(mut self, anchor: AnchorState) -> Self {
        self.anchor = anchor;
        self
    }

    /// Composite identity used as the signature-map key.
    pub fn signature(&self) -> CandidateKey {
        CandidateKey {
            coordinate: self.coordinate,
            category: self.category,
            reference: self.reference.clone(),
            alternate: self.alternate.clone(),
        }
    }

    /// Number of reference positions claimed by this candidate, computed
    /// from the longer of the reference and alternate sequences so that
    /// indels straddling a block boundary are tracked in full.
    pub fn span(&self) -> u32 {
        self.reference.len().max(self.alternate.len()).max(1) as u32
    }

    /// Highest reference coordinate reached by this candidate's span.
    pub fn endpoint(&self) -> u32 {
        self.coordinate + self.span() - 1
    }

    /// Total support across all directions.
    pub fn total_support(&self) -> u32 {
        total_support(self.support)
    }

    /// Merge another observation of the same allele into this one.
    pub fn add_support_from(&mut self, other: &CandidateAllele) {
        self.support = sum_support(self.support, other.support);
        self.collapsed_support = sum_support(self.collapsed_support, other.collapsed_support);
    }

    /// Whether either boundary is still open.
    pub fn is_open_ended(&self) -> bool {
        !self.anchor.is_fully_anchored()
    }
}

/// Candidates are equal iff chromosome, coordinate, reference, alternate and
/// category all match; support and anchoring never participate in identity.
impl PartialEq for CandidateAllele {
    fn eq(&self, other: &Self) -> bool {
        self.chromosome == other.chromosome
            && self.coordinate == other.coordinate
            && self.category == other.category
            && self.reference == other.reference
            && self.alternate == other.alternate
    }
}

impl Eq for CandidateAllele {}

impl fmt::Display for CandidateAllele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}>{} ({:?})",
            self.chromosome, self.coordinate, self.reference, self.alternate, self.category
        )
    }
}
