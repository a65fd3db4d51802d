//! Allele-level data model shared by the evidence cache and the calling
//! pipeline: observed allele/direction types, candidate variants awaiting
//! evaluation, and finalized calls.

mod called;
mod candidate;
mod types;

pub use called::{CalledAllele, FilterType, Genotype, StrandBias};
pub use candidate::{AlleleCategory, AnchorState, CandidateAllele, CandidateKey};
pub use types::{
    sum_support, total_support, AlleleType, DirectionType, SupportByDirection, NUM_ALLELE_TYPES,
    NUM_DIRECTIONS,
};
