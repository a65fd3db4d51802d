//! The resolution pipeline: collapsing ambiguous candidate representations,
//! calling alleles with the statistical calculators, and reallocating failed
//! multi-base variants.

mod caller;
mod collapser;
mod pipeline;
mod reallocator;
mod statistics;

pub use caller::{AlleleCaller, CallOutcome};
pub use collapser::{can_collapse_into, CollapseOutcome, VariantCollapser};
pub use pipeline::{CallerError, ChromosomeProcessor};
pub use reallocator::{MnvReallocator, ReallocationResult};
pub use statistics::{
    compute_strand_bias, genotype_for_reference, genotype_for_variant, variant_quality_score,
    MAX_VARIANT_QSCORE,
};
