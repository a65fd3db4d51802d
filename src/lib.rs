//! # Streaming somatic small-variant calling
//!
//! `moray` scans aligned reads for one chromosome, accumulates per-position
//! allele evidence in a bounded-memory windowed cache, and emits variant and
//! reference calls as the read frontier advances.
//!
//! ## Architecture
//!
//! 1. **Windowed cache**: evidence lands in fixed-size blocks created
//!    lazily per coordinate window ([`region::RegionStateManager`])
//! 2. **Release protocol**: blocks are retired in contiguous batches once
//!    the frontier leaves them far enough behind and no in-flight variant
//!    still claims them
//! 3. **Resolution pipeline**: batches are collapsed, called, and failed
//!    multi-base variants reallocated; fragments owned by future blocks
//!    re-enter the cache ([`calling::ChromosomeProcessor`])
//!
//! Memory stays proportional to the window between the oldest unresolved
//! block and the frontier, not to chromosome length.
//!
//! ## Usage Example
//!
//! ```
//! use moray::alleles::{AlleleCategory, CandidateAllele};
//! use moray::calling::ChromosomeProcessor;
//! use moray::config::CallerConfig;
//!
//! let config = CallerConfig::default().with_min_coverage(1);
//! let mut processor = ChromosomeProcessor::new("chr1", config, None).unwrap();
//! processor
//!     .add_alignment(
//!         &Default::default(),
//!         vec![CandidateAllele::new(
//!             "chr1",
//!             100,
//!             "A",
//!             "T",
//!             AlleleCategory::Snv,
//!             [8, 7, 0],
//!         )],
//!     )
//!     .unwrap();
//! let calls = processor.finish().unwrap();
//! assert_eq!(calls.len(), 1);
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

// Core modules - each implements one layer of the caller
pub mod alleles;    // Allele, candidate and call data model
pub mod region;     // Windowed evidence cache and release protocol
pub mod calling;    // Collapser, caller, reallocator, pipeline
pub mod config;     // Validated configuration
pub mod reference;  // Per-chromosome reference window
pub mod io;         // FASTA/BAM/VCF adapters

// Re-exports for convenience
pub use alleles::{AlleleType, CalledAllele, CandidateAllele, DirectionType};
pub use calling::{CallerError, ChromosomeProcessor};
pub use config::CallerConfig;
pub use reference::ChrReference;
pub use region::{AlignmentObservations, CandidateBatch, Region, RegionStateManager};
