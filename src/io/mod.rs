//! File-format adapters around the core: FASTA reference loading, BAM
//! alignment decoding and VCF output.

mod alignments;
mod fasta;
mod vcf;

pub use alignments::decode_alignment;
pub use fasta::load_reference;
pub use vcf::{render_vcf, write_vcf};
