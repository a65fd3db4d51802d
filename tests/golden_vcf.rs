#[path = "common/mod.rs"]
mod common;
use common::assert_snapshot;

use moray::alleles::{AlleleCategory, CalledAllele, CandidateAllele, Genotype};
use moray::io::render_vcf;

#[test]
fn render_vcf_matches_golden() {
    let variant_candidate =
        CandidateAllele::new("chr1", 42, "A", "G", AlleleCategory::Snv, [6, 6, 0]);
    let mut variant = CalledAllele::from_candidate(&variant_candidate);
    variant.total_coverage = 100;
    variant.variant_quality = 57.21;
    variant.frequency = 0.12;
    variant.genotype = Genotype::Heterozygous;

    let reference_candidate =
        CandidateAllele::new("chr1", 43, "C", "C", AlleleCategory::Reference, [50, 48, 0]);
    let mut reference = CalledAllele::from_candidate(&reference_candidate);
    reference.total_coverage = 98;
    reference.variant_quality = 80.0;
    reference.frequency = 1.0;
    reference.genotype = Genotype::HomozygousRef;

    let actual = render_vcf(&[variant, reference]).expect("VCF rendering should succeed");
    assert_snapshot("calls/simple.vcf", &actual);
}
