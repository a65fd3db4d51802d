use std::io::Write;

use anyhow::{anyhow, Result};

use crate::alleles::{AlleleCategory, CalledAllele};

const HEADER: &str = "\
##fileformat=VCFv4.3
##source=moray
##FILTER=<ID=q30,Description=\"Variant quality below threshold\">
##FILTER=<ID=LowDP,Description=\"Coverage below threshold\">
##FILTER=<ID=LowVariantFreq,Description=\"Allele frequency below threshold\">
##FILTER=<ID=SB,Description=\"Strand bias above threshold\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
";

/// Write calls as VCF. Reference calls render with a `.` alternate and the
/// `0/0` genotype in INFO.
pub fn write_vcf<W: Write>(writer: &mut W, calls: &[CalledAllele]) -> Result<()> {
    writer.write_all(HEADER.as_bytes())?;

    for call in calls {
        let alternate = if call.category == AlleleCategory::Reference {
            "."
        } else {
            call.alternate.as_str()
        };
        let line = format!(
            "{chrom}\t{pos}\t.\t{ref_bases}\t{alt_bases}\t{qual:.2}\t{filter}\tDP={depth};AD={support};AF={af:.4};GT={gt}\n",
            chrom = call.chromosome,
            pos = call.coordinate,
            ref_bases = call.reference,
            alt_bases = alternate,
            qual = call.variant_quality,
            filter = call.filter_field(),
            depth = call.total_coverage,
            support = call.allele_support,
            af = call.frequency,
            gt = call.genotype.as_vcf(),
        );
        writer.write_all(line.as_bytes())?;
    }

    writer.flush()?;
    Ok(())
}

/// Render calls into a VCF string (useful for tests and snapshots).
pub fn render_vcf(calls: &[CalledAllele]) -> Result<String> {
    let mut buffer = Vec::new();
    write_vcf(&mut buffer, calls)?;
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered VCF is not valid UTF-8"))
}
