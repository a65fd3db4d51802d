use std::sync::Arc;

use rust_htslib::bam::record::Cigar;
use rust_htslib::bam::Record;

use crate::alleles::{
    AlleleCategory, AlleleType, AnchorState, CandidateAllele, DirectionType, SupportByDirection,
};
use crate::reference::ChrReference;
use crate::region::AlignmentObservations;

fn single(direction: DirectionType) -> SupportByDirection {
    let mut support = [0; 3];
    support[direction.index()] = 1;
    support
}

/// Decode one aligned BAM record into per-position observations and the
/// candidates it evidences.
///
/// Matched bases below `min_base_quality` contribute neither counts nor
/// candidates. Deleted reference positions are recorded with the deletion
/// marker so spanning depth is preserved. Indels flush against a read edge
/// are marked open on that side: their placement inside a repeat run is not
/// yet anchored. Overlapping-pair stitching happens upstream of this
/// adapter, so records decode as plain forward or reverse evidence.
pub fn decode_alignment(
    record: &Record,
    reference: &ChrReference,
    min_base_quality: u8,
) -> (AlignmentObservations, Vec<CandidateAllele>) {
    let chromosome: Arc<str> = Arc::clone(reference.name());
    let sequence = record.seq().as_bytes();
    let qualities = record.qual();
    let direction = if record.is_reverse() {
        DirectionType::Reverse
    } else {
        DirectionType::Forward
    };

    let operations: Vec<Cigar> = record.cigar().iter().copied().collect();
    let aligned_before = |index: usize| {
        operations[..index]
            .iter()
            .any(|op| matches!(op, Cigar::Match(_) | Cigar::Equal(_) | Cigar::Diff(_)))
    };
    let aligned_after = |index: usize| {
        operations[index + 1..]
            .iter()
            .any(|op| matches!(op, Cigar::Match(_) | Cigar::Equal(_) | Cigar::Diff(_)))
    };

    let mut triples = Vec::new();
    let mut candidates = Vec::new();
    let mut ref_pos = (record.pos() + 1) as u32;
    let mut read_pos = 0usize;

    for (index, op) in operations.iter().enumerate() {
        match *op {
            Cigar::Match(len) | Cigar::Equal(len) | Cigar::Diff(len) => {
                for _ in 0..len {
                    let base = sequence[read_pos].to_ascii_uppercase();
                    let quality = qualities.get(read_pos).copied().unwrap_or(0);
                    if quality >= min_base_quality {
                        let allele = AlleleType::from_base(base);
                        triples.push((ref_pos, allele, direction));
                        if let Some(ref_base) = reference.base_at(ref_pos) {
                            if ref_base != base && allele != AlleleType::N {
                                candidates.push(CandidateAllele::new(
                                    Arc::clone(&chromosome),
                                    ref_pos,
                                    String::from_utf8_lossy(&[ref_base]).to_string(),
                                    String::from_utf8_lossy(&[base]).to_string(),
                                    AlleleCategory::Snv,
                                    single(direction),
                                ));
                            }
                        }
                    }
                    ref_pos += 1;
                    read_pos += 1;
                }
            }
            Cigar::Ins(len) => {
                let anchor = ref_pos.saturating_sub(1);
                if let Some(anchor_base) = reference.base_at(anchor) {
                    let inserted = &sequence[read_pos..read_pos + len as usize];
                    let mut alternate = String::with_capacity(len as usize + 1);
                    alternate.push(anchor_base as char);
                    alternate.push_str(&String::from_utf8_lossy(inserted).to_uppercase());
                    let anchor_state = AnchorState::from_open_sides(
                        !aligned_before(index),
                        !aligned_after(index),
                    );
                    candidates.push(
                        CandidateAllele::new(
                            Arc::clone(&chromosome),
                            anchor,
                            String::from_utf8_lossy(&[anchor_base]).to_string(),
                            alternate,
                            AlleleCategory::Insertion,
                            single(direction),
                        )
                        .with_anchor(anchor_state),
                    );
                }
                read_pos += len as usize;
            }
            Cigar::Del(len) => {
                let anchor = ref_pos.saturating_sub(1);
                for offset in 0..len {
                    triples.push((ref_pos + offset, AlleleType::Deletion, direction));
                }
                if let (Some(anchor_base), Some(deleted)) = (
                    reference.base_at(anchor),
                    reference.bases(ref_pos, ref_pos + len - 1),
                ) {
                    let mut reference_bases = String::with_capacity(len as usize + 1);
                    reference_bases.push(anchor_base as char);
                    reference_bases.push_str(&String::from_utf8_lossy(deleted));
                    let anchor_state = AnchorState::from_open_sides(
                        !aligned_before(index),
                        !aligned_after(index),
                    );
                    candidates.push(
                        CandidateAllele::new(
                            Arc::clone(&chromosome),
                            anchor,
                            reference_bases,
                            String::from_utf8_lossy(&[anchor_base]).to_string(),
                            AlleleCategory::Deletion,
                            single(direction),
                        )
                        .with_anchor(anchor_state),
                    );
                }
                ref_pos += len;
            }
            Cigar::SoftClip(len) => read_pos += len as usize,
            Cigar::RefSkip(len) => ref_pos += len,
            Cigar::HardClip(_) | Cigar::Pad(_) => {}
        }
    }

    (AlignmentObservations::from_triples(triples), candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_htslib::bam::header::{Header, HeaderRecord};
    use rust_htslib::bam::HeaderView;

    fn reference() -> ChrReference {
        //                           1234567890123456789 0
        ChrReference::new("chr1", b"ACGTACGTACGTACGTACGT".to_vec())
    }

    fn record(pos: i64, cigar: &str, seq: &[u8]) -> Record {
        let mut header = Header::new();
        let mut sq = HeaderRecord::new(b"SQ");
        sq.push_tag(b"SN", &"chr1");
        sq.push_tag(b"LN", &20i64);
        header.push_record(&sq);
        let view = HeaderView::from_header(&header);

        let quals = vec![40u8; seq.len()];
        let sam = format!(
            "read1\t0\tchr1\t{}\t60\t{}\t*\t0\t0\t{}\t{}",
            pos,
            cigar,
            String::from_utf8_lossy(seq),
            quals.iter().map(|q| (q + 33) as char).collect::<String>(),
        );
        Record::from_sam(&view, sam.as_bytes()).expect("valid SAM line")
    }

    #[test]
    fn matching_read_yields_counts_and_no_candidates() {
        let (observations, candidates) = decode_alignment(&record(1, "4M", b"ACGT"), &reference(), 20);
        assert_eq!(observations.observations.len(), 4);
        assert_eq!(observations.first_position(), Some(1));
        assert_eq!(observations.last_position(), Some(4));
        assert!(candidates.is_empty());
    }

    #[test]
    fn mismatch_becomes_snv_candidate() {
        let (_, candidates) = decode_alignment(&record(1, "4M", b"ACTT"), &reference(), 20);
        assert_eq!(candidates.len(), 1);
        let snv = &candidates[0];
        assert_eq!(snv.coordinate, 3);
        assert_eq!(snv.reference, "G");
        assert_eq!(snv.alternate, "T");
        assert_eq!(snv.support, [1, 0, 0]);
    }

    #[test]
    fn deletion_records_markers_and_candidate() {
        // 2M2D2M starting at 1: deletes positions 3-4.
        let (observations, candidates) =
            decode_alignment(&record(1, "2M2D2M", b"ACAC"), &reference(), 20);
        let markers: Vec<u32> = observations
            .observations
            .iter()
            .filter(|o| o.allele == AlleleType::Deletion)
            .map(|o| o.position)
            .collect();
        assert_eq!(markers, vec![3, 4]);

        assert_eq!(candidates.len(), 1);
        let deletion = &candidates[0];
        assert_eq!(deletion.category, AlleleCategory::Deletion);
        assert_eq!(deletion.coordinate, 2);
        assert_eq!(deletion.reference, "CGT");
        assert_eq!(deletion.alternate, "C");
        assert!(deletion.anchor.is_fully_anchored());
    }

    #[test]
    fn insertion_candidate_is_anchored_to_previous_base() {
        let (_, candidates) = decode_alignment(&record(1, "2M2I2M", b"ACTTGT"), &reference(), 20);
        assert_eq!(candidates.len(), 1);
        let insertion = &candidates[0];
        assert_eq!(insertion.category, AlleleCategory::Insertion);
        assert_eq!(insertion.coordinate, 2);
        assert_eq!(insertion.reference, "C");
        assert_eq!(insertion.alternate, "CTT");
    }

    #[test]
    fn edge_indel_is_open_ended() {
        // Deletion with nothing aligned after it (trailing soft clip only).
        let (_, candidates) = decode_alignment(&record(1, "2M2D2S", b"ACAC"), &reference(), 20);
        let deletion = candidates
            .iter()
            .find(|c| c.category == AlleleCategory::Deletion)
            .unwrap();
        assert!(deletion.anchor.open_on_right());
        assert!(!deletion.anchor.open_on_left());
    }

    #[test]
    fn low_quality_bases_are_dropped() {
        let (observations, candidates) = decode_alignment(&record(1, "4M", b"ACTT"), &reference(), 60);
        assert!(observations.observations.is_empty());
        assert!(candidates.is_empty());
    }

    #[test]
    fn reverse_strand_lands_in_reverse_bucket() {
        let mut rec = record(1, "4M", b"ACGT");
        rec.set_flags(0x10);
        let (observations, _) = decode_alignment(&rec, &reference(), 20);
        assert!(observations
            .observations
            .iter()
            .all(|o| o.direction == DirectionType::Reverse));
    }
}
