//! Property tests for the interval primitives and the evidence cache's
//! zero-defaulting read contract.

use proptest::prelude::*;
use test_case::test_case;

use moray::alleles::{AlleleCategory, AlleleType, CandidateAllele, DirectionType};
use moray::region::{AlignmentObservations, Region, RegionStateManager};

proptest! {
    /// Merge succeeds exactly when the intervals overlap, and the merge is
    /// their union.
    #[test]
    fn merge_iff_overlap(
        a_start in 1u32..500,
        a_len in 0u32..100,
        b_start in 1u32..500,
        b_len in 0u32..100,
    ) {
        let a = Region::new(a_start, a_start + a_len).unwrap();
        let b = Region::new(b_start, b_start + b_len).unwrap();
        match a.merge(&b) {
            Some(merged) => {
                prop_assert!(a.overlaps(&b));
                prop_assert_eq!(merged.start(), a.start().min(b.start()));
                prop_assert_eq!(merged.end(), a.end().max(b.end()));
                prop_assert!(merged.fully_contains(&a));
                prop_assert!(merged.fully_contains(&b));
            }
            None => prop_assert!(!a.overlaps(&b)),
        }
    }

    /// Overlap is symmetric, and containment of either endpoint implies it.
    #[test]
    fn overlap_is_symmetric(
        a_start in 1u32..500,
        a_len in 0u32..100,
        b_start in 1u32..500,
        b_len in 0u32..100,
    ) {
        let a = Region::new(a_start, a_start + a_len).unwrap();
        let b = Region::new(b_start, b_start + b_len).unwrap();
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        if a.contains_position(b.start()) || a.contains_position(b.end()) {
            prop_assert!(a.overlaps(&b));
        }
    }

    /// Reads of untouched state never fail and always report zero, for any
    /// position in the coordinate space.
    #[test]
    fn untouched_reads_are_zero(position in 1u32..100_000_000) {
        let state = RegionStateManager::new("chr1", 1000).unwrap();
        prop_assert_eq!(
            state.get_allele_count(position, AlleleType::C, DirectionType::Stitched),
            0
        );
        prop_assert_eq!(state.get_gapped_mnv_ref_count(position), 0);
        prop_assert_eq!(state.get_depth(position), 0);
    }

    /// Whatever lands in one direction bucket never leaks into another.
    #[test]
    fn direction_buckets_are_disjoint(
        forward in 0u32..20,
        reverse in 0u32..20,
        stitched in 0u32..20,
    ) {
        let mut state = RegionStateManager::new("chr1", 1000).unwrap();
        let mut triples = Vec::new();
        for _ in 0..forward {
            triples.push((500u32, AlleleType::A, DirectionType::Forward));
        }
        for _ in 0..reverse {
            triples.push((500u32, AlleleType::A, DirectionType::Reverse));
        }
        for _ in 0..stitched {
            triples.push((500u32, AlleleType::A, DirectionType::Stitched));
        }
        state
            .add_allele_counts(&AlignmentObservations::from_triples(triples))
            .unwrap();

        prop_assert_eq!(
            state.get_allele_count(500, AlleleType::A, DirectionType::Forward),
            forward
        );
        prop_assert_eq!(
            state.get_allele_count(500, AlleleType::A, DirectionType::Reverse),
            reverse
        );
        prop_assert_eq!(
            state.get_allele_count(500, AlleleType::A, DirectionType::Stitched),
            stitched
        );
    }

    /// Candidate support merges additively regardless of insertion order.
    #[test]
    fn candidate_merge_is_order_independent(
        first in 0u32..50,
        second in 0u32..50,
    ) {
        let build = |support: u32| {
            CandidateAllele::new(
                "chr1",
                777,
                "A",
                "T",
                AlleleCategory::Snv,
                [support, 0, 0],
            )
        };
        let mut forward_order = RegionStateManager::new("chr1", 1000).unwrap();
        forward_order
            .add_candidates([build(first), build(second)])
            .unwrap();
        let mut reverse_order = RegionStateManager::new("chr1", 1000).unwrap();
        reverse_order
            .add_candidates([build(second), build(first)])
            .unwrap();

        for state in [&mut forward_order, &mut reverse_order] {
            let batch = state.get_candidates_to_process(None, None);
            prop_assert_eq!(batch.candidates.len(), 1);
            prop_assert_eq!(batch.candidates[0].support, [first + second, 0, 0]);
        }
    }
}

#[test_case(5, 10, 11, 11 => false ; "adjacent intervals do not merge")]
#[test_case(5, 10, 10, 12 => true ; "single shared position merges")]
#[test_case(1, 3, 7, 9 => false ; "disjoint intervals do not merge")]
#[test_case(2, 8, 4, 6 => true ; "containment merges")]
fn merge_boundaries(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    let a = Region::new(a_start, a_end).unwrap();
    let b = Region::new(b_start, b_end).unwrap();
    a.merge(&b).is_some()
}
