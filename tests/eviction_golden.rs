//! Acceptance scenario for the block release protocol: candidate placement,
//! lag boundaries, batch contents, cleared ranges and block recycling,
//! checked call for call.

use moray::alleles::{AlleleCategory, CandidateAllele};
use moray::region::{Region, RegionStateManager};

fn snv(coordinate: u32, alternate: &str) -> CandidateAllele {
    CandidateAllele::new(
        "chr1",
        coordinate,
        "A",
        alternate,
        AlleleCategory::Snv,
        [1, 0, 0],
    )
}

fn one_base_deletion(coordinate: u32) -> CandidateAllele {
    CandidateAllele::new(
        "chr1",
        coordinate,
        "AT",
        "A",
        AlleleCategory::Deletion,
        [1, 0, 0],
    )
}

fn region(start: u32, end: u32) -> Region {
    Region::new(start, end).unwrap()
}

#[test]
fn blocks_release_in_lagged_contiguous_batches() {
    let mut state = RegionStateManager::new("chr1", 1000).unwrap();
    state
        .add_candidates([
            snv(1, "T"),
            one_base_deletion(999),
            snv(1000, "T"),
            snv(1001, "T"),
            snv(1001, "G"),
            one_base_deletion(3000),
            one_base_deletion(3001),
        ])
        .unwrap();

    // The frontier has not yet left the first block a full block behind.
    for frontier in [1, 1000, 1500, 2000] {
        let batch = state.get_candidates_to_process(Some(frontier), None);
        assert!(
            batch.candidates.is_empty() && batch.cleared_regions.is_empty(),
            "frontier {frontier} must not release anything"
        );
    }

    // One position further and the first block comes out alone.
    let batch = state.get_candidates_to_process(Some(2001), None);
    assert_eq!(
        batch.candidates.iter().map(|c| c.coordinate).collect::<Vec<_>>(),
        vec![1, 999, 1000]
    );
    assert_eq!(batch.cleared_regions, vec![region(1, 1000)]);
    assert_eq!(batch.max_cleared_position, Some(1000));
    state.done_processing(&batch);

    // The release was committed: the same frontier yields nothing more.
    let batch = state.get_candidates_to_process(Some(2001), None);
    assert!(batch.candidates.is_empty() && batch.cleared_regions.is_empty());

    // At 4000 the next two blocks come out together, including the
    // deletion at 3000 whose span pokes into the following block.
    let batch = state.get_candidates_to_process(Some(4000), None);
    assert_eq!(
        batch.candidates.iter().map(|c| c.coordinate).collect::<Vec<_>>(),
        vec![1001, 1001, 3000]
    );
    assert_eq!(
        batch.cleared_regions,
        vec![region(1001, 2000), region(2001, 3000)]
    );
    assert_eq!(batch.max_cleared_position, Some(3000));
    state.done_processing(&batch);

    // A late candidate re-opens the freed middle block; end of chromosome
    // drains it together with the last block.
    state.add_candidates([snv(2001, "T")]).unwrap();
    let batch = state.get_candidates_to_process(None, None);
    assert_eq!(
        batch.candidates.iter().map(|c| c.coordinate).collect::<Vec<_>>(),
        vec![2001, 3001]
    );
    assert_eq!(
        batch.cleared_regions,
        vec![region(2001, 3000), region(3001, 4000)]
    );
    assert_eq!(batch.max_cleared_position, None);
}

#[test]
fn distinct_candidates_at_one_site_stay_distinct() {
    let mut state = RegionStateManager::new("chr1", 1000).unwrap();
    state
        .add_candidates([snv(1001, "T"), snv(1001, "G")])
        .unwrap();
    let batch = state.get_candidates_to_process(None, None);
    assert_eq!(batch.candidates.len(), 2);
    let alternates: Vec<&str> = batch.candidates.iter().map(|c| c.alternate.as_str()).collect();
    assert_eq!(alternates, vec!["G", "T"]);
}
