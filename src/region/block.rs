use std::collections::BTreeMap;
use std::sync::Arc;

use crate::alleles::{
    AlleleCategory, AlleleType, CandidateAllele, CandidateKey, DirectionType, NUM_ALLELE_TYPES,
    NUM_DIRECTIONS,
};
use crate::reference::ChrReference;

use super::interval::{Region, RegionError};

type PositionCounts = [[u32; NUM_DIRECTIONS]; NUM_ALLELE_TYPES];

/// One fixed-size block of chromosome state: per-position allele counts,
/// in-flight candidates keyed by signature, and gapped-MNV reference counts.
///
/// A block owns all mutation inside its own range. Callers routing whole
/// alignments are responsible for splitting observations that straddle block
/// boundaries; the block itself rejects out-of-range access.
#[derive(Debug)]
pub struct RegionState {
    chromosome: Arc<str>,
    region: Region,
    counts: Vec<PositionCounts>,
    gapped_ref_counts: Vec<u32>,
    candidates: BTreeMap<CandidateKey, CandidateAllele>,
    max_allele_endpoint: u32,
    observed_endpoint: u32,
}

impl RegionState {
    /// Construct a block over `[start, end]`; requires `end > start >= 1`.
    pub fn new(
        chromosome: impl Into<Arc<str>>,
        start: u32,
        end: u32,
    ) -> Result<Self, RegionError> {
        if start < 1 || end <= start {
            return Err(RegionError::InvalidBounds { start, end });
        }
        let region = Region::new(start, end)?;
        let len = region.len() as usize;
        Ok(Self {
            chromosome: chromosome.into(),
            region,
            counts: vec![[[0; NUM_DIRECTIONS]; NUM_ALLELE_TYPES]; len],
            gapped_ref_counts: vec![0; len],
            candidates: BTreeMap::new(),
            max_allele_endpoint: end,
            observed_endpoint: end,
        })
    }

    /// Interval covered by this block.
    pub fn region(&self) -> Region {
        self.region
    }

    /// Block start coordinate.
    pub fn start(&self) -> u32 {
        self.region.start()
    }

    /// Block end coordinate.
    pub fn end(&self) -> u32 {
        self.region.end()
    }

    /// Whether `position` lies inside the block's range.
    pub fn contains_position(&self, position: u32) -> bool {
        self.region.contains_position(position)
    }

    /// Highest coordinate reached by any stored candidate's span. At least
    /// `end()` for the lifetime of the block; never shrinks.
    pub fn max_allele_endpoint(&self) -> u32 {
        self.max_allele_endpoint
    }

    /// Highest coordinate reached by alignment observations routed through
    /// this block. Drives the release holdback; candidates do not move it.
    pub fn observed_endpoint(&self) -> u32 {
        self.observed_endpoint
    }

    fn offset(&self, position: u32) -> Result<usize, RegionError> {
        if !self.contains_position(position) {
            return Err(RegionError::PositionOutOfRange {
                position,
                start: self.start(),
                end: self.end(),
            });
        }
        Ok((position - self.start()) as usize)
    }

    /// Record one observation of `allele` in `direction` at `position`.
    pub fn add_allele_count(
        &mut self,
        position: u32,
        allele: AlleleType,
        direction: DirectionType,
    ) -> Result<(), RegionError> {
        let offset = self.offset(position)?;
        self.counts[offset][allele.index()][direction.index()] += 1;
        Ok(())
    }

    /// Count recorded for `allele`/`direction` at `position`; zero if the
    /// combination was never written.
    pub fn allele_count(
        &self,
        position: u32,
        allele: AlleleType,
        direction: DirectionType,
    ) -> Result<u32, RegionError> {
        let offset = self.offset(position)?;
        Ok(self.counts[offset][allele.index()][direction.index()])
    }

    /// Total depth at `position` across all allele types and directions.
    pub fn depth(&self, position: u32) -> Result<u32, RegionError> {
        let offset = self.offset(position)?;
        Ok(self.counts[offset]
            .iter()
            .map(|by_direction| by_direction.iter().sum::<u32>())
            .sum())
    }

    /// Depth at `position` broken down by direction, summed over allele
    /// types.
    pub fn depth_by_direction(
        &self,
        position: u32,
    ) -> Result<[u32; NUM_DIRECTIONS], RegionError> {
        let offset = self.offset(position)?;
        let mut totals = [0u32; NUM_DIRECTIONS];
        for by_direction in &self.counts[offset] {
            for (total, count) in totals.iter_mut().zip(by_direction) {
                *total += count;
            }
        }
        Ok(totals)
    }

    /// Add reference depth already attributed to a phased multi-base
    /// variant. Out-of-range positions are ignored: phasing computes
    /// positions speculatively and the block tolerates the overshoot.
    pub fn add_gapped_mnv_ref_count(&mut self, position: u32, count: u32) {
        if let Ok(offset) = self.offset(position) {
            self.gapped_ref_counts[offset] += count;
        }
    }

    /// Gapped-MNV reference count at `position`.
    pub fn gapped_mnv_ref_count(&self, position: u32) -> Result<u32, RegionError> {
        let offset = self.offset(position)?;
        Ok(self.gapped_ref_counts[offset])
    }

    /// Insert a candidate, merging support by direction if an equal
    /// candidate is already stored. The candidate's span endpoint is folded
    /// into `max_allele_endpoint` either way.
    pub fn add_candidate(&mut self, candidate: CandidateAllele) -> Result<(), RegionError> {
        if candidate.coordinate < self.start() {
            return Err(RegionError::CandidateBeforeRegion {
                coordinate: candidate.coordinate,
                start: self.start(),
            });
        }
        let endpoint = candidate.endpoint();
        match self.candidates.entry(candidate.signature()) {
            std::collections::btree_map::Entry::Occupied(mut existing) => {
                existing.get_mut().add_support_from(&candidate);
            }
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
        }
        if endpoint > self.max_allele_endpoint {
            self.max_allele_endpoint = endpoint;
        }
        Ok(())
    }

    /// Number of distinct candidates stored.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    /// Extend the observation endpoint to `position` if it lies further
    /// right. Called by the cache when an alignment routed through this
    /// block reaches past its end.
    pub(crate) fn extend_observed_endpoint(&mut self, position: u32) {
        if position > self.observed_endpoint {
            self.observed_endpoint = position;
        }
    }

    /// All stored candidates in ascending coordinate order, optionally
    /// padded with synthesized reference calls.
    ///
    /// Reference calls are created for covered positions that are not the
    /// site of a stored non-reference candidate, with support taken from the
    /// counts recorded for the reference base. An interval filter restricts
    /// synthesis only; stored variant candidates are always returned.
    pub fn all_candidates(
        &self,
        include_reference_calls: bool,
        chr_reference: Option<&ChrReference>,
        interval_filter: Option<&[Region]>,
    ) -> Vec<CandidateAllele> {
        let mut result: Vec<CandidateAllele> = self.candidates.values().cloned().collect();

        if !include_reference_calls {
            return result;
        }
        let Some(reference) = chr_reference else {
            return result;
        };

        let variant_sites: std::collections::BTreeSet<u32> = self
            .candidates
            .values()
            .filter(|c| c.category != AlleleCategory::Reference)
            .map(|c| c.coordinate)
            .collect();

        let mut reference_calls = Vec::new();
        for position in self.start()..=self.end() {
            if variant_sites.contains(&position) {
                continue;
            }
            if let Some(filter) = interval_filter {
                if !filter.iter().any(|r| r.contains_position(position)) {
                    continue;
                }
            }
            let offset = (position - self.start()) as usize;
            let covered = self.counts[offset]
                .iter()
                .any(|by_direction| by_direction.iter().any(|&n| n > 0));
            if !covered {
                continue;
            }
            let Some(base) = reference.base_at(position) else {
                continue;
            };
            let allele = AlleleType::from_base(base);
            let support = self.counts[offset][allele.index()];
            let base_str = String::from_utf8_lossy(&[base]).to_string();
            reference_calls.push(CandidateAllele::new(
                Arc::clone(&self.chromosome),
                position,
                base_str.clone(),
                base_str,
                AlleleCategory::Reference,
                support,
            ));
        }

        result.extend(reference_calls);
        result.sort_by_key(|c| c.coordinate);
        result
    }

    /// Prepare the block for retention after its batch was consumed: the
    /// delivered candidates and endpoint claims are spent, the counts stay
    /// readable for late-arriving work near the release boundary.
    pub(crate) fn reset_consumed(&mut self) {
        self.candidates.clear();
        self.max_allele_endpoint = self.end();
        self.observed_endpoint = self.end();
    }
}
