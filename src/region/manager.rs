use std::cell::Cell;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::alleles::{AlleleType, CandidateAllele, DirectionType};
use crate::reference::ChrReference;

use super::block::RegionState;
use super::interval::{Region, RegionError};

/// One positional observation extracted from an alignment.
#[derive(Debug, Clone, Copy)]
pub struct PositionObservation {
    /// 1-based reference position.
    pub position: u32,
    /// Observed allele type.
    pub allele: AlleleType,
    /// Evidence direction.
    pub direction: DirectionType,
}

/// All per-position observations contributed by one alignment.
#[derive(Debug, Clone, Default)]
pub struct AlignmentObservations {
    /// Observations in reference order.
    pub observations: Vec<PositionObservation>,
}

impl AlignmentObservations {
    /// Collect observations from an iterator of `(position, allele,
    /// direction)` triples.
    pub fn from_triples(
        triples: impl IntoIterator<Item = (u32, AlleleType, DirectionType)>,
    ) -> Self {
        Self {
            observations: triples
                .into_iter()
                .map(|(position, allele, direction)| PositionObservation {
                    position,
                    allele,
                    direction,
                })
                .collect(),
        }
    }

    /// Lowest observed position.
    pub fn first_position(&self) -> Option<u32> {
        self.observations.iter().map(|o| o.position).min()
    }

    /// Highest observed position.
    pub fn last_position(&self) -> Option<u32> {
        self.observations.iter().map(|o| o.position).max()
    }
}

/// Batch of candidates released by [`RegionStateManager::get_candidates_to_process`].
///
/// The manager guarantees candidates arrive in non-decreasing coordinate
/// order across successive batches; the consumer confirms the release via
/// [`RegionStateManager::done_processing`] once the batch is fully resolved.
#[derive(Debug)]
pub struct CandidateBatch {
    /// Candidates safe to resolve, in ascending coordinate order.
    pub candidates: Vec<CandidateAllele>,
    /// Block ranges about to be retired, ascending.
    pub cleared_regions: Vec<Region>,
    /// Highest coordinate covered by the cleared ranges; `None` when the
    /// batch is unbounded (end of chromosome) or nothing was cleared.
    pub max_cleared_position: Option<u32>,
    pub(crate) block_keys: Vec<u32>,
}

impl CandidateBatch {
    /// Whether the batch carries neither candidates nor cleared ranges.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.cleared_regions.is_empty()
    }
}

/// Windowed per-chromosome evidence cache.
///
/// Blocks are created lazily on first write and retired through the batch
/// protocol: [`Self::get_candidates_to_process`] nominates a contiguous
/// prefix of resident blocks whose data is final, and
/// [`Self::done_processing`] frees them, keeping the most recently touched
/// one in a one-slot locality cache for late-arriving writes.
#[derive(Debug)]
pub struct RegionStateManager {
    chromosome: Arc<str>,
    block_size: u32,
    include_reference_calls: bool,
    interval_filter: Option<Vec<Region>>,
    blocks: BTreeMap<u32, RegionState>,
    retained: Option<RegionState>,
    last_accessed: Cell<Option<u32>>,
}

/// Default number of positions per block.
pub const DEFAULT_BLOCK_SIZE: u32 = 1000;

impl RegionStateManager {
    /// Construct a cache for one chromosome. `block_size` must cover at
    /// least two positions.
    pub fn new(chromosome: impl Into<Arc<str>>, block_size: u32) -> Result<Self, RegionError> {
        if block_size < 2 {
            return Err(RegionError::InvalidBlockSize(block_size));
        }
        Ok(Self {
            chromosome: chromosome.into(),
            block_size,
            include_reference_calls: false,
            interval_filter: None,
            blocks: BTreeMap::new(),
            retained: None,
            last_accessed: Cell::new(None),
        })
    }

    /// Enable synthesis of reference calls when extracting candidates.
    pub fn with_reference_calls(mut self, include: bool) -> Self {
        self.include_reference_calls = include;
        self
    }

    /// Restrict reference-call synthesis to the given intervals.
    pub fn with_interval_filter(mut self, intervals: Vec<Region>) -> Self {
        self.interval_filter = Some(intervals);
        self
    }

    /// Chromosome this cache serves.
    pub fn chromosome(&self) -> &Arc<str> {
        &self.chromosome
    }

    /// Configured block size.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Number of resident blocks (excluding the retained slot).
    pub fn resident_blocks(&self) -> usize {
        self.blocks.len()
    }

    fn block_key(&self, position: u32) -> Result<u32, RegionError> {
        match position.checked_sub(1) {
            Some(p) => Ok(p / self.block_size),
            None => Err(RegionError::InvalidPosition(position)),
        }
    }

    fn block_bounds(&self, key: u32) -> (u32, u32) {
        let start = key * self.block_size + 1;
        // A block at the very top of the coordinate space is truncated
        // rather than wrapped.
        (start, start.saturating_add(self.block_size - 1))
    }

    /// Mutable access to the block containing `position`, creating it (or
    /// re-registering the retained block) on demand.
    fn block_mut(&mut self, position: u32) -> Result<&mut RegionState, RegionError> {
        let key = self.block_key(position)?;
        let (start, end) = self.block_bounds(key);
        self.last_accessed.set(Some(key));

        let recycled = if !self.blocks.contains_key(&key)
            && self
                .retained
                .as_ref()
                .is_some_and(|b| b.contains_position(position))
        {
            self.retained.take()
        } else {
            None
        };

        let state = match self.blocks.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(slot) => {
                let block = match recycled {
                    Some(block) => block,
                    None => {
                        debug!(chromosome = %self.chromosome, start, end, "creating block");
                        RegionState::new(Arc::clone(&self.chromosome), start, end)?
                    }
                };
                slot.insert(block)
            }
        };
        Ok(state)
    }

    /// Shared access to the block containing `position`, consulting the
    /// retained slot; never creates blocks.
    fn block_at(&self, position: u32) -> Option<&RegionState> {
        let key = self.block_key(position).ok()?;
        if let Some(block) = self.blocks.get(&key) {
            self.last_accessed.set(Some(key));
            return Some(block);
        }
        self.retained
            .as_ref()
            .filter(|block| block.contains_position(position))
    }

    /// Route candidates to their containing blocks, creating blocks on
    /// demand. The input order is preserved within each block.
    pub fn add_candidates(
        &mut self,
        candidates: impl IntoIterator<Item = CandidateAllele>,
    ) -> Result<(), RegionError> {
        for candidate in candidates {
            self.block_mut(candidate.coordinate)?
                .add_candidate(candidate)?;
        }
        Ok(())
    }

    /// Record one alignment's per-position observations. If the alignment's
    /// footprint reaches past the end of the block containing its first
    /// position, that block's observation endpoint is extended, which feeds
    /// the release holdback.
    pub fn add_allele_counts(
        &mut self,
        observations: &AlignmentObservations,
    ) -> Result<(), RegionError> {
        let (Some(first), Some(last)) =
            (observations.first_position(), observations.last_position())
        else {
            return Ok(());
        };
        for observation in &observations.observations {
            self.block_mut(observation.position)?.add_allele_count(
                observation.position,
                observation.allele,
                observation.direction,
            )?;
        }
        let start_block = self.block_mut(first)?;
        if last > start_block.end() {
            start_block.extend_observed_endpoint(last);
        }
        Ok(())
    }

    /// Route gapped-MNV reference counts to their containing blocks.
    pub fn add_gapped_mnv_ref_counts(
        &mut self,
        counts: &BTreeMap<u32, u32>,
    ) -> Result<(), RegionError> {
        for (&position, &count) in counts {
            self.block_mut(position)?
                .add_gapped_mnv_ref_count(position, count);
        }
        Ok(())
    }

    /// Count recorded for `allele`/`direction` at `position`. Positions in
    /// blocks that never existed or were already retired read as zero.
    pub fn get_allele_count(
        &self,
        position: u32,
        allele: AlleleType,
        direction: DirectionType,
    ) -> u32 {
        self.block_at(position)
            .and_then(|block| block.allele_count(position, allele, direction).ok())
            .unwrap_or(0)
    }

    /// Total depth at `position` across all allele types and directions.
    pub fn get_depth(&self, position: u32) -> u32 {
        self.block_at(position)
            .and_then(|block| block.depth(position).ok())
            .unwrap_or(0)
    }

    /// Depth at `position` broken down by direction.
    pub fn get_depth_by_direction(&self, position: u32) -> [u32; crate::alleles::NUM_DIRECTIONS] {
        self.block_at(position)
            .and_then(|block| block.depth_by_direction(position).ok())
            .unwrap_or([0; crate::alleles::NUM_DIRECTIONS])
    }

    /// Gapped-MNV reference count at `position`, zero when absent.
    pub fn get_gapped_mnv_ref_count(&self, position: u32) -> u32 {
        self.block_at(position)
            .and_then(|block| block.gapped_mnv_ref_count(position).ok())
            .unwrap_or(0)
    }

    fn lag_satisfied(&self, block_end: u32, frontier: u32, head: bool) -> bool {
        let horizon = block_end as u64 + self.block_size as u64;
        // The head of a batch opens only once the frontier is strictly more
        // than one full block past its end; continuation blocks are admitted
        // one position earlier. Both bounds are pinned by tests.
        if head {
            horizon < frontier as u64
        } else {
            horizon <= frontier as u64
        }
    }

    fn held_back(&self, block: &RegionState, frontier: u32) -> bool {
        if block.observed_endpoint() <= block.end() {
            return false;
        }
        let Ok(claimed_key) = self.block_key(block.observed_endpoint()) else {
            return false;
        };
        let (_, claimed_end) = self.block_bounds(claimed_key);
        !self.lag_satisfied(claimed_end, frontier, false)
    }

    /// Determine the maximal contiguous prefix of resident blocks eligible
    /// for release and return their candidates. Passing `None` for
    /// `up_to_position` means end of chromosome: every resident block is
    /// eligible.
    ///
    /// The returned batch is a nomination; nothing is freed until
    /// [`Self::done_processing`] confirms it.
    pub fn get_candidates_to_process(
        &mut self,
        up_to_position: Option<u32>,
        chr_reference: Option<&ChrReference>,
    ) -> CandidateBatch {
        let mut eligible: Vec<u32> = Vec::new();
        for (&key, block) in &self.blocks {
            match up_to_position {
                None => {}
                Some(frontier) => {
                    if !self.lag_satisfied(block.end(), frontier, eligible.is_empty()) {
                        break;
                    }
                    if self.held_back(block, frontier) {
                        debug!(
                            block_start = block.start(),
                            observed_endpoint = block.observed_endpoint(),
                            frontier,
                            "block held back by spanning evidence"
                        );
                        break;
                    }
                }
            }
            eligible.push(key);
        }

        let mut candidates = Vec::new();
        let mut cleared_regions = Vec::new();
        for key in &eligible {
            if let Some(block) = self.blocks.get(key) {
                candidates.extend(block.all_candidates(
                    self.include_reference_calls,
                    chr_reference,
                    self.interval_filter.as_deref(),
                ));
                cleared_regions.push(block.region());
            }
        }
        let max_cleared_position = match up_to_position {
            None => None,
            Some(_) => cleared_regions.last().map(|region| region.end()),
        };

        debug!(
            frontier = ?up_to_position,
            released_blocks = eligible.len(),
            candidates = candidates.len(),
            "release nomination"
        );

        CandidateBatch {
            candidates,
            cleared_regions,
            max_cleared_position,
            block_keys: eligible,
        }
    }

    /// Commit the release implied by `batch`: every named block is freed,
    /// except the most recently touched one, which moves to the one-slot
    /// retained cache with its counts intact and its delivered candidates
    /// cleared.
    pub fn done_processing(&mut self, batch: &CandidateBatch) {
        for &key in &batch.block_keys {
            let Some(block) = self.blocks.remove(&key) else {
                continue;
            };
            if self.last_accessed.get() == Some(key) {
                let mut block = block;
                block.reset_consumed();
                debug!(start = block.start(), end = block.end(), "retaining block");
                self.retained = Some(block);
            } else {
                debug!(start = block.start(), end = block.end(), "freeing block");
            }
        }
    }
}
