use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::alleles::{CalledAllele, CandidateAllele};
use crate::config::{CallerConfig, ConfigError};
use crate::reference::ChrReference;
use crate::region::{AlignmentObservations, Region, RegionError, RegionStateManager};

use super::caller::AlleleCaller;
use super::collapser::VariantCollapser;

/// Errors surfaced by the calling pipeline.
#[derive(Debug, Error)]
pub enum CallerError {
    /// Configuration rejected during construction.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A cache contract was violated; indicates a defect, not a runtime
    /// condition to recover from.
    #[error("state error: {0}")]
    Region(#[from] RegionError),
}

/// Drives one chromosome through the cache and the resolution pipeline.
///
/// The upstream reader feeds alignments through [`Self::add_alignment`] and
/// reports its frontier through [`Self::process_up_to`]; candidates the
/// batch could not finalize re-enter the cache and surface again with a
/// later block. [`Self::finish`] drains everything at end of chromosome.
#[derive(Debug)]
pub struct ChromosomeProcessor {
    state: RegionStateManager,
    collapser: VariantCollapser,
    caller: AlleleCaller,
    reference: Option<ChrReference>,
}

impl ChromosomeProcessor {
    /// Build a processor for `chromosome`. Fails on invalid configuration.
    pub fn new(
        chromosome: impl Into<Arc<str>>,
        config: CallerConfig,
        reference: Option<ChrReference>,
    ) -> Result<Self, CallerError> {
        config.validate()?;
        let state = RegionStateManager::new(chromosome, config.block_size)?
            .with_reference_calls(config.include_reference_calls);
        let collapser = VariantCollapser::new(
            config.collapse_freq_threshold,
            config.collapse_freq_ratio_threshold,
        );
        let caller = AlleleCaller::new(config);
        Ok(Self {
            state,
            collapser,
            caller,
            reference,
        })
    }

    /// Restrict reference-call synthesis to the given intervals.
    pub fn with_intervals(mut self, intervals: Vec<Region>) -> Self {
        self.state = self.state.with_interval_filter(intervals);
        self
    }

    /// The underlying evidence cache.
    pub fn state(&self) -> &RegionStateManager {
        &self.state
    }

    /// Feed one alignment's observations and any candidates it produced.
    pub fn add_alignment(
        &mut self,
        observations: &AlignmentObservations,
        candidates: Vec<CandidateAllele>,
    ) -> Result<(), CallerError> {
        self.state.add_allele_counts(observations)?;
        self.state.add_candidates(candidates)?;
        Ok(())
    }

    /// Resolve everything that is safe to finalize given the reader's
    /// frontier. Returns finalized calls in coordinate order.
    pub fn process_up_to(&mut self, frontier: u32) -> Result<Vec<CalledAllele>, CallerError> {
        self.process_batch(Some(frontier))
    }

    /// Resolve all remaining state at end of chromosome.
    pub fn finish(&mut self) -> Result<Vec<CalledAllele>, CallerError> {
        self.process_batch(None)
    }

    fn process_batch(&mut self, up_to: Option<u32>) -> Result<Vec<CalledAllele>, CallerError> {
        let mut batch = self
            .state
            .get_candidates_to_process(up_to, self.reference.as_ref());
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let boundary = batch.max_cleared_position;
        let candidates = std::mem::take(&mut batch.candidates);

        let collapse = self.collapser.collapse(candidates, boundary, &self.state);
        if !collapse.deferred.is_empty() {
            // Still ambiguous and owned by a future block: back into the
            // cache, in coordinate order.
            self.state.add_candidates(collapse.deferred)?;
        }

        let outcome = self.caller.call(collapse.resolved, &self.state, boundary);
        if !outcome.deferred.is_empty() {
            self.state.add_candidates(outcome.deferred)?;
        }
        if !outcome.gapped_ref_counts.is_empty() {
            self.state
                .add_gapped_mnv_ref_counts(&outcome.gapped_ref_counts)?;
        }

        self.state.done_processing(&batch);
        info!(
            frontier = ?up_to,
            cleared = batch.cleared_regions.len(),
            calls = outcome.calls.len(),
            "batch resolved"
        );
        Ok(outcome.calls)
    }
}
