use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use crate::alleles::{
    AlleleCategory, AlleleType, CalledAllele, CandidateAllele, FilterType, DirectionType,
};
use crate::config::CallerConfig;
use crate::region::RegionStateManager;

use super::reallocator::MnvReallocator;
use super::statistics::{
    compute_strand_bias, genotype_for_reference, genotype_for_variant, variant_quality_score,
};

/// Output of calling one batch of candidates.
#[derive(Debug, Default)]
pub struct CallOutcome {
    /// Finalized calls in ascending coordinate order.
    pub calls: Vec<CalledAllele>,
    /// Reallocated fragments past the batch boundary; the pipeline
    /// re-submits these to the cache.
    pub deferred: Vec<CandidateAllele>,
    /// Reference depth claimed by called MNVs' interior reference bases,
    /// keyed by position.
    pub gapped_ref_counts: BTreeMap<u32, u32>,
}

/// Converts collapsed candidates into final calls.
///
/// Coverage, quality, strand bias and genotype come from the cache and the
/// statistical calculators; MNVs that miss the quality threshold are handed
/// to the [`MnvReallocator`] and their fragments re-enter the evaluation
/// queue.
#[derive(Debug)]
pub struct AlleleCaller {
    config: CallerConfig,
    reallocator: MnvReallocator,
}

impl AlleleCaller {
    /// Build a caller over the given configuration.
    pub fn new(config: CallerConfig) -> Self {
        Self {
            config,
            reallocator: MnvReallocator::new(),
        }
    }

    /// Call every candidate in the batch. `boundary` is the batch's highest
    /// cleared position; reallocation fragments beyond it are deferred.
    pub fn call(
        &self,
        candidates: Vec<CandidateAllele>,
        state: &RegionStateManager,
        boundary: Option<u32>,
    ) -> CallOutcome {
        let mut outcome = CallOutcome::default();
        let mut worklist: VecDeque<CandidateAllele> = candidates.into();

        while let Some(candidate) = worklist.pop_front() {
            let call = self.evaluate(&candidate, state);
            let quality_ok = call.variant_quality >= self.config.min_variant_quality;
            if candidate.category == AlleleCategory::Mnv && !quality_ok {
                debug!(%candidate, quality = call.variant_quality, "reallocating failed MNV");
                let result =
                    self.reallocator
                        .reallocate(&candidate, &mut outcome.calls, boundary);
                // Fragments are evaluated on their own merits in this same
                // batch; out-of-boundary pieces wait for their future block.
                worklist.extend(result.fragments);
                outcome.deferred.extend(result.deferred);
                continue;
            }
            outcome.calls.push(call);
        }

        // Absorption during reallocation may have grown support after a
        // call was scored; refresh every variant's metrics once the batch
        // has settled.
        for call in &mut outcome.calls {
            self.refresh_metrics(call, state);
        }

        for call in &outcome.calls {
            if call.category == AlleleCategory::Mnv && call.is_pass() {
                accumulate_gapped_ref_counts(call, &mut outcome.gapped_ref_counts);
            }
        }

        outcome
            .calls
            .sort_by(|a, b| {
                (a.coordinate, &a.reference, &a.alternate)
                    .cmp(&(b.coordinate, &b.reference, &b.alternate))
            });
        outcome
    }

    /// Total depth backing a candidate: single-position for substitutions
    /// and reference calls, the anchor position for insertions, the minimum
    /// across the reference span for deletions and MNVs.
    fn coverage_for(&self, candidate: &CandidateAllele, state: &RegionStateManager) -> u32 {
        match candidate.category {
            AlleleCategory::Reference | AlleleCategory::Snv | AlleleCategory::Insertion => {
                state.get_depth(candidate.coordinate)
            }
            AlleleCategory::Deletion | AlleleCategory::Mnv => {
                let end = candidate.coordinate + candidate.reference.len() as u32 - 1;
                (candidate.coordinate..=end)
                    .map(|position| state.get_depth(position))
                    .min()
                    .unwrap_or(0)
            }
        }
    }

    fn evaluate(&self, candidate: &CandidateAllele, state: &RegionStateManager) -> CalledAllele {
        let mut call = CalledAllele::from_candidate(candidate);
        call.total_coverage = self.coverage_for(candidate, state);

        let reference_base = candidate.reference.bytes().next().unwrap_or(b'N');
        let reference_allele = AlleleType::from_base(reference_base);
        let raw_reference_support: u32 = [
            DirectionType::Forward,
            DirectionType::Reverse,
            DirectionType::Stitched,
        ]
        .into_iter()
        .map(|direction| state.get_allele_count(candidate.coordinate, reference_allele, direction))
        .sum();

        call.reference_support = if candidate.category == AlleleCategory::Reference {
            // Depth already attributed to a phased MNV is not plain
            // reference depth.
            let gapped = state.get_gapped_mnv_ref_count(candidate.coordinate);
            call.allele_support = call.allele_support.saturating_sub(gapped);
            raw_reference_support.saturating_sub(gapped)
        } else {
            raw_reference_support
        };

        self.refresh_metrics(&mut call, state);
        call
    }

    /// Recompute frequency, quality, strand bias, genotype and filters from
    /// the call's current support and coverage.
    fn refresh_metrics(&self, call: &mut CalledAllele, state: &RegionStateManager) {
        call.frequency = if call.total_coverage > 0 {
            (f64::from(call.allele_support) / f64::from(call.total_coverage)).min(1.0)
        } else {
            0.0
        };
        call.variant_quality = variant_quality_score(
            call.allele_support,
            call.total_coverage,
            self.config.noise_rate,
        );

        call.filters.clear();
        if call.total_coverage < self.config.min_coverage {
            call.add_filter(FilterType::LowDepth);
        }

        if call.category == AlleleCategory::Reference {
            call.genotype = genotype_for_reference(call.total_coverage, self.config.min_coverage);
            call.strand_bias = None;
            return;
        }

        call.genotype =
            genotype_for_variant(call.frequency, call.total_coverage, self.config.min_coverage);
        let bias = compute_strand_bias(
            call.support_by_direction,
            state.get_depth_by_direction(call.coordinate),
            self.config.max_acceptable_strand_bias,
        );
        if bias.biased {
            call.add_filter(FilterType::StrandBias);
        }
        call.strand_bias = Some(bias);
        if call.frequency < self.config.min_frequency {
            call.add_filter(FilterType::LowVariantFrequency);
        }
        if call.variant_quality < self.config.min_variant_quality {
            call.add_filter(FilterType::LowVariantQuality);
        }
    }
}

/// Interior reference-matching positions of a called MNV contribute their
/// support as gapped-MNV reference depth.
fn accumulate_gapped_ref_counts(call: &CalledAllele, counts: &mut BTreeMap<u32, u32>) {
    let reference = call.reference.as_bytes();
    let alternate = call.alternate.as_bytes();
    for (offset, (&r, &a)) in reference.iter().zip(alternate).enumerate() {
        if r == a {
            *counts.entry(call.coordinate + offset as u32).or_insert(0) += call.allele_support;
        }
    }
}
