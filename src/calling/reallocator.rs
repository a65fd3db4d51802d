use std::sync::Arc;

use tracing::debug;

use crate::alleles::{
    sum_support, AlleleCategory, CalledAllele, CandidateAllele, SupportByDirection,
};

/// Result of redistributing one failed MNV.
#[derive(Debug, Default)]
pub struct ReallocationResult {
    /// Fragments inside the batch boundary, to be re-evaluated immediately.
    pub fragments: Vec<CandidateAllele>,
    /// Fragments past the boundary, to be re-submitted to the cache so they
    /// are called with their owning future block.
    pub deferred: Vec<CandidateAllele>,
}

/// Redistributes the support of MNVs that failed to call as a whole onto
/// overlapping callable alleles and leftover sub-candidates.
#[derive(Debug, Default)]
pub struct MnvReallocator;

impl MnvReallocator {
    /// Create a reallocator.
    pub fn new() -> Self {
        Self
    }

    /// Break up `failed` against the already-callable set.
    ///
    /// Exactly matching overlaps absorb the MNV's support (longest overlap
    /// first, ties by support); uncovered sub-spans become new candidates
    /// with the parent's full support vector, reference-matching edges
    /// trimmed away. Every produced fragment carries the parent's
    /// per-direction support unchanged, so no support is created or
    /// destroyed by the split.
    pub fn reallocate(
        &self,
        failed: &CandidateAllele,
        callable: &mut [CalledAllele],
        boundary: Option<u32>,
    ) -> ReallocationResult {
        debug_assert_eq!(failed.category, AlleleCategory::Mnv);
        let span = failed.reference.len().min(failed.alternate.len());
        let mut covered = vec![false; span];

        let mut matches = self.matching_overlaps(failed, callable);
        // Longest overlap first, ties broken by support.
        matches.sort_by_key(|&(index, length)| {
            (
                std::cmp::Reverse(length),
                std::cmp::Reverse(callable[index].allele_support),
            )
        });

        let mut absorbed_any = false;
        for (index, length) in matches {
            let call = &callable[index];
            let offset = (call.coordinate - failed.coordinate) as usize;
            if covered[offset..offset + length].iter().any(|&c| c) {
                continue;
            }
            covered[offset..offset + length].fill(true);
            absorbed_any = true;
            let call = &mut callable[index];
            call.support_by_direction = sum_support(call.support_by_direction, failed.support);
            call.allele_support += failed.total_support();
            debug!(coordinate = call.coordinate, "absorbed failed MNV support");
        }

        let leftovers = if absorbed_any {
            self.uncovered_fragments(failed, &covered)
        } else {
            // Nothing to anchor against: fall apart into independent
            // single-base candidates.
            self.single_base_fragments(failed)
        };

        let mut result = ReallocationResult::default();
        for fragment in leftovers {
            let past_boundary =
                boundary.is_some_and(|max_cleared| fragment.coordinate > max_cleared);
            if past_boundary {
                result.deferred.push(fragment);
            } else {
                result.fragments.push(fragment);
            }
        }
        result
    }

    /// Callable alleles lying inside the failed MNV's span whose bases agree
    /// exactly with the MNV over the overlap. Returns `(index, overlap
    /// length)` pairs.
    fn matching_overlaps(
        &self,
        failed: &CandidateAllele,
        callable: &[CalledAllele],
    ) -> Vec<(usize, usize)> {
        let span = failed.reference.len().min(failed.alternate.len());
        let failed_end = failed.coordinate as usize + span - 1;
        let mut matches = Vec::new();
        for (index, call) in callable.iter().enumerate() {
            if !matches!(call.category, AlleleCategory::Snv | AlleleCategory::Mnv) {
                continue;
            }
            let call_len = call.reference.len();
            if call.reference.len() != call.alternate.len() {
                continue;
            }
            let call_start = call.coordinate as usize;
            let call_end = call_start + call_len - 1;
            if call.coordinate < failed.coordinate || call_end > failed_end {
                continue;
            }
            let offset = (call.coordinate - failed.coordinate) as usize;
            let reference_window = &failed.reference[offset..offset + call_len];
            let alternate_window = &failed.alternate[offset..offset + call_len];
            if call.reference == reference_window && call.alternate == alternate_window {
                matches.push((index, call_len));
            }
        }
        matches
    }

    /// Fragments covering the still-uncovered runs of the span, with
    /// reference-matching bases trimmed off both ends of each run.
    fn uncovered_fragments(
        &self,
        failed: &CandidateAllele,
        covered: &[bool],
    ) -> Vec<CandidateAllele> {
        let mut fragments = Vec::new();
        let mut run_start = None;
        for (offset, &is_covered) in covered.iter().chain(std::iter::once(&true)).enumerate() {
            match (is_covered, run_start) {
                (false, None) => run_start = Some(offset),
                (true, Some(start)) => {
                    if let Some(fragment) = self.fragment_for_run(failed, start, offset) {
                        fragments.push(fragment);
                    }
                    run_start = None;
                }
                _ => {}
            }
        }
        fragments
    }

    /// Build a candidate for the half-open offset run `[start, end)`,
    /// trimming leading/trailing reference-matching bases. Reference-only
    /// runs yield nothing.
    fn fragment_for_run(
        &self,
        failed: &CandidateAllele,
        start: usize,
        end: usize,
    ) -> Option<CandidateAllele> {
        let reference = failed.reference.as_bytes();
        let alternate = failed.alternate.as_bytes();
        let mut lo = start;
        let mut hi = end;
        while lo < hi && reference[lo] == alternate[lo] {
            lo += 1;
        }
        while hi > lo && reference[hi - 1] == alternate[hi - 1] {
            hi -= 1;
        }
        if lo == hi {
            return None;
        }
        let category = if hi - lo == 1 {
            AlleleCategory::Snv
        } else {
            AlleleCategory::Mnv
        };
        Some(self.fragment(failed, lo, hi, category))
    }

    /// Independent single-base candidates, one per mismatching position.
    fn single_base_fragments(&self, failed: &CandidateAllele) -> Vec<CandidateAllele> {
        let reference = failed.reference.as_bytes();
        let alternate = failed.alternate.as_bytes();
        let span = reference.len().min(alternate.len());
        (0..span)
            .filter(|&offset| reference[offset] != alternate[offset])
            .map(|offset| self.fragment(failed, offset, offset + 1, AlleleCategory::Snv))
            .collect()
    }

    fn fragment(
        &self,
        failed: &CandidateAllele,
        lo: usize,
        hi: usize,
        category: AlleleCategory,
    ) -> CandidateAllele {
        let support: SupportByDirection = failed.support;
        CandidateAllele::new(
            Arc::clone(&failed.chromosome),
            failed.coordinate + lo as u32,
            &failed.reference[lo..hi],
            &failed.alternate[lo..hi],
            category,
            support,
        )
    }
}
