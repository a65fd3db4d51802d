use std::collections::HashSet;

use tracing::debug;

use crate::alleles::{sum_support, AnchorState, CandidateAllele, CandidateKey};
use crate::region::RegionStateManager;

/// Result of a collapse pass over one batch.
#[derive(Debug, Default)]
pub struct CollapseOutcome {
    /// Canonical candidates ready for calling, ascending by coordinate.
    pub resolved: Vec<CandidateAllele>,
    /// Open-ended candidates past the batch boundary that could not be
    /// resolved here; the pipeline re-submits them to the cache unchanged.
    pub deferred: Vec<CandidateAllele>,
}

/// Collapses ambiguously anchored candidates into canonical, fully anchored
/// representatives.
///
/// Open-ended candidates arise from indels truncated by read edges inside
/// repeat runs: several partial representations of one underlying variant.
/// Each is folded into the best matching candidate; the ranking prefers
/// known variants, then full anchoring, larger span, higher frequency,
/// leftmost coordinate and finally lexicographic alternate.
#[derive(Debug, Default)]
pub struct VariantCollapser {
    freq_threshold: f64,
    freq_ratio_threshold: f64,
    known_variants: Option<HashSet<CandidateKey>>,
}

impl VariantCollapser {
    /// Build a collapser with frequency gates for collapse targets.
    pub fn new(freq_threshold: f64, freq_ratio_threshold: f64) -> Self {
        Self {
            freq_threshold,
            freq_ratio_threshold,
            known_variants: None,
        }
    }

    /// Supply known-variant signatures; known targets win the first
    /// tiebreak.
    pub fn with_known_variants(mut self, known: HashSet<CandidateKey>) -> Self {
        self.known_variants = Some(known);
        self
    }

    fn is_known(&self, candidate: &CandidateAllele) -> bool {
        self.known_variants
            .as_ref()
            .is_some_and(|known| known.contains(&candidate.signature()))
    }

    fn frequency(state: &RegionStateManager, candidate: &CandidateAllele) -> f64 {
        let depth = state.get_depth(candidate.coordinate);
        if depth == 0 {
            return 0.0;
        }
        f64::from(candidate.total_support()) / f64::from(depth)
    }

    /// Collapse a batch. `boundary` is the batch's highest cleared position;
    /// unresolved open candidates beyond it are deferred rather than forced
    /// closed, since later evidence may still anchor them.
    pub fn collapse(
        &self,
        candidates: Vec<CandidateAllele>,
        boundary: Option<u32>,
        state: &RegionStateManager,
    ) -> CollapseOutcome {
        let mut pool: Vec<Option<CandidateAllele>> = candidates.into_iter().map(Some).collect();
        let mut deferred = Vec::new();

        // Narrowest-first: each partial representation picks its target
        // while every wider partial is still marked open, so anchoring
        // outranks width exactly once per candidate.
        let mut open_order: Vec<(usize, u32, u32)> = pool
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .filter(|c| c.is_open_ended())
                    .map(|c| (index, c.span(), c.coordinate))
            })
            .collect();
        open_order.sort_by_key(|&(_, span, coordinate)| (span, coordinate));

        for (index, _, _) in open_order {
            let Some(open) = pool[index].take() else {
                continue;
            };

            let target_index = self.best_target(&open, &pool, index, state);
            match target_index {
                Some(best) => {
                    debug!(candidate = %open, "collapsing into wider representation");
                    if let Some(target) = pool[best].as_mut() {
                        target.add_support_from(&open);
                        target.collapsed_support =
                            sum_support(target.collapsed_support, open.support);
                    }
                }
                None => {
                    let past_boundary =
                        boundary.is_some_and(|max_cleared| open.coordinate > max_cleared);
                    if past_boundary {
                        deferred.push(open);
                    } else {
                        // No better representation will ever arrive: the
                        // candidate is as anchored as it can get.
                        pool[index] = Some(open.with_anchor(AnchorState::FullyAnchored));
                    }
                }
            }
        }

        let mut resolved: Vec<CandidateAllele> = pool.into_iter().flatten().collect();
        resolved.sort_by_key(CandidateAllele::signature);
        CollapseOutcome { resolved, deferred }
    }

    fn best_target(
        &self,
        open: &CandidateAllele,
        pool: &[Option<CandidateAllele>],
        open_index: usize,
        state: &RegionStateManager,
    ) -> Option<usize> {
        let open_frequency = Self::frequency(state, open);
        let mut best: Option<(usize, TargetRank)> = None;
        for (index, slot) in pool.iter().enumerate() {
            if index == open_index {
                continue;
            }
            let Some(target) = slot.as_ref() else {
                continue;
            };
            if !can_collapse_into(open, target) {
                continue;
            }
            let frequency = Self::frequency(state, target);
            if frequency < self.freq_threshold
                || frequency < self.freq_ratio_threshold * open_frequency
            {
                continue;
            }
            let rank = TargetRank {
                known: self.is_known(target),
                fully_anchored: target.anchor.is_fully_anchored(),
                span: target.span(),
                frequency,
                coordinate: target.coordinate,
                alternate: target.alternate.clone(),
            };
            let better = match &best {
                None => true,
                Some((_, current)) => rank.beats(current),
            };
            if better {
                best = Some((index, rank));
            }
        }
        best.map(|(index, _)| index)
    }
}

#[derive(Debug)]
struct TargetRank {
    known: bool,
    fully_anchored: bool,
    span: u32,
    frequency: f64,
    coordinate: u32,
    alternate: String,
}

impl TargetRank {
    fn beats(&self, other: &TargetRank) -> bool {
        if self.known != other.known {
            return self.known;
        }
        if self.fully_anchored != other.fully_anchored {
            return self.fully_anchored;
        }
        if self.span != other.span {
            return self.span > other.span;
        }
        if (self.frequency - other.frequency).abs() > f64::EPSILON {
            return self.frequency > other.frequency;
        }
        if self.coordinate != other.coordinate {
            return self.coordinate < other.coordinate;
        }
        self.alternate < other.alternate
    }
}

/// Whether `open` may be folded into `target`.
///
/// A target can never be smaller than the candidate collapsing into it, and
/// a fully anchored candidate only collapses into an exact match. Otherwise
/// the anchored side must line up and the open side's sequences must be a
/// prefix/suffix of the target's.
pub fn can_collapse_into(open: &CandidateAllele, target: &CandidateAllele) -> bool {
    if open.category != target.category || target.span() < open.span() {
        return false;
    }
    match open.anchor {
        AnchorState::FullyAnchored => open == target,
        AnchorState::OpenRight => {
            target.coordinate == open.coordinate
                && target.alternate.starts_with(&open.alternate)
                && target.reference.starts_with(&open.reference)
        }
        AnchorState::OpenLeft => {
            target.endpoint() == open.endpoint()
                && target.alternate.ends_with(&open.alternate)
                && target.reference.ends_with(&open.reference)
        }
        AnchorState::OpenBoth => {
            target.coordinate <= open.coordinate
                && open.endpoint() <= target.endpoint()
                && target.alternate.contains(&open.alternate)
                && target.reference.contains(&open.reference)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alleles::{AlleleCategory, AnchorState};

    fn insertion(
        coordinate: u32,
        alternate: &str,
        support: u32,
        anchor: AnchorState,
    ) -> CandidateAllele {
        CandidateAllele::new(
            "chr1",
            coordinate,
            "A",
            alternate,
            AlleleCategory::Insertion,
            [support, 0, 0],
        )
        .with_anchor(anchor)
    }

    fn state() -> RegionStateManager {
        RegionStateManager::new("chr1", 1000).unwrap()
    }

    #[test]
    fn open_right_insertion_collapses_into_wider_match() {
        let partial = insertion(100, "AT", 4, AnchorState::OpenRight);
        let full = insertion(100, "ATT", 10, AnchorState::FullyAnchored);
        assert!(can_collapse_into(&partial, &full));

        let outcome =
            VariantCollapser::default().collapse(vec![partial, full], None, &state());
        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.resolved[0].alternate, "ATT");
        assert_eq!(outcome.resolved[0].support, [14, 0, 0]);
        assert_eq!(outcome.resolved[0].collapsed_support, [4, 0, 0]);
        assert!(outcome.deferred.is_empty());
    }

    #[test]
    fn open_left_requires_matching_endpoint_and_suffix() {
        let partial = insertion(102, "TT", 2, AnchorState::OpenLeft);
        let mut full = insertion(100, "ATT", 8, AnchorState::FullyAnchored);
        // Endpoints differ (102 vs 103): no collapse.
        assert!(!can_collapse_into(&partial, &full));

        full.coordinate = 101;
        assert!(can_collapse_into(&partial, &full));
    }

    #[test]
    fn fully_anchored_only_collapses_into_exact_match() {
        let anchored = insertion(100, "AT", 4, AnchorState::FullyAnchored);
        let wider = insertion(100, "ATT", 10, AnchorState::FullyAnchored);
        assert!(!can_collapse_into(&anchored, &wider));
        let twin = insertion(100, "AT", 9, AnchorState::FullyAnchored);
        assert!(can_collapse_into(&anchored, &twin));
    }

    #[test]
    fn target_may_not_be_smaller() {
        let open = insertion(100, "ATTT", 4, AnchorState::OpenRight);
        let narrow = insertion(100, "AT", 10, AnchorState::FullyAnchored);
        assert!(!can_collapse_into(&open, &narrow));
    }

    #[test]
    fn anchored_target_outranks_wider_open_target() {
        let open = insertion(100, "AT", 1, AnchorState::OpenRight);
        let anchored = insertion(100, "ATT", 5, AnchorState::FullyAnchored);
        let wider_open = insertion(100, "ATTTT", 5, AnchorState::OpenRight);

        let outcome = VariantCollapser::default().collapse(
            vec![open, anchored, wider_open],
            None,
            &state(),
        );
        // The wider open representation itself closes (no target of its
        // own), and the short open folded into the anchored one.
        let anchored_survivor = outcome
            .resolved
            .iter()
            .find(|c| c.alternate == "ATT")
            .unwrap();
        assert_eq!(anchored_survivor.support, [6, 0, 0]);
    }

    #[test]
    fn known_variant_wins_first_tiebreak() {
        let open = insertion(100, "AT", 1, AnchorState::OpenRight);
        let plain = insertion(100, "ATTA", 5, AnchorState::FullyAnchored);
        let known = insertion(100, "ATT", 5, AnchorState::FullyAnchored);

        let collapser = VariantCollapser::new(0.0, 0.0)
            .with_known_variants(HashSet::from([known.signature()]));
        let outcome = collapser.collapse(vec![open, plain, known], None, &state());
        let survivor = outcome
            .resolved
            .iter()
            .find(|c| c.alternate == "ATT")
            .unwrap();
        // The known target absorbed the open candidate despite the wider
        // alternative.
        assert_eq!(survivor.support, [6, 0, 0]);
    }

    #[test]
    fn unresolved_open_candidate_past_boundary_is_deferred() {
        let open = insertion(1500, "AT", 3, AnchorState::OpenRight);
        let outcome = VariantCollapser::default().collapse(vec![open], Some(1000), &state());
        assert!(outcome.resolved.is_empty());
        assert_eq!(outcome.deferred.len(), 1);
        assert!(outcome.deferred[0].is_open_ended());
    }

    #[test]
    fn unresolved_open_candidate_inside_boundary_closes() {
        let open = insertion(500, "AT", 3, AnchorState::OpenRight);
        let outcome = VariantCollapser::default().collapse(vec![open], Some(1000), &state());
        assert_eq!(outcome.resolved.len(), 1);
        assert!(!outcome.resolved[0].is_open_ended());
    }
}
