use std::fmt;

use thiserror::Error;

/// Errors raised by interval and block construction or direct block access.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    /// Interval bounds are not a valid 1-based closed range.
    #[error("invalid region bounds [{start}, {end}]")]
    InvalidBounds {
        /// Requested start coordinate.
        start: u32,
        /// Requested end coordinate.
        end: u32,
    },

    /// A position was queried outside the bounds of the block it was
    /// addressed to.
    #[error("position {position} outside region [{start}, {end}]")]
    PositionOutOfRange {
        /// Queried position.
        position: u32,
        /// Block start.
        start: u32,
        /// Block end.
        end: u32,
    },

    /// A candidate was added to a block that begins after its coordinate.
    #[error("candidate at {coordinate} precedes region start {start}")]
    CandidateBeforeRegion {
        /// Candidate coordinate.
        coordinate: u32,
        /// Block start.
        start: u32,
    },

    /// The cache was configured with a block size that cannot form a valid
    /// block.
    #[error("block size {0} must cover at least two positions")]
    InvalidBlockSize(u32),

    /// A write was addressed to a coordinate outside the 1-based space.
    #[error("position {0} is not a valid 1-based coordinate")]
    InvalidPosition(u32),
}

/// Closed 1-based interval of chromosome positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub struct Region {
    start: u32,
    end: u32,
}

impl Region {
    /// Construct a validated interval; `start` must be at least 1 and `end`
    /// must not precede `start`.
    pub fn new(start: u32, end: u32) -> Result<Self, RegionError> {
        let region = Region { start, end };
        if !region.is_valid() {
            return Err(RegionError::InvalidBounds { start, end });
        }
        Ok(region)
    }

    /// Start coordinate.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// End coordinate.
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of positions covered.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Closed intervals are never empty; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the bounds describe a legal 1-based closed interval.
    pub fn is_valid(&self) -> bool {
        self.start >= 1 && self.end >= self.start
    }

    /// Whether `position` lies inside the interval.
    pub fn contains_position(&self, position: u32) -> bool {
        self.start <= position && position <= self.end
    }

    /// Whether the two closed intervals share at least one position.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Whether `other` lies entirely inside this interval.
    pub fn fully_contains(&self, other: &Region) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Union of two overlapping intervals. Adjacency without a shared
    /// position is not a merge; callers coalesce overlapping clear-ranges
    /// only and must never bridge gaps.
    pub fn merge(&self, other: &Region) -> Option<Region> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Region {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_rejects_bad_bounds() {
        assert_eq!(
            Region::new(0, 10),
            Err(RegionError::InvalidBounds { start: 0, end: 10 })
        );
        assert_eq!(
            Region::new(10, 9),
            Err(RegionError::InvalidBounds { start: 10, end: 9 })
        );
        assert!(Region::new(7, 7).is_ok());
    }

    #[test]
    fn containment_and_overlap() {
        let region = Region::new(5, 10).unwrap();
        assert!(region.contains_position(5));
        assert!(region.contains_position(10));
        assert!(!region.contains_position(4));
        assert!(!region.contains_position(11));

        let other = Region::new(10, 12).unwrap();
        assert!(region.overlaps(&other));
        assert!(region.fully_contains(&Region::new(6, 9).unwrap()));
        assert!(!region.fully_contains(&other));
    }

    #[test]
    fn merge_requires_shared_positions() {
        let a = Region::new(5, 10).unwrap();
        let b = Region::new(8, 15).unwrap();
        assert_eq!(a.merge(&b), Some(Region::new(5, 15).unwrap()));

        // Adjacent but disjoint: no merge.
        let adjacent = Region::new(11, 11).unwrap();
        assert_eq!(a.merge(&adjacent), None);
    }
}
