//! Caller configuration.

use thiserror::Error;

use crate::region::DEFAULT_BLOCK_SIZE;

/// Errors raised by configuration validation.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Block size cannot form valid blocks.
    #[error("block size {0} must cover at least two positions")]
    BlockSize(u32),

    /// A fraction-valued setting fell outside `[0, 1]`.
    #[error("{name} must lie in [0, 1], got {value}")]
    FractionOutOfRange {
        /// Setting name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// The noise rate must be a probability strictly above zero.
    #[error("noise rate must lie in (0, 1), got {0}")]
    NoiseRate(f64),
}

/// Tunable parameters for the variant-calling pipeline.
#[derive(Debug, Clone)]
pub struct CallerConfig {
    /// Positions per cache block.
    pub block_size: u32,
    /// Minimum base quality for an observation to count (reader adapter).
    pub min_base_quality: u8,
    /// Minimum Phred variant quality for an unfiltered call.
    pub min_variant_quality: f64,
    /// Minimum depth for an unfiltered call.
    pub min_coverage: u32,
    /// Minimum allele frequency for an unfiltered call.
    pub min_frequency: f64,
    /// Strand-imbalance score above which a call is marked biased.
    pub max_acceptable_strand_bias: f64,
    /// Baseline per-base error rate feeding the quality model.
    pub noise_rate: f64,
    /// Minimum frequency a collapse target must carry.
    pub collapse_freq_threshold: f64,
    /// Minimum ratio of target frequency to collapsing-candidate frequency.
    pub collapse_freq_ratio_threshold: f64,
    /// Emit reference calls alongside variants.
    pub include_reference_calls: bool,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            min_base_quality: 20,
            min_variant_quality: 20.0,
            min_coverage: 10,
            min_frequency: 0.01,
            max_acceptable_strand_bias: 0.5,
            noise_rate: 0.01,
            collapse_freq_threshold: 0.0,
            collapse_freq_ratio_threshold: 0.0,
            include_reference_calls: false,
        }
    }
}

impl CallerConfig {
    /// Set the cache block size.
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the minimum variant quality.
    pub fn with_min_variant_quality(mut self, quality: f64) -> Self {
        self.min_variant_quality = quality;
        self
    }

    /// Set the minimum depth.
    pub fn with_min_coverage(mut self, coverage: u32) -> Self {
        self.min_coverage = coverage;
        self
    }

    /// Set the minimum allele frequency.
    pub fn with_min_frequency(mut self, frequency: f64) -> Self {
        self.min_frequency = frequency;
        self
    }

    /// Toggle reference-call emission.
    pub fn with_reference_calls(mut self, include: bool) -> Self {
        self.include_reference_calls = include;
        self
    }

    /// Check all settings; call before building a pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size < 2 {
            return Err(ConfigError::BlockSize(self.block_size));
        }
        for (name, value) in [
            ("min_frequency", self.min_frequency),
            ("max_acceptable_strand_bias", self.max_acceptable_strand_bias),
            ("collapse_freq_threshold", self.collapse_freq_threshold),
            (
                "collapse_freq_ratio_threshold",
                self.collapse_freq_ratio_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::FractionOutOfRange { name, value });
            }
        }
        if !(self.noise_rate > 0.0 && self.noise_rate < 1.0) {
            return Err(ConfigError::NoiseRate(self.noise_rate));
        }
        Ok(())
    }
}
