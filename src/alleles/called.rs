use std::fmt;
use std::sync::Arc;

use super::candidate::{AlleleCategory, CandidateAllele};
use super::types::SupportByDirection;

/// Diploid genotype assigned to a called allele.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genotype {
    /// Reference on both strands (`0/0`).
    HomozygousRef,
    /// Variant on one strand (`0/1`).
    Heterozygous,
    /// Variant on both strands (`1/1`).
    HomozygousAlt,
    /// Insufficient evidence to genotype (`./.`).
    NoCall,
}

impl Genotype {
    /// VCF representation.
    pub fn as_vcf(&self) -> &'static str {
        match self {
            Genotype::HomozygousRef => "0/0",
            Genotype::Heterozygous => "0/1",
            Genotype::HomozygousAlt => "1/1",
            Genotype::NoCall => "./.",
        }
    }
}

/// Filters that can be applied to a call without suppressing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Variant quality below the configured minimum.
    LowVariantQuality,
    /// Total coverage below the configured minimum.
    LowDepth,
    /// Allele frequency below the configured minimum.
    LowVariantFrequency,
    /// Support is confined to one strand beyond the configured limit.
    StrandBias,
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            FilterType::LowVariantQuality => "q30",
            FilterType::LowDepth => "LowDP",
            FilterType::LowVariantFrequency => "LowVariantFreq",
            FilterType::StrandBias => "SB",
        };
        f.write_str(tag)
    }
}

/// Strand-bias metrics attached to a variant call.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize))]
pub struct StrandBias {
    /// Variant frequency among forward-direction evidence.
    pub forward_frequency: f64,
    /// Variant frequency among reverse-direction evidence.
    pub reverse_frequency: f64,
    /// Phred-like imbalance score; higher means more one-sided.
    pub score: f64,
    /// Whether the imbalance exceeds the configured acceptance limit.
    pub biased: bool,
}

/// A finalized allele call ready for output.
#[derive(Debug, Clone)]
pub struct CalledAllele {
    /// Chromosome of the call.
    pub chromosome: Arc<str>,
    /// 1-based start coordinate.
    pub coordinate: u32,
    /// Reference bases.
    pub reference: String,
    /// Alternate bases.
    pub alternate: String,
    /// Allele category.
    pub category: AlleleCategory,
    /// Assigned genotype.
    pub genotype: Genotype,
    /// Total read depth over the allele's span.
    pub total_coverage: u32,
    /// Reads supporting the allele, summed over directions.
    pub allele_support: u32,
    /// Reads supporting the reference at this site.
    pub reference_support: u32,
    /// Allele support broken down by direction.
    pub support_by_direction: SupportByDirection,
    /// Phred-scaled variant quality.
    pub variant_quality: f64,
    /// Allele frequency (support / coverage).
    pub frequency: f64,
    /// Strand-bias metrics, absent for reference calls.
    pub strand_bias: Option<StrandBias>,
    /// Applied filters; empty means PASS.
    pub filters: Vec<FilterType>,
}

impl CalledAllele {
    /// Seed a call from a candidate; coverage and scores are filled in by
    /// the caller's calculators.
    pub fn from_candidate(candidate: &CandidateAllele) -> Self {
        Self {
            chromosome: Arc::clone(&candidate.chromosome),
            coordinate: candidate.coordinate,
            reference: candidate.reference.clone(),
            alternate: candidate.alternate.clone(),
            category: candidate.category,
            genotype: Genotype::NoCall,
            total_coverage: 0,
            allele_support: candidate.total_support(),
            reference_support: 0,
            support_by_direction: candidate.support,
            variant_quality: 0.0,
            frequency: 0.0,
            strand_bias: None,
            filters: Vec::new(),
        }
    }

    /// Record a filter, keeping the list duplicate-free.
    pub fn add_filter(&mut self, filter: FilterType) {
        if !self.filters.contains(&filter) {
            self.filters.push(filter);
        }
    }

    /// Whether the call carries no filters.
    pub fn is_pass(&self) -> bool {
        self.filters.is_empty()
    }

    /// VCF FILTER column value.
    pub fn filter_field(&self) -> String {
        if self.filters.is_empty() {
            "PASS".to_string()
        } else {
            self.filters
                .iter()
                .map(|f| f.to_string())
                .collect::<Vec<_>>()
                .join(";")
        }
    }
}
