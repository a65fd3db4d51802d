use crate::alleles::{Genotype, StrandBias, SupportByDirection, NUM_DIRECTIONS};

/// Cap applied to Phred-scaled quality scores.
pub const MAX_VARIANT_QSCORE: f64 = 100.0;

/// Lanczos approximation of `ln Γ(x)` for positive `x`.
fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_7e-2,
        -0.539_523_938_495_3e-5,
    ];
    let mut denominator = x;
    let mut series = 1.000_000_000_190_015;
    for coefficient in COEFFICIENTS {
        denominator += 1.0;
        series += coefficient / denominator;
    }
    let tmp = x + 5.5;
    (x + 0.5) * tmp.ln() - tmp + (2.506_628_274_631_000_5 * series / x).ln()
}

fn ln_factorial(n: u32) -> f64 {
    ln_gamma(n as f64 + 1.0)
}

/// Phred-scaled probability that at least `support` observations arise from
/// noise alone, modelling noise as Poisson with mean
/// `coverage * noise_rate`. Zero support scores zero; the score is capped at
/// [`MAX_VARIANT_QSCORE`].
pub fn variant_quality_score(support: u32, coverage: u32, noise_rate: f64) -> f64 {
    if support == 0 || coverage == 0 {
        return 0.0;
    }
    let lambda = (coverage as f64 * noise_rate).max(f64::MIN_POSITIVE);

    // Tail sum P(X >= support) in log space, stopping once terms vanish.
    let ln_lambda = lambda.ln();
    let mut ln_tail = f64::NEG_INFINITY;
    let mut k = support;
    loop {
        let ln_term = k as f64 * ln_lambda - lambda - ln_factorial(k);
        ln_tail = log_add(ln_tail, ln_term);
        // Terms decay geometrically once k is past the mean.
        if (k as f64) > lambda && ln_term < ln_tail - 40.0 {
            break;
        }
        k += 1;
        if k > support + 10_000 {
            break;
        }
    }

    let phred = -10.0 * (ln_tail / std::f64::consts::LN_10);
    phred.clamp(0.0, MAX_VARIANT_QSCORE)
}

fn log_add(ln_a: f64, ln_b: f64) -> f64 {
    if ln_a == f64::NEG_INFINITY {
        return ln_b;
    }
    let (hi, lo) = if ln_a >= ln_b { (ln_a, ln_b) } else { (ln_b, ln_a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Strand-imbalance metrics for a variant's support against per-direction
/// depth. Stitched evidence contributes half to each strand. When either
/// strand carries no depth the imbalance cannot be assessed and the call is
/// reported unbiased.
pub fn compute_strand_bias(
    support: SupportByDirection,
    depth: [u32; NUM_DIRECTIONS],
    max_acceptable: f64,
) -> StrandBias {
    let forward_support = support[0] as f64 + support[2] as f64 / 2.0;
    let reverse_support = support[1] as f64 + support[2] as f64 / 2.0;
    let forward_depth = depth[0] as f64 + depth[2] as f64 / 2.0;
    let reverse_depth = depth[1] as f64 + depth[2] as f64 / 2.0;

    let forward_frequency = if forward_depth > 0.0 {
        (forward_support / forward_depth).min(1.0)
    } else {
        0.0
    };
    let reverse_frequency = if reverse_depth > 0.0 {
        (reverse_support / reverse_depth).min(1.0)
    } else {
        0.0
    };

    if forward_depth == 0.0 || reverse_depth == 0.0 {
        return StrandBias {
            forward_frequency,
            reverse_frequency,
            score: 0.0,
            biased: false,
        };
    }

    let majority = forward_frequency.max(reverse_frequency);
    let minority = forward_frequency.min(reverse_frequency);
    let score = if majority > 0.0 {
        1.0 - minority / majority
    } else {
        0.0
    };

    StrandBias {
        forward_frequency,
        reverse_frequency,
        score,
        biased: score > max_acceptable,
    }
}

/// Genotype from allele frequency. Somatic calls sit at low frequency, so
/// anything below the homozygous band genotypes as heterozygous.
pub fn genotype_for_variant(frequency: f64, coverage: u32, min_coverage: u32) -> Genotype {
    if coverage < min_coverage {
        return Genotype::NoCall;
    }
    if frequency >= 0.7 {
        Genotype::HomozygousAlt
    } else {
        Genotype::Heterozygous
    }
}

/// Genotype for a reference call.
pub fn genotype_for_reference(coverage: u32, min_coverage: u32) -> Genotype {
    if coverage < min_coverage {
        Genotype::NoCall
    } else {
        Genotype::HomozygousRef
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn quality_is_zero_without_support() {
        assert_eq!(variant_quality_score(0, 100, 0.01), 0.0);
        assert_eq!(variant_quality_score(5, 0, 0.01), 0.0);
    }

    #[test]
    fn quality_grows_with_support() {
        let low = variant_quality_score(2, 100, 0.01);
        let mid = variant_quality_score(5, 100, 0.01);
        let high = variant_quality_score(20, 100, 0.01);
        assert!(low < mid && mid < high, "{low} {mid} {high}");
        assert!(high <= MAX_VARIANT_QSCORE);
    }

    #[test]
    fn quality_shrinks_with_noise() {
        let quiet = variant_quality_score(5, 100, 0.001);
        let noisy = variant_quality_score(5, 100, 0.05);
        assert!(quiet > noisy);
    }

    #[test]
    fn ln_gamma_matches_factorials() {
        // ln(5!) = ln 120
        assert!((ln_factorial(5) - 120f64.ln()).abs() < 1e-9);
        assert!((ln_factorial(0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn balanced_support_is_unbiased() {
        let bias = compute_strand_bias([10, 10, 0], [50, 50, 0], 0.5);
        assert!(!bias.biased);
        assert!(bias.score < 1e-9);
        assert!((bias.forward_frequency - 0.2).abs() < 1e-9);
    }

    #[test]
    fn one_sided_support_is_biased() {
        let bias = compute_strand_bias([20, 0, 0], [50, 50, 0], 0.5);
        assert!(bias.biased);
        assert!((bias.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_strand_depth_cannot_be_assessed() {
        let bias = compute_strand_bias([20, 0, 0], [50, 0, 0], 0.5);
        assert!(!bias.biased);
    }

    #[test]
    fn stitched_evidence_splits_between_strands() {
        let bias = compute_strand_bias([0, 0, 20], [0, 0, 40], 0.5);
        assert!(!bias.biased);
        assert!((bias.forward_frequency - 0.5).abs() < 1e-9);
        assert!((bias.reverse_frequency - 0.5).abs() < 1e-9);
    }

    #[test_case(0.05, 100 => Genotype::Heterozygous ; "low frequency is het")]
    #[test_case(0.5, 100 => Genotype::Heterozygous ; "mid frequency is het")]
    #[test_case(0.95, 100 => Genotype::HomozygousAlt ; "high frequency is hom alt")]
    #[test_case(0.95, 3 => Genotype::NoCall ; "thin coverage is no call")]
    fn genotype_bands(frequency: f64, coverage: u32) -> Genotype {
        genotype_for_variant(frequency, coverage, 10)
    }
}
