//! Fisher's combined probability test.

use statrs::distribution::{ChiSquared, ContinuousCDF};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FisherResult {
    pub p_value: f64,
    pub n_floored: usize,
}

/// Combines independent p-values as `X = -2 * sum(ln p_i)` against
/// chi-squared(2k). Exact zeros are replaced by `floor`, which keeps `ln(0)`
/// out of the statistic.
pub fn fisher_combine(p_values: &[f64], floor: f64) -> Option<FisherResult> {
    if p_values.is_empty() {
        return None;
    }
    let mut statistic = 0.0f64;
    let mut n_floored = 0usize;
    for &p in p_values {
        let p = if p == 0.0 {
            n_floored += 1;
            floor
        } else {
            p.clamp(f64::MIN_POSITIVE, 1.0)
        };
        statistic -= 2.0 * p.ln();
    }
    let chi2 = ChiSquared::new(2.0 * p_values.len() as f64).ok()?;
    Some(FisherResult {
        p_value: chi2.sf(statistic.max(0.0)).clamp(0.0, 1.0),
        n_floored,
    })
}
