//! Benjamini-Hochberg false discovery rate correction.

/// Adjusted p-values in input order: sort ascending, scale by `n / rank`,
/// enforce monotonicity from the largest rank down, clamp to 1.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    if n == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]).then(a.cmp(&b)));

    let n_f = n as f64;
    let mut adjusted = vec![0.0; n];
    let mut running = f64::INFINITY;
    for rank_idx in (0..n).rev() {
        let idx = order[rank_idx];
        let rank = (rank_idx + 1) as f64;
        let adj = (p_values[idx] * n_f / rank).min(1.0).min(running);
        adjusted[idx] = adj;
        running = adj;
    }
    adjusted
}
