use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::params::AnalysisParams;

pub mod json;
pub mod text;

#[derive(Debug, Clone, Serialize)]
pub struct InputCounts {
    pub n_samples: usize,
    pub n_malignant: usize,
    pub n_non_malignant: usize,
    pub n_cells: usize,
    pub n_labelled_cells: usize,
    pub clusters: Vec<String>,
    pub n_interactions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermutationCounts {
    pub n_gated: usize,
    pub n_units: usize,
    pub n_observed_scores: usize,
    pub n_null_scores: usize,
    pub n_tested: usize,
    pub unscorable: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregationCounts {
    pub n_grid_rows: usize,
    pub n_results: usize,
    pub n_significant: usize,
    pub n_self_pairs_dropped: usize,
    pub n_excluded_pairs_dropped: usize,
    pub n_floored: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopResult {
    pub group: String,
    pub interaction: String,
    pub cluster_pair: String,
    pub p_adjusted: f64,
    pub mean_normalized_interaction: f64,
}

/// Everything `summary.json` and `report.txt` are rendered from.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub tool: String,
    pub version: String,
    pub run_mode: String,
    pub params: AnalysisParams,
    pub input: InputCounts,
    pub permutation: PermutationCounts,
    pub aggregation: AggregationCounts,
    pub top_results: Vec<TopResult>,
}

pub const TOP_RESULTS: usize = 10;

pub fn format_f64_6(v: f64) -> String {
    format!("{:.6}", v)
}

/// Small p-values switch to scientific notation so they survive the round
/// trip through the table.
pub fn format_pvalue(p: f64) -> String {
    if p != 0.0 && p < 1e-4 {
        format!("{:.6e}", p)
    } else {
        format!("{:.6}", p)
    }
}

pub fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/mod.rs"]
mod tests;
