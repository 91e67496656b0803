use crate::model::interaction::{ClusterPair, SampleStatus};

/// One cell of the observed or permuted score grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairScore {
    pub ligand_mean: f64,
    pub receptor_mean: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PValueRecord {
    pub interaction: usize,
    pub sample: usize,
    pub pair: ClusterPair,
    pub observed: f64,
    pub n_greater_or_equal: u32,
    pub n_null_total: u32,
    pub p: f64,
}

/// A row of the zero-filled (sample, interaction, pair) grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRow {
    pub sample: usize,
    pub status: SampleStatus,
    pub interaction: usize,
    pub pair: ClusterPair,
    pub ligand_mean: f64,
    pub receptor_mean: f64,
    pub score: f64,
    pub normalized: f64,
    pub p: f64,
    pub p_sample_adjusted: f64,
    pub tested: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    pub group: String,
    pub interaction: usize,
    pub pair: ClusterPair,
    pub n_samples_observed: usize,
    pub n_samples_total: usize,
    pub p_combined: f64,
    pub p_adjusted: f64,
    pub mean_normalized_interaction: f64,
    pub mean_interaction_score: f64,
    pub mean_ligand_expr: f64,
    pub mean_receptor_expr: f64,
    pub significant: bool,
}
