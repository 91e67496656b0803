use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisParams {
    pub cluster_field: String,
    pub normalize: bool,
    pub scale: f32,
    pub min_mean_expr: f64,
    pub gate_policy: GatePolicy,
    pub n_replicates: u32,
    pub seed: u64,
    pub null_pool: NullPool,
    pub tail: TailMode,
    pub fisher_floor: f64,
    pub significance: f64,
    pub scope: AggregationScope,
    pub excluded_pairs: Vec<(String, String)>,
    pub expected_samples: Option<usize>,
    pub max_dense_values: u64,
}

/// Which genes must reach `min_mean_expr` for an interaction to enter the
/// permutation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GatePolicy {
    /// Keep when the ligand or the receptor reaches the threshold somewhere.
    Either,
    /// Keep only when both reach the threshold.
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NullPool {
    /// One pool per (interaction, sample, cluster pair): R values.
    ClusterPair,
    /// One pool per (interaction, sample) over every pair: R x pairs values.
    Sample,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TailMode {
    /// null >= observed
    Inclusive,
    /// null > observed
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationScope {
    Pooled,
    ByStatus,
}

pub const DEFAULT_EXCLUDED_PAIR: (&str, &str) = ("Malignant B", "Non-malignant B");

impl AnalysisParams {
    pub fn default_v1() -> Self {
        Self {
            cluster_field: "cluster".to_string(),
            normalize: true,
            scale: 10_000.0,
            min_mean_expr: 0.05,
            gate_policy: GatePolicy::Either,
            n_replicates: 30,
            seed: 42,
            null_pool: NullPool::ClusterPair,
            tail: TailMode::Inclusive,
            fisher_floor: 0.001,
            significance: 0.01,
            scope: AggregationScope::Pooled,
            excluded_pairs: vec![(
                DEFAULT_EXCLUDED_PAIR.0.to_string(),
                DEFAULT_EXCLUDED_PAIR.1.to_string(),
            )],
            expected_samples: None,
            max_dense_values: 1 << 31,
        }
    }

    pub fn is_excluded_pair(&self, ligand_cluster: &str, receptor_cluster: &str) -> bool {
        self.excluded_pairs
            .iter()
            .any(|(l, r)| l == ligand_cluster && r == receptor_cluster)
    }
}

impl GatePolicy {
    /// A gene reaches the threshold when its maximum cluster mean is at
    /// least `threshold`; only values strictly below it fail.
    pub fn passes(&self, ligand_max: f64, receptor_max: f64, threshold: f64) -> bool {
        let ligand_ok = ligand_max >= threshold;
        let receptor_ok = receptor_max >= threshold;
        match self {
            GatePolicy::Either => ligand_ok || receptor_ok,
            GatePolicy::Both => ligand_ok && receptor_ok,
        }
    }
}

impl TailMode {
    /// NaN never counts as reaching the observed value.
    #[inline]
    pub fn reaches(&self, null_value: f64, observed: f64) -> bool {
        match self {
            TailMode::Inclusive => null_value >= observed,
            TailMode::Strict => null_value > observed,
        }
    }
}
