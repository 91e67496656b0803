use std::collections::BTreeMap;

use crate::model::interaction::{ClusterPair, InteractionDef};
use crate::model::params::AnalysisParams;
use crate::model::records::PairScore;
use crate::model::store::{ResultStore, StoreKey};
use crate::pipeline::PipelineError;
use crate::pipeline::stage2_expression::{FetchedRows, GeneExpressionSource, cluster_means};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnscorableReason {
    MissingLigand,
    MissingReceptor,
    MissingBoth,
    NoLabelledCells,
}

impl UnscorableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnscorableReason::MissingLigand => "missing_ligand",
            UnscorableReason::MissingReceptor => "missing_receptor",
            UnscorableReason::MissingBoth => "missing_both",
            UnscorableReason::NoLabelledCells => "no_labelled_cells",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Scored(BTreeMap<ClusterPair, PairScore>),
    Unscorable(UnscorableReason),
}

#[derive(Debug, Clone)]
pub struct GateRecord {
    pub interaction: usize,
    pub ligand_max: f64,
    pub receptor_max: f64,
    pub n_scorable_samples: usize,
    pub passed: bool,
}

#[derive(Debug)]
pub struct Stage3Output {
    pub observed: ResultStore<PairScore>,
    /// `scorable[interaction][sample]`
    pub scorable: Vec<Vec<bool>>,
    pub unscorable: BTreeMap<&'static str, usize>,
    pub gate: Vec<GateRecord>,
}

impl Stage3Output {
    pub fn passes_gate(&self, interaction: usize) -> bool {
        self.gate[interaction].passed
    }

    pub fn n_gated(&self) -> usize {
        self.gate.iter().filter(|g| g.passed).count()
    }
}

/// Score of every (ligand cluster, receptor cluster) combination:
/// `mean(ligand | ligand cluster) * mean(receptor | receptor cluster)`.
pub fn pair_scores(
    ligand_means: &BTreeMap<u32, f64>,
    receptor_means: &BTreeMap<u32, f64>,
) -> BTreeMap<ClusterPair, PairScore> {
    let mut out = BTreeMap::new();
    for (&lc, &lm) in ligand_means {
        for (&rc, &rm) in receptor_means {
            out.insert(
                ClusterPair::new(lc, rc),
                PairScore {
                    ligand_mean: lm,
                    receptor_mean: rm,
                    score: lm * rm,
                },
            );
        }
    }
    out
}

/// Pair scores under an arbitrary labelling; used for permuted labels.
pub fn score_grid(
    labels: &[u32],
    ligand: &[f32],
    receptor: &[f32],
) -> BTreeMap<ClusterPair, PairScore> {
    pair_scores(
        &cluster_means(labels, ligand),
        &cluster_means(labels, receptor),
    )
}

/// Observed pair scores from the sample's own cluster means.
pub fn score_interaction(rows: &FetchedRows, interaction: &InteractionDef) -> ScoreOutcome {
    let ligand = rows.mean_by_cluster(&interaction.ligand);
    let receptor = rows.mean_by_cluster(&interaction.receptor);
    let (ligand, receptor) = match (ligand, receptor) {
        (Some(l), Some(r)) => (l, r),
        (None, Some(_)) => return ScoreOutcome::Unscorable(UnscorableReason::MissingLigand),
        (Some(_), None) => return ScoreOutcome::Unscorable(UnscorableReason::MissingReceptor),
        (None, None) => return ScoreOutcome::Unscorable(UnscorableReason::MissingBoth),
    };
    if rows.n_rows() == 0 {
        return ScoreOutcome::Unscorable(UnscorableReason::NoLabelledCells);
    }
    ScoreOutcome::Scored(pair_scores(&ligand, &receptor))
}

pub fn run_stage3(
    rows_by_sample: &[FetchedRows],
    sample_ids: &[String],
    interactions: &[InteractionDef],
    params: &AnalysisParams,
) -> Result<Stage3Output, PipelineError> {
    let mut observed = ResultStore::new();
    let mut scorable = vec![vec![false; rows_by_sample.len()]; interactions.len()];
    let mut unscorable: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut gate = Vec::with_capacity(interactions.len());

    for interaction in interactions {
        let mut ligand_max = 0.0f64;
        let mut receptor_max = 0.0f64;
        let mut n_scorable = 0usize;
        for (sample, rows) in rows_by_sample.iter().enumerate() {
            match score_interaction(rows, interaction) {
                ScoreOutcome::Scored(grid) => {
                    n_scorable += 1;
                    scorable[interaction.id][sample] = true;
                    for (pair, score) in grid {
                        ligand_max = ligand_max.max(score.ligand_mean);
                        receptor_max = receptor_max.max(score.receptor_mean);
                        observed.append(StoreKey::observed(interaction.id, sample, pair), score)?;
                    }
                }
                ScoreOutcome::Unscorable(reason) => {
                    tracing::debug!(
                        interaction = %interaction.name,
                        sample = %sample_ids[sample],
                        reason = reason.as_str(),
                        "interaction unscorable in sample"
                    );
                    *unscorable.entry(reason.as_str()).or_insert(0) += 1;
                }
            }
        }
        let passed = n_scorable > 0
            && params
                .gate_policy
                .passes(ligand_max, receptor_max, params.min_mean_expr);
        gate.push(GateRecord {
            interaction: interaction.id,
            ligand_max,
            receptor_max,
            n_scorable_samples: n_scorable,
            passed,
        });
    }

    let out = Stage3Output {
        observed,
        scorable,
        unscorable,
        gate,
    };
    tracing::info!(
        interactions = interactions.len(),
        passed_gate = out.n_gated(),
        observed_rows = out.observed.len(),
        "observed interaction scores computed"
    );
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage3_score.rs"]
mod tests;
