use std::collections::{BTreeMap, HashMap};

use crate::model::interaction::{ClusterPair, ClusterUniverse, InteractionDef, SampleStatus};
use crate::model::params::{AggregationScope, AnalysisParams};
use crate::model::records::{AggregatedResult, GridRow, PValueRecord};
use crate::model::store::StoreKey;
use crate::pipeline::stage3_score::Stage3Output;
use crate::pipeline::stage5_pvalues::Stage5Output;
use crate::stats::{benjamini_hochberg, fisher_combine, mean};

#[derive(Debug)]
pub struct Stage6Output {
    pub grid: Vec<GridRow>,
    pub results: Vec<AggregatedResult>,
    pub n_self_pairs_dropped: usize,
    pub n_excluded_pairs_dropped: usize,
    pub n_floored: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Stage6Inputs<'a> {
    pub interactions: &'a [InteractionDef],
    pub statuses: &'a [SampleStatus],
    pub universe: &'a ClusterUniverse,
    pub stage3: &'a Stage3Output,
    pub stage5: &'a Stage5Output,
    pub params: &'a AnalysisParams,
}

type CellKey = (usize, usize, ClusterPair);

/// BH within each sample over that sample's tested p-values.
pub fn per_sample_bh(records: &[PValueRecord]) -> HashMap<CellKey, f64> {
    let mut by_sample: BTreeMap<usize, Vec<&PValueRecord>> = BTreeMap::new();
    for r in records {
        by_sample.entry(r.sample).or_default().push(r);
    }
    let mut out = HashMap::with_capacity(records.len());
    for (_, recs) in by_sample {
        let raw: Vec<f64> = recs.iter().map(|r| r.p).collect();
        for (r, adj) in recs.iter().zip(benjamini_hochberg(&raw)) {
            out.insert((r.interaction, r.sample, r.pair), adj);
        }
    }
    out
}

/// Every (sample, gated interaction, pair over the cluster universe) exactly
/// once. Combinations that were not tested carry p = 1; combinations that
/// were never observed also carry zero means and score.
pub fn zero_fill(inputs: &Stage6Inputs<'_>) -> Vec<GridRow> {
    let raw: HashMap<CellKey, f64> = inputs
        .stage5
        .records
        .iter()
        .map(|r| ((r.interaction, r.sample, r.pair), r.p))
        .collect();
    let adjusted = per_sample_bh(&inputs.stage5.records);
    let pairs = inputs.universe.all_pairs();

    let mut grid = Vec::new();
    for (sample, &status) in inputs.statuses.iter().enumerate() {
        for interaction in inputs.interactions {
            if !inputs.stage3.passes_gate(interaction.id) {
                continue;
            }
            for &pair in &pairs {
                let key = (interaction.id, sample, pair);
                let observed = inputs
                    .stage3
                    .observed
                    .get(&StoreKey::observed(interaction.id, sample, pair));
                let (ligand_mean, receptor_mean, score) = observed
                    .map(|s| (s.ligand_mean, s.receptor_mean, s.score))
                    .unwrap_or((0.0, 0.0, 0.0));
                let p = raw.get(&key).copied();
                grid.push(GridRow {
                    sample,
                    status,
                    interaction: interaction.id,
                    pair,
                    ligand_mean,
                    receptor_mean,
                    score,
                    normalized: 0.0,
                    p: p.unwrap_or(1.0),
                    p_sample_adjusted: adjusted.get(&key).copied().unwrap_or(1.0),
                    tested: p.is_some(),
                });
            }
        }
    }
    grid
}

/// Divides each row's score by its interaction's maximum over the whole
/// grid. An interaction whose maximum is 0 normalizes to 0 everywhere.
pub fn normalize_scores(grid: &mut [GridRow]) {
    let mut max_by_interaction: HashMap<usize, f64> = HashMap::new();
    for row in grid.iter() {
        let e = max_by_interaction.entry(row.interaction).or_insert(0.0);
        if row.score > *e {
            *e = row.score;
        }
    }
    for row in grid.iter_mut() {
        let max = max_by_interaction.get(&row.interaction).copied().unwrap_or(0.0);
        row.normalized = if max > 0.0 { row.score / max } else { 0.0 };
    }
}

fn scope_groups(
    scope: AggregationScope,
    statuses: &[SampleStatus],
) -> Vec<(String, Vec<bool>)> {
    match scope {
        AggregationScope::Pooled => vec![("all".to_string(), vec![true; statuses.len()])],
        AggregationScope::ByStatus => [SampleStatus::Malignant, SampleStatus::NonMalignant]
            .into_iter()
            .map(|s| {
                (
                    s.as_str().to_string(),
                    statuses.iter().map(|x| *x == s).collect::<Vec<bool>>(),
                )
            })
            .filter(|(_, members)| members.iter().any(|&m| m))
            .collect(),
    }
}

fn mean_of(rows: &[&GridRow], f: impl Fn(&GridRow) -> f64) -> f64 {
    let values: Vec<f64> = rows.iter().map(|r| f(*r)).collect();
    mean(&values).unwrap_or(0.0)
}

fn aggregate_group(
    group: &str,
    members: &[bool],
    cells: &BTreeMap<(usize, ClusterPair), Vec<usize>>,
    grid: &[GridRow],
    params: &AnalysisParams,
    n_floored: &mut usize,
) -> Vec<AggregatedResult> {
    let mut out = Vec::with_capacity(cells.len());
    for (&(interaction, pair), rows) in cells {
        let rows: Vec<&GridRow> = rows
            .iter()
            .map(|&i| &grid[i])
            .filter(|r| members[r.sample])
            .collect();
        let p_values: Vec<f64> = rows.iter().map(|r| r.p_sample_adjusted).collect();
        let Some(fisher) = fisher_combine(&p_values, params.fisher_floor) else {
            continue;
        };
        *n_floored += fisher.n_floored;
        out.push(AggregatedResult {
            group: group.to_string(),
            interaction,
            pair,
            n_samples_observed: rows.iter().filter(|r| r.tested).count(),
            n_samples_total: rows.len(),
            p_combined: fisher.p_value,
            p_adjusted: 1.0,
            mean_normalized_interaction: mean_of(&rows, |r| r.normalized),
            mean_interaction_score: mean_of(&rows, |r| r.score),
            mean_ligand_expr: mean_of(&rows, |r| r.ligand_mean),
            mean_receptor_expr: mean_of(&rows, |r| r.receptor_mean),
            significant: false,
        });
    }

    let combined: Vec<f64> = out.iter().map(|r| r.p_combined).collect();
    for (r, adj) in out.iter_mut().zip(benjamini_hochberg(&combined)) {
        r.p_adjusted = adj;
        r.significant = adj < params.significance;
    }
    out
}

pub fn run_stage6(inputs: &Stage6Inputs<'_>) -> Stage6Output {
    let mut grid = zero_fill(inputs);
    normalize_scores(&mut grid);

    let mut cells: BTreeMap<(usize, ClusterPair), Vec<usize>> = BTreeMap::new();
    for (idx, row) in grid.iter().enumerate() {
        cells.entry((row.interaction, row.pair)).or_default().push(idx);
    }

    let mut n_floored = 0usize;
    let mut results = Vec::new();
    for (group, members) in scope_groups(inputs.params.scope, inputs.statuses) {
        results.extend(aggregate_group(
            &group,
            &members,
            &cells,
            &grid,
            inputs.params,
            &mut n_floored,
        ));
    }

    // Self-pairs and excluded pairs take part in every correction above and
    // are only dropped from the reported table.
    let before = results.len();
    results.retain(|r| !r.pair.is_self_pair());
    let n_self_pairs_dropped = before - results.len();
    let before = results.len();
    results.retain(|r| {
        !inputs.params.is_excluded_pair(
            inputs.universe.name(r.pair.ligand),
            inputs.universe.name(r.pair.receptor),
        )
    });
    let n_excluded_pairs_dropped = before - results.len();

    results.sort_by(|a, b| {
        a.group
            .cmp(&b.group)
            .then(a.p_adjusted.total_cmp(&b.p_adjusted))
            .then(a.interaction.cmp(&b.interaction))
            .then(a.pair.cmp(&b.pair))
    });

    if n_floored > 0 {
        tracing::info!(
            n_floored,
            floor = inputs.params.fisher_floor,
            "zero p-values floored before Fisher combination"
        );
    }
    tracing::info!(
        grid_rows = grid.len(),
        results = results.len(),
        significant = results.iter().filter(|r| r.significant).count(),
        "cross-sample aggregation complete"
    );

    Stage6Output {
        grid,
        results,
        n_self_pairs_dropped,
        n_excluded_pairs_dropped,
        n_floored,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage6_aggregate.rs"]
mod tests;
