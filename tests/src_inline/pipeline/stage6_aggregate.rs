use std::collections::{BTreeMap, HashSet};

use super::*;
use crate::model::records::PairScore;
use crate::model::store::ResultStore;
use crate::pipeline::stage2_expression::FetchedRows;
use crate::pipeline::stage3_score::{GateRecord, run_stage3};
use crate::pipeline::stage4_null::run_stage4;
use crate::pipeline::stage5_pvalues::run_stage5;

fn interaction() -> Vec<InteractionDef> {
    vec![InteractionDef {
        id: 0,
        name: "L_R".to_string(),
        ligand: "L".to_string(),
        receptor: "R".to_string(),
    }]
}

/// Clusters A and B, two samples; only A -> B carries a score.
fn hand_built(universe: &ClusterUniverse) -> (Stage3Output, Stage5Output) {
    let ab = ClusterPair::new(0, 1);
    let mut observed = ResultStore::new();
    for (sample, score) in [(0usize, 2.0), (1, 1.0)] {
        for pair in universe.all_pairs() {
            let s = if pair == ab { score } else { 0.0 };
            observed
                .append(
                    StoreKey::observed(0, sample, pair),
                    PairScore {
                        ligand_mean: s,
                        receptor_mean: 1.0,
                        score: s,
                    },
                )
                .unwrap();
        }
    }
    let stage3 = Stage3Output {
        observed,
        scorable: vec![vec![true, true]],
        unscorable: BTreeMap::new(),
        gate: vec![GateRecord {
            interaction: 0,
            ligand_max: 2.0,
            receptor_max: 1.0,
            n_scorable_samples: 2,
            passed: true,
        }],
    };
    let record = |sample: usize, observed: f64, p: f64| PValueRecord {
        interaction: 0,
        sample,
        pair: ab,
        observed,
        n_greater_or_equal: (p * 30.0) as u32,
        n_null_total: 30,
        p,
    };
    let stage5 = Stage5Output {
        records: vec![record(0, 2.0, 0.0), record(1, 1.0, 0.5)],
    };
    (stage3, stage5)
}

#[test]
fn test_per_sample_bh_stays_within_sample() {
    let pair = ClusterPair::new(0, 1);
    let rec = |interaction: usize, sample: usize, p: f64| PValueRecord {
        interaction,
        sample,
        pair,
        observed: 1.0,
        n_greater_or_equal: 0,
        n_null_total: 30,
        p,
    };
    let records = vec![rec(0, 0, 0.01), rec(1, 0, 0.04), rec(0, 1, 0.01)];
    let adj = per_sample_bh(&records);
    assert!((adj[&(0, 0, pair)] - 0.02).abs() < 1e-12);
    assert!((adj[&(1, 0, pair)] - 0.04).abs() < 1e-12);
    assert!((adj[&(0, 1, pair)] - 0.01).abs() < 1e-12);
}

#[test]
fn test_zero_fill_and_normalization() {
    let universe = ClusterUniverse::from_labels(["A", "B"]);
    let (stage3, stage5) = hand_built(&universe);
    let params = AnalysisParams::default_v1();
    let statuses = [SampleStatus::Malignant, SampleStatus::NonMalignant];
    let interactions = interaction();
    let inputs = Stage6Inputs {
        interactions: &interactions,
        statuses: &statuses,
        universe: &universe,
        stage3: &stage3,
        stage5: &stage5,
        params: &params,
    };

    let mut grid = zero_fill(&inputs);
    assert_eq!(grid.len(), 2 * 4);
    let keys: HashSet<_> = grid.iter().map(|r| (r.sample, r.interaction, r.pair)).collect();
    assert_eq!(keys.len(), grid.len());
    for row in grid.iter().filter(|r| !r.tested) {
        assert_eq!(row.p, 1.0);
        assert_eq!(row.p_sample_adjusted, 1.0);
        assert_eq!(row.score, 0.0);
    }
    assert_eq!(grid.iter().filter(|r| r.tested).count(), 2);

    normalize_scores(&mut grid);
    let max = grid.iter().map(|r| r.normalized).fold(0.0, f64::max);
    assert_eq!(max, 1.0);
    let second = grid
        .iter()
        .find(|r| r.sample == 1 && r.pair == ClusterPair::new(0, 1))
        .unwrap();
    assert_eq!(second.normalized, 0.5);
}

#[test]
fn test_all_zero_interaction_normalizes_to_zero() {
    let universe = ClusterUniverse::from_labels(["A"]);
    let mut grid = vec![GridRow {
        sample: 0,
        status: SampleStatus::Malignant,
        interaction: 0,
        pair: ClusterPair::new(0, 0),
        ligand_mean: 0.0,
        receptor_mean: 0.0,
        score: 0.0,
        normalized: 0.0,
        p: 1.0,
        p_sample_adjusted: 1.0,
        tested: false,
    }];
    assert_eq!(universe.len(), 1);
    normalize_scores(&mut grid);
    assert_eq!(grid[0].normalized, 0.0);
}

#[test]
fn test_fisher_floor_and_final_bh() {
    let universe = ClusterUniverse::from_labels(["A", "B"]);
    let (stage3, stage5) = hand_built(&universe);
    let params = AnalysisParams::default_v1();
    let statuses = [SampleStatus::Malignant, SampleStatus::Malignant];
    let interactions = interaction();
    let out = run_stage6(&Stage6Inputs {
        interactions: &interactions,
        statuses: &statuses,
        universe: &universe,
        stage3: &stage3,
        stage5: &stage5,
        params: &params,
    });

    assert_eq!(out.n_floored, 1);
    assert_eq!(out.n_self_pairs_dropped, 2);
    assert_eq!(out.results.len(), 2);
    assert!(out.results.iter().all(|r| !r.pair.is_self_pair()));

    let top = &out.results[0];
    assert_eq!(top.group, "all");
    assert_eq!(top.pair, ClusterPair::new(0, 1));
    assert_eq!(top.n_samples_observed, 2);
    assert_eq!(top.n_samples_total, 2);
    let expected = fisher_combine(&[0.0, 0.5], 0.001).unwrap().p_value;
    assert!((top.p_combined - expected).abs() < 1e-12);
    // Four combined tests, self-pairs included, enter the final correction.
    assert!((top.p_adjusted - (expected * 4.0).min(1.0)).abs() < 1e-12);
    assert!((top.mean_normalized_interaction - 0.75).abs() < 1e-12);
    assert!((top.mean_interaction_score - 1.5).abs() < 1e-12);

    let rest = &out.results[1];
    assert_eq!(rest.pair, ClusterPair::new(1, 0));
    assert_eq!(rest.p_combined, 1.0);
    assert_eq!(rest.n_samples_observed, 0);
}

#[test]
fn test_bh_adjusted_is_monotone_in_raw_rank() {
    let universe = ClusterUniverse::from_labels(["A", "B"]);
    let (stage3, stage5) = hand_built(&universe);
    let params = AnalysisParams::default_v1();
    let statuses = [SampleStatus::Malignant, SampleStatus::Malignant];
    let interactions = interaction();
    let out = run_stage6(&Stage6Inputs {
        interactions: &interactions,
        statuses: &statuses,
        universe: &universe,
        stage3: &stage3,
        stage5: &stage5,
        params: &params,
    });
    let mut by_raw: Vec<(f64, f64)> = out
        .results
        .iter()
        .map(|r| (r.p_combined, r.p_adjusted))
        .collect();
    by_raw.sort_by(|a, b| a.0.total_cmp(&b.0));
    for w in by_raw.windows(2) {
        assert!(w[0].1 <= w[1].1);
    }
}

/// L and R are 1.0 in "Malignant B" cells and 0 in "Non-malignant B" cells;
/// "T cell" only exists in the cluster universe.
fn pipeline_run(params: &AnalysisParams) -> Stage6Output {
    let universe = ClusterUniverse::from_labels(["Malignant B", "Non-malignant B", "T cell"]);
    let mut labels = vec![0u32; 10];
    labels.extend(vec![1u32; 10]);
    let mut expr = vec![1.0f32; 10];
    expr.extend(vec![0.0f32; 10]);
    let rows = FetchedRows {
        sample_id: "s".to_string(),
        labels,
        columns: [("L".to_string(), expr.clone()), ("R".to_string(), expr)]
            .into_iter()
            .collect(),
    };
    let rows = vec![rows.clone(), rows];
    let samples = vec!["s1".to_string(), "s2".to_string()];
    let statuses = [SampleStatus::Malignant, SampleStatus::NonMalignant];
    let interactions = interaction();

    let stage3 = run_stage3(&rows, &samples, &interactions, params).unwrap();
    let stage4 = run_stage4(&rows, &samples, &interactions, &stage3, params).unwrap();
    let stage5 = run_stage5(&stage3, &stage4, params);
    run_stage6(&Stage6Inputs {
        interactions: &interactions,
        statuses: &statuses,
        universe: &universe,
        stage3: &stage3,
        stage5: &stage5,
        params,
    })
}

#[test]
fn test_pipeline_drops_self_and_excluded_pairs() {
    let params = AnalysisParams::default_v1();
    let out = pipeline_run(&params);

    assert_eq!(out.grid.len(), 2 * 9);
    let t_cell_rows = out
        .grid
        .iter()
        .filter(|r| r.pair.ligand == 2 || r.pair.receptor == 2);
    for row in t_cell_rows {
        assert_eq!(row.score, 0.0);
        assert_eq!(row.ligand_mean, 0.0);
        assert_eq!(row.p, 1.0);
    }

    assert_eq!(out.n_self_pairs_dropped, 3);
    assert_eq!(out.n_excluded_pairs_dropped, 1);
    assert_eq!(out.results.len(), 5);
    assert!(
        !out.results
            .iter()
            .any(|r| r.pair == ClusterPair::new(0, 1) || r.pair.is_self_pair())
    );
}

#[test]
fn test_split_by_status_groups() {
    let mut params = AnalysisParams::default_v1();
    params.scope = AggregationScope::ByStatus;
    params.excluded_pairs.clear();
    let out = pipeline_run(&params);

    let groups: HashSet<&str> = out.results.iter().map(|r| r.group.as_str()).collect();
    assert_eq!(groups, HashSet::from(["malignant", "non-malignant"]));
    assert_eq!(out.results.len(), 2 * 6);
    assert!(out.results.iter().all(|r| r.n_samples_total == 1));
    assert!(out.results.windows(2).all(|w| w[0].group <= w[1].group));
}
