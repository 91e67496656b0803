use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::pipeline::stage2_expression::FetchedRows;
use crate::pipeline::stage3_score::run_stage3;
use crate::pipeline::stage4_null::run_stage4;
use crate::pipeline::stage5_pvalues::run_stage5;
use crate::pipeline::stage6_aggregate::{Stage6Inputs, run_stage6};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("kira_lrperm_report_test_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

struct Fixture {
    interactions: Vec<InteractionDef>,
    sample_ids: Vec<String>,
    statuses: Vec<SampleStatus>,
    universe: ClusterUniverse,
    params: AnalysisParams,
    stage3: Stage3Output,
    stage4: Stage4Output,
    stage5: Stage5Output,
    stage6: Stage6Output,
}

fn fixture() -> Fixture {
    let universe = ClusterUniverse::from_labels(["Fibroblast", "T cell"]);
    let interactions = vec![InteractionDef {
        id: 0,
        name: "CXCL12_CXCR4".to_string(),
        ligand: "CXCL12".to_string(),
        receptor: "CXCR4".to_string(),
    }];
    let mut labels = vec![0u32; 8];
    labels.extend(vec![1u32; 8]);
    let mut ligand = vec![2.0f32; 8];
    ligand.extend(vec![0.0f32; 8]);
    let mut receptor = vec![0.0f32; 8];
    receptor.extend(vec![1.5f32; 8]);
    let rows = FetchedRows {
        sample_id: "s".to_string(),
        labels,
        columns: [
            ("CXCL12".to_string(), ligand),
            ("CXCR4".to_string(), receptor),
        ]
        .into_iter()
        .collect(),
    };
    let rows = vec![rows.clone(), rows];
    let sample_ids = vec!["p1_tumor".to_string(), "p2_normal".to_string()];
    let statuses = vec![SampleStatus::Malignant, SampleStatus::NonMalignant];
    let params = AnalysisParams::default_v1();

    let stage3 = run_stage3(&rows, &sample_ids, &interactions, &params).unwrap();
    let stage4 = run_stage4(&rows, &sample_ids, &interactions, &stage3, &params).unwrap();
    let stage5 = run_stage5(&stage3, &stage4, &params);
    let stage6 = run_stage6(&Stage6Inputs {
        interactions: &interactions,
        statuses: &statuses,
        universe: &universe,
        stage3: &stage3,
        stage5: &stage5,
        params: &params,
    });
    Fixture {
        interactions,
        sample_ids,
        statuses,
        universe,
        params,
        stage3,
        stage4,
        stage5,
        stage6,
    }
}

fn input(f: &Fixture, run_mode: RunMode) -> Stage7Input<'_> {
    Stage7Input {
        interactions: &f.interactions,
        sample_ids: &f.sample_ids,
        statuses: &f.statuses,
        universe: &f.universe,
        n_cells: 32,
        n_labelled_cells: 32,
        stage3: &f.stage3,
        stage4: &f.stage4,
        stage5: &f.stage5,
        stage6: &f.stage6,
        params: &f.params,
        tool_name: "kira-lrperm".to_string(),
        tool_version: "test".to_string(),
        run_mode,
    }
}

#[test]
fn test_resolve_output_dir() {
    assert_eq!(
        resolve_output_dir(Path::new("/tmp/out"), RunMode::Pipeline),
        PathBuf::from("/tmp/out/kira-lrperm")
    );
    assert_eq!(
        resolve_output_dir(Path::new("/tmp/out"), RunMode::Standalone),
        PathBuf::from("/tmp/out")
    );
}

#[test]
fn test_write_reports_standalone() {
    let f = fixture();
    let dir = make_temp_dir();
    write_reports(&input(&f, RunMode::Standalone), &dir).unwrap();

    let interactions = fs::read_to_string(dir.join("interactions.tsv")).unwrap();
    let mut lines = interactions.lines();
    let header: Vec<&str> = lines.next().unwrap().split('\t').collect();
    assert_eq!(header.len(), 16);
    assert_eq!(header[0], "group");
    assert_eq!(header[15], "significant");
    // Two clusters: only the two cross pairs survive.
    let rows: Vec<Vec<&str>> = lines.map(|l| l.split('\t').collect()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][1], "CXCL12_CXCR4");
    assert_eq!(rows[0][6], "Fibroblast|T cell");
    assert_eq!(rows[0][4], "Fibroblast");
    assert_eq!(rows[0][5], "T cell");

    let scores = fs::read_to_string(dir.join("sample_scores.tsv")).unwrap();
    assert_eq!(scores.lines().count(), 1 + 2 * 4);

    let pvalues = fs::read_to_string(dir.join("pvalues.tsv")).unwrap();
    assert_eq!(pvalues.lines().count(), 1 + f.stage5.records.len());

    let gate = fs::read_to_string(dir.join("gate.tsv")).unwrap();
    let gate_rows: Vec<Vec<&str>> = gate.lines().skip(1).map(|l| l.split('\t').collect()).collect();
    assert_eq!(
        gate_rows,
        vec![vec![
            "CXCL12_CXCR4",
            "CXCL12",
            "CXCR4",
            "2.000000",
            "1.500000",
            "2",
            "true"
        ]]
    );

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["tool"], "kira-lrperm");
    assert_eq!(summary["run_mode"], "standalone");
    assert_eq!(summary["input"]["n_samples"], 2);
    assert_eq!(summary["input"]["n_malignant"], 1);
    assert_eq!(summary["params"]["n_replicates"], 30);
    assert_eq!(summary["permutation"]["n_gated"], 1);
    assert_eq!(summary["aggregation"]["n_results"], 2);

    let report = fs::read_to_string(dir.join("report.txt")).unwrap();
    assert!(report.contains("Ligand-Receptor Permutation Report"));
    assert!(report.contains("CXCL12_CXCR4"));

    assert!(!dir.join("pipeline_step.json").exists());
}

#[test]
fn test_write_reports_pipeline_step() {
    let f = fixture();
    let dir = make_temp_dir();
    write_reports(&input(&f, RunMode::Pipeline), &dir).unwrap();

    let step: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("pipeline_step.json")).unwrap())
            .unwrap();
    assert_eq!(step["mode"], "pipeline");
    assert_eq!(step["artifacts"]["primary_metrics"], "interactions.tsv");
    assert_eq!(step["artifacts"]["gate"], "gate.tsv");
    assert_eq!(step["key_metrics"]["n_samples"], 2);
}

#[test]
fn test_summary_counts() {
    let f = fixture();
    let summary = build_summary(&input(&f, RunMode::Standalone));
    assert_eq!(summary.input.clusters, vec!["Fibroblast", "T cell"]);
    assert_eq!(summary.input.n_non_malignant, 1);
    assert_eq!(summary.permutation.n_units, 2);
    assert_eq!(summary.permutation.n_null_scores, 2 * 30 * 4);
    assert_eq!(summary.aggregation.n_grid_rows, 8);
    assert_eq!(summary.aggregation.n_self_pairs_dropped, 2);
    assert_eq!(summary.top_results.len(), 2);
    assert_eq!(summary.top_results[0].cluster_pair, "Fibroblast|T cell");
}
