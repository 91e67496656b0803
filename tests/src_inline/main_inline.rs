use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("kira_lrperm_main_test_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn parse(extra: &[&str]) -> RunArgs {
    let mut argv = vec![
        "kira-lrperm",
        "run",
        "--interactions",
        "lr.tsv",
        "--samples",
        "samples.tsv",
        "--status",
        "status.tsv",
        "--out",
        "out",
    ];
    argv.extend_from_slice(extra);
    match Cli::try_parse_from(argv).unwrap().command {
        Command::Run(args) => args,
    }
}

#[test]
fn test_defaults_match_reference_profile() {
    let args = parse(&[]);
    assert_eq!(args.run_mode, RunMode::Standalone);
    let params = build_params(&args).unwrap();
    let reference = AnalysisParams::default_v1();
    assert_eq!(params.n_replicates, 30);
    assert_eq!(params.seed, 42);
    assert_eq!(params.min_mean_expr, reference.min_mean_expr);
    assert_eq!(params.fisher_floor, reference.fisher_floor);
    assert_eq!(params.significance, reference.significance);
    assert_eq!(params.max_dense_values, reference.max_dense_values);
    assert_eq!(params.excluded_pairs, reference.excluded_pairs);
    assert_eq!(params.scope, AggregationScope::Pooled);
    assert!(params.normalize);
}

#[test]
fn test_options_map_into_params() {
    let args = parse(&[
        "--gate",
        "both",
        "--null-pool",
        "sample",
        "--tail",
        "strict",
        "--split-by-status",
        "--no-normalize",
        "--exclude-pair",
        "Tumor:Stroma",
        "--exclude-pair",
        "B:T",
        "--run-mode",
        "pipeline",
    ]);
    assert_eq!(args.run_mode, RunMode::Pipeline);
    let params = build_params(&args).unwrap();
    assert_eq!(params.gate_policy, GatePolicy::Both);
    assert_eq!(params.null_pool, NullPool::Sample);
    assert_eq!(params.tail, TailMode::Strict);
    assert_eq!(params.scope, AggregationScope::ByStatus);
    assert!(!params.normalize);
    assert_eq!(
        params.excluded_pairs,
        vec![
            ("Tumor".to_string(), "Stroma".to_string()),
            ("B".to_string(), "T".to_string())
        ]
    );
}

#[test]
fn test_invalid_arguments() {
    assert!(build_params(&parse(&["--exclude-pair", "nocolon"])).is_err());
    assert!(build_params(&parse(&["--replicates", "0"])).is_err());
    assert!(build_params(&parse(&["--fisher-floor", "0"])).is_err());
    assert!(Cli::try_parse_from(["kira-lrperm", "run", "--out", "x"]).is_err());
}

/// Ten cells per sample: five "A" cells carrying L and R, five "B" cells with
/// only the housekeeping gene H.
fn write_sample(dir: &Path, cluster_a: &str, cluster_b: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("features.tsv"),
        "G1\tL\tGene Expression\nG2\tR\tGene Expression\nG3\tH\tGene Expression\n",
    )
    .unwrap();
    let barcodes: Vec<String> = (1..=10).map(|i| format!("CELL{i}")).collect();
    fs::write(dir.join("barcodes.tsv"), barcodes.join("\n") + "\n").unwrap();

    let mut mtx = String::from("%%MatrixMarket matrix coordinate integer general\n3 10 20\n");
    for cell in 1..=10 {
        if cell <= 5 {
            mtx.push_str(&format!("1 {cell} 5\n2 {cell} 5\n"));
        }
        mtx.push_str(&format!("3 {cell} 10\n"));
    }
    fs::write(dir.join("matrix.mtx"), mtx).unwrap();

    let mut meta = String::from("barcode\tcluster\n");
    for (i, bc) in barcodes.iter().enumerate() {
        let label = if i < 5 { cluster_a } else { cluster_b };
        meta.push_str(&format!("{bc}\t{label}\n"));
    }
    fs::write(dir.join("meta.tsv"), meta).unwrap();
}

fn write_inputs(root: &Path, cluster_a: &str, cluster_b: &str) {
    write_sample(&root.join("p1"), cluster_a, cluster_b);
    write_sample(&root.join("p2"), cluster_a, cluster_b);
    fs::write(
        root.join("samples.tsv"),
        "sample\tpath\np1_tumor\tp1\np2_normal\tp2\n",
    )
    .unwrap();
    fs::write(
        root.join("status.tsv"),
        "sample\tstatus\np1_tumor\tmalignant\np2_normal\tnon-malignant\n",
    )
    .unwrap();
    fs::write(root.join("lr.tsv"), "Ligand\tReceptor\tMerged\nL\tR\tL_R\n").unwrap();
}

fn run_args(root: &Path, extra: &[&str]) -> RunArgs {
    let path = |name: &str| root.join(name).to_string_lossy().into_owned();
    let (lr, samples, status, out) = (
        path("lr.tsv"),
        path("samples.tsv"),
        path("status.tsv"),
        path("out"),
    );
    let mut argv = vec![
        "kira-lrperm",
        "run",
        "--interactions",
        lr.as_str(),
        "--samples",
        samples.as_str(),
        "--status",
        status.as_str(),
        "--out",
        out.as_str(),
    ];
    argv.extend_from_slice(extra);
    match Cli::try_parse_from(argv).unwrap().command {
        Command::Run(args) => args,
    }
}

#[test]
fn test_run_writes_tables_from_tenx_inputs() {
    let root = make_temp_dir();
    write_inputs(&root, "A", "B");
    run(run_args(&root, &["--expected-samples", "2"])).unwrap();

    let out = root.join("out");
    let pvalues = fs::read_to_string(out.join("pvalues.tsv")).unwrap();
    let tested: Vec<Vec<&str>> = pvalues
        .lines()
        .skip(1)
        .map(|l| l.split('\t').collect())
        .collect();
    assert_eq!(tested.len(), 2);
    for row in &tested {
        assert_eq!(row[1], "L_R");
        assert_eq!(row[2], "A|A");
        assert_eq!(row[5], "30");
    }

    let interactions = fs::read_to_string(out.join("interactions.tsv")).unwrap();
    let pairs: Vec<&str> = interactions
        .lines()
        .skip(1)
        .map(|l| l.split('\t').nth(6).unwrap())
        .collect();
    assert_eq!(pairs.len(), 2);
    assert!(pairs.contains(&"A|B"));
    assert!(pairs.contains(&"B|A"));

    for name in ["sample_scores.tsv", "gate.tsv", "summary.json", "report.txt"] {
        assert!(out.join(name).exists(), "{name} missing");
    }
}

#[test]
fn test_run_rejects_sample_count_mismatch() {
    let root = make_temp_dir();
    write_inputs(&root, "A", "B");
    let err = run(run_args(&root, &["--expected-samples", "12"])).unwrap_err();
    assert!(matches!(
        err,
        RunError::Pipeline(PipelineError::SampleCount {
            expected: 12,
            found: 2
        })
    ));
    assert_eq!(
        err.to_string(),
        "expected 12 samples but the sample sheet lists 2"
    );
    assert!(!root.join("out").exists());
}

#[test]
fn test_run_rejects_inputs_without_cluster_labels() {
    let root = make_temp_dir();
    write_inputs(&root, "NA", "NA");
    let err = run(run_args(&root, &[])).unwrap_err();
    assert!(matches!(
        err,
        RunError::Pipeline(PipelineError::NoClusters(ref field)) if field == "cluster"
    ));
    assert!(!root.join("out").exists());
}
