mod input;
mod logging;
mod model;
mod pipeline;
mod report;
mod stats;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::input::interactions::load_interactions;
use crate::input::samples::{assign_status, load_sample_sheet, load_status_table};
use crate::input::{InputError, SampleBundle, load_sample};
use crate::model::interaction::ClusterUniverse;
use crate::model::params::{AggregationScope, AnalysisParams, GatePolicy, NullPool, TailMode};
use crate::pipeline::PipelineError;
use crate::pipeline::stage2_expression::{
    ExpressionParams, FetchedRows, SampleExpression, build_sample_expression, fetch,
};
use crate::pipeline::stage3_score::run_stage3;
use crate::pipeline::stage4_null::run_stage4;
use crate::pipeline::stage5_pvalues::run_stage5;
use crate::pipeline::stage6_aggregate::{Stage6Inputs, run_stage6};
use crate::pipeline::stage7_report::{RunMode, Stage7Input, resolve_output_dir, write_reports};

#[derive(Debug, Parser)]
#[command(name = "kira-lrperm", version, about = "Permutation-tested ligand-receptor interaction scoring")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score interactions per sample, permutation-test them and combine across samples.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Interaction reference TSV with Ligand, Receptor and Merged columns.
    #[arg(long)]
    interactions: PathBuf,
    /// Sample sheet TSV with sample, path and optional meta columns.
    #[arg(long)]
    samples: PathBuf,
    /// Sample malignancy status TSV with sample and status columns.
    #[arg(long)]
    status: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value = "cluster")]
    cluster_field: String,
    /// Use raw counts instead of ln(1 + count / libsize * 10000).
    #[arg(long)]
    no_normalize: bool,
    #[arg(long, default_value_t = 0.05)]
    min_mean_expr: f64,
    #[arg(long, value_enum, default_value_t = GatePolicy::Either)]
    gate: GatePolicy,
    #[arg(long, default_value_t = 30)]
    replicates: u32,
    #[arg(long, value_enum, default_value_t = NullPool::ClusterPair)]
    null_pool: NullPool,
    #[arg(long, value_enum, default_value_t = TailMode::Inclusive)]
    tail: TailMode,
    #[arg(long, default_value_t = 0.001)]
    fisher_floor: f64,
    #[arg(long, default_value_t = 0.01)]
    significance: f64,
    /// Aggregate malignant and non-malignant samples separately.
    #[arg(long)]
    split_by_status: bool,
    /// Cluster pair dropped from the final table, as LIGAND:RECEPTOR. Replaces the default when given.
    #[arg(long = "exclude-pair", value_name = "LIGAND:RECEPTOR")]
    exclude_pairs: Vec<String>,
    #[arg(long)]
    expected_samples: Option<usize>,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Worker threads; 0 keeps the rayon default.
    #[arg(long, default_value_t = 0)]
    threads: usize,
    /// Upper bound on the dense expression block per sample and on the stored null scores.
    #[arg(long, default_value_t = 1u64 << 31)]
    max_dense_values: u64,
    #[arg(long, value_enum, default_value_t = RunMode::Standalone)]
    run_mode: RunMode,
}

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to write reports: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to configure thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("invalid argument: {0}")]
    InvalidArg(String),
}

fn main() {
    logging::init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args),
    };
    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn build_params(args: &RunArgs) -> Result<AnalysisParams, RunError> {
    let mut params = AnalysisParams::default_v1();
    params.cluster_field = args.cluster_field.clone();
    params.normalize = !args.no_normalize;
    params.min_mean_expr = args.min_mean_expr;
    params.gate_policy = args.gate;
    params.n_replicates = args.replicates;
    params.null_pool = args.null_pool;
    params.tail = args.tail;
    params.fisher_floor = args.fisher_floor;
    params.significance = args.significance;
    params.scope = if args.split_by_status {
        AggregationScope::ByStatus
    } else {
        AggregationScope::Pooled
    };
    if !args.exclude_pairs.is_empty() {
        params.excluded_pairs = args
            .exclude_pairs
            .iter()
            .map(|raw| parse_pair(raw))
            .collect::<Result<_, _>>()?;
    }
    params.expected_samples = args.expected_samples;
    params.seed = args.seed;
    params.max_dense_values = args.max_dense_values;

    if params.n_replicates == 0 {
        return Err(RunError::InvalidArg("--replicates must be at least 1".to_string()));
    }
    if !(params.fisher_floor > 0.0 && params.fisher_floor <= 1.0) {
        return Err(RunError::InvalidArg(
            "--fisher-floor must be in (0, 1]".to_string(),
        ));
    }
    Ok(params)
}

fn parse_pair(raw: &str) -> Result<(String, String), RunError> {
    match raw.split_once(':') {
        Some((l, r)) if !l.trim().is_empty() && !r.trim().is_empty() => {
            Ok((l.trim().to_string(), r.trim().to_string()))
        }
        _ => Err(RunError::InvalidArg(format!(
            "--exclude-pair expects LIGAND:RECEPTOR, got '{}'",
            raw
        ))),
    }
}

fn run(args: RunArgs) -> Result<(), RunError> {
    let params = build_params(&args)?;
    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()?;
    }
    let out_dir = resolve_output_dir(&args.out, args.run_mode);

    let sheet = load_sample_sheet(&args.samples)?;
    if let Some(expected) = params.expected_samples {
        if sheet.len() != expected {
            return Err(PipelineError::SampleCount {
                expected,
                found: sheet.len(),
            }
            .into());
        }
    }
    let sample_ids: Vec<String> = sheet.iter().map(|e| e.sample_id.clone()).collect();
    let statuses = assign_status(&sample_ids, &load_status_table(&args.status)?)?;
    let interactions = load_interactions(&args.interactions)?;

    let bundles = sheet
        .iter()
        .map(|entry| load_sample(entry, &params.cluster_field))
        .collect::<Result<Vec<SampleBundle>, _>>()?;
    let n_cells: usize = bundles.iter().map(|b| b.n_cells()).sum();
    let n_labelled_cells: usize = bundles.iter().map(|b| b.n_labelled()).sum();

    let universe = ClusterUniverse::from_labels(
        bundles
            .iter()
            .flat_map(|b| b.cluster_labels.iter().flatten().map(|s| s.as_str())),
    );
    if universe.is_empty() {
        return Err(PipelineError::NoClusters(params.cluster_field.clone()).into());
    }
    tracing::info!(
        samples = sample_ids.len(),
        cells = n_cells,
        labelled = n_labelled_cells,
        clusters = universe.len(),
        interactions = interactions.len(),
        "inputs loaded"
    );

    let expression_params = ExpressionParams {
        normalize: params.normalize,
        scale: params.scale,
    };
    let expressions: Vec<SampleExpression> = bundles
        .into_iter()
        .map(|b| build_sample_expression(b, &universe, expression_params))
        .collect();

    let genes: Vec<&str> = interactions
        .iter()
        .flat_map(|i| [i.ligand.as_str(), i.receptor.as_str()])
        .collect();
    let rows_by_sample = expressions
        .iter()
        .map(|e| fetch(e, &genes, params.max_dense_values))
        .collect::<Result<Vec<FetchedRows>, _>>()?;
    drop(expressions);

    let stage3 = run_stage3(&rows_by_sample, &sample_ids, &interactions, &params)?;
    let stage4 = run_stage4(&rows_by_sample, &sample_ids, &interactions, &stage3, &params)?;
    let stage5 = run_stage5(&stage3, &stage4, &params);
    let stage6 = run_stage6(&Stage6Inputs {
        interactions: &interactions,
        statuses: &statuses,
        universe: &universe,
        stage3: &stage3,
        stage5: &stage5,
        params: &params,
    });

    write_reports(
        &Stage7Input {
            interactions: &interactions,
            sample_ids: &sample_ids,
            statuses: &statuses,
            universe: &universe,
            n_cells,
            n_labelled_cells,
            stage3: &stage3,
            stage4: &stage4,
            stage5: &stage5,
            stage6: &stage6,
            params: &params,
            tool_name: "kira-lrperm".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            run_mode: args.run_mode,
        },
        &out_dir,
    )?;

    Ok(())
}

#[cfg(test)]
#[path = "../tests/src_inline/main_inline.rs"]
mod tests;
