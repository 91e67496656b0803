use serde::Serialize;

use crate::report::RunSummary;

pub fn render_summary_json(data: &RunSummary) -> serde_json::Result<String> {
    serde_json::to_string_pretty(data)
}

#[derive(Debug, Serialize)]
struct PipelineStep<'a> {
    tool: &'a str,
    mode: &'static str,
    artifacts: Artifacts,
    key_metrics: KeyMetrics,
}

#[derive(Debug, Serialize)]
struct Artifacts {
    summary: &'static str,
    primary_metrics: &'static str,
    sample_scores: &'static str,
    pvalues: &'static str,
    gate: &'static str,
}

#[derive(Debug, Serialize)]
struct KeyMetrics {
    n_samples: usize,
    n_interactions_gated: usize,
    n_results: usize,
    n_significant: usize,
}

/// Aggregator contract for `--run-mode pipeline`.
pub fn render_pipeline_step_json(data: &RunSummary) -> serde_json::Result<String> {
    let step = PipelineStep {
        tool: &data.tool,
        mode: "pipeline",
        artifacts: Artifacts {
            summary: "summary.json",
            primary_metrics: "interactions.tsv",
            sample_scores: "sample_scores.tsv",
            pvalues: "pvalues.tsv",
            gate: "gate.tsv",
        },
        key_metrics: KeyMetrics {
            n_samples: data.input.n_samples,
            n_interactions_gated: data.permutation.n_gated,
            n_results: data.aggregation.n_results,
            n_significant: data.aggregation.n_significant,
        },
    };
    serde_json::to_string_pretty(&step)
}
