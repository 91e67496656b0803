use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::model::interaction::{ClusterUniverse, InteractionDef, SampleStatus};
use crate::model::params::AnalysisParams;
use crate::pipeline::stage3_score::Stage3Output;
use crate::pipeline::stage4_null::Stage4Output;
use crate::pipeline::stage5_pvalues::Stage5Output;
use crate::pipeline::stage6_aggregate::Stage6Output;
use crate::report::json::{render_pipeline_step_json, render_summary_json};
use crate::report::text::render_report_text;
use crate::report::{
    AggregationCounts, InputCounts, PermutationCounts, RunSummary, TOP_RESULTS, TopResult,
    format_f64_6, format_pvalue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    Standalone,
    Pipeline,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Standalone => "standalone",
            RunMode::Pipeline => "pipeline",
        }
    }
}

pub fn resolve_output_dir(base: &Path, run_mode: RunMode) -> PathBuf {
    match run_mode {
        RunMode::Standalone => base.to_path_buf(),
        RunMode::Pipeline => base.join("kira-lrperm"),
    }
}

#[derive(Debug, Clone)]
pub struct Stage7Input<'a> {
    pub interactions: &'a [InteractionDef],
    pub sample_ids: &'a [String],
    pub statuses: &'a [SampleStatus],
    pub universe: &'a ClusterUniverse,
    pub n_cells: usize,
    pub n_labelled_cells: usize,

    pub stage3: &'a Stage3Output,
    pub stage4: &'a Stage4Output,
    pub stage5: &'a Stage5Output,
    pub stage6: &'a Stage6Output,

    pub params: &'a AnalysisParams,
    pub tool_name: String,
    pub tool_version: String,
    pub run_mode: RunMode,
}

pub fn write_reports(input: &Stage7Input<'_>, out_dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(out_dir)?;

    write_interactions_tsv(input, &out_dir.join("interactions.tsv"))?;
    write_sample_scores_tsv(input, &out_dir.join("sample_scores.tsv"))?;
    write_pvalues_tsv(input, &out_dir.join("pvalues.tsv"))?;
    write_gate_tsv(input, &out_dir.join("gate.tsv"))?;

    let summary = build_summary(input);
    write_text(&out_dir.join("summary.json"), &render_summary_json(&summary)?)?;
    write_text(&out_dir.join("report.txt"), &render_report_text(&summary))?;

    if input.run_mode == RunMode::Pipeline {
        write_text(
            &out_dir.join("pipeline_step.json"),
            &render_pipeline_step_json(&summary)?,
        )?;
    }

    tracing::info!(out_dir = %out_dir.display(), "reports written");
    Ok(())
}

fn write_interactions_tsv(input: &Stage7Input<'_>, path: &Path) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    let header = [
        "group",
        "interaction",
        "ligand",
        "receptor",
        "ligand_cluster",
        "receptor_cluster",
        "cluster_pair",
        "n_samples_observed",
        "n_samples_total",
        "p_combined",
        "p_adjusted",
        "mean_normalized_interaction",
        "mean_interaction_score",
        "mean_ligand_expr",
        "mean_receptor_expr",
        "significant",
    ]
    .join("\t");
    writeln!(w, "{}", header)?;

    for r in &input.stage6.results {
        let interaction = &input.interactions[r.interaction];
        let row = [
            r.group.clone(),
            interaction.name.clone(),
            interaction.ligand.clone(),
            interaction.receptor.clone(),
            input.universe.name(r.pair.ligand).to_string(),
            input.universe.name(r.pair.receptor).to_string(),
            input.universe.pair_label(r.pair),
            r.n_samples_observed.to_string(),
            r.n_samples_total.to_string(),
            format_pvalue(r.p_combined),
            format_pvalue(r.p_adjusted),
            format_f64_6(r.mean_normalized_interaction),
            format_f64_6(r.mean_interaction_score),
            format_f64_6(r.mean_ligand_expr),
            format_f64_6(r.mean_receptor_expr),
            r.significant.to_string(),
        ]
        .join("\t");
        writeln!(w, "{}", row)?;
    }
    w.flush()
}

fn write_sample_scores_tsv(input: &Stage7Input<'_>, path: &Path) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(
        w,
        "sample\tstatus\tinteraction\tcluster_pair\tligand_mean\treceptor_mean\tscore\tnormalized_score\tp_value\tp_sample_adjusted\ttested"
    )?;
    for row in &input.stage6.grid {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            input.sample_ids[row.sample],
            row.status.as_str(),
            input.interactions[row.interaction].name,
            input.universe.pair_label(row.pair),
            format_f64_6(row.ligand_mean),
            format_f64_6(row.receptor_mean),
            format_f64_6(row.score),
            format_f64_6(row.normalized),
            format_pvalue(row.p),
            format_pvalue(row.p_sample_adjusted),
            row.tested,
        )?;
    }
    w.flush()
}

fn write_pvalues_tsv(input: &Stage7Input<'_>, path: &Path) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(
        w,
        "sample\tinteraction\tcluster_pair\tobserved\tn_greater_or_equal\tn_null_total\tp_value"
    )?;
    for r in &input.stage5.records {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            input.sample_ids[r.sample],
            input.interactions[r.interaction].name,
            input.universe.pair_label(r.pair),
            format_f64_6(r.observed),
            r.n_greater_or_equal,
            r.n_null_total,
            format_pvalue(r.p),
        )?;
    }
    w.flush()
}

fn write_gate_tsv(input: &Stage7Input<'_>, path: &Path) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(
        w,
        "interaction\tligand\treceptor\tligand_max_mean\treceptor_max_mean\tn_scorable_samples\tpassed"
    )?;
    for g in &input.stage3.gate {
        let interaction = &input.interactions[g.interaction];
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            interaction.name,
            interaction.ligand,
            interaction.receptor,
            format_f64_6(g.ligand_max),
            format_f64_6(g.receptor_max),
            g.n_scorable_samples,
            g.passed,
        )?;
    }
    w.flush()
}

pub fn build_summary(input: &Stage7Input<'_>) -> RunSummary {
    let n_malignant = input
        .statuses
        .iter()
        .filter(|s| **s == SampleStatus::Malignant)
        .count();

    let top_results = input
        .stage6
        .results
        .iter()
        .take(TOP_RESULTS)
        .map(|r| TopResult {
            group: r.group.clone(),
            interaction: input.interactions[r.interaction].name.clone(),
            cluster_pair: input.universe.pair_label(r.pair),
            p_adjusted: r.p_adjusted,
            mean_normalized_interaction: r.mean_normalized_interaction,
        })
        .collect();

    RunSummary {
        tool: input.tool_name.clone(),
        version: input.tool_version.clone(),
        run_mode: input.run_mode.as_str().to_string(),
        params: input.params.clone(),
        input: InputCounts {
            n_samples: input.sample_ids.len(),
            n_malignant,
            n_non_malignant: input.statuses.len() - n_malignant,
            n_cells: input.n_cells,
            n_labelled_cells: input.n_labelled_cells,
            clusters: (0..input.universe.len() as u32)
                .map(|id| input.universe.name(id).to_string())
                .collect(),
            n_interactions: input.interactions.len(),
        },
        permutation: PermutationCounts {
            n_gated: input.stage3.n_gated(),
            n_units: input.stage4.n_units,
            n_observed_scores: input.stage3.observed.len(),
            n_null_scores: input.stage4.null.len(),
            n_tested: input.stage5.records.len(),
            unscorable: input
                .stage3
                .unscorable
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        },
        aggregation: AggregationCounts {
            n_grid_rows: input.stage6.grid.len(),
            n_results: input.stage6.results.len(),
            n_significant: input.stage6.results.iter().filter(|r| r.significant).count(),
            n_self_pairs_dropped: input.stage6.n_self_pairs_dropped,
            n_excluded_pairs_dropped: input.stage6.n_excluded_pairs_dropped,
            n_floored: input.stage6.n_floored,
        },
        top_results,
    }
}

fn write_text(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(contents.as_bytes())?;
    w.flush()
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage7_report.rs"]
mod tests;
