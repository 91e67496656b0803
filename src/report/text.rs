use crate::model::params::{AggregationScope, NullPool, TailMode};
use crate::report::{RunSummary, format_f64_6, format_pvalue, fraction};

pub fn render_report_text(data: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("Ligand-Receptor Permutation Report\n");
    out.push_str("==================================\n\n");

    out.push_str("1. Input\n");
    out.push_str(&format!(
        "Samples: {} ({} malignant, {} non-malignant)\n",
        data.input.n_samples, data.input.n_malignant, data.input.n_non_malignant
    ));
    out.push_str(&format!(
        "Cells: {} ({} labelled, fraction {})\n",
        data.input.n_cells,
        data.input.n_labelled_cells,
        format_f64_6(fraction(data.input.n_labelled_cells, data.input.n_cells))
    ));
    out.push_str(&format!(
        "Clusters ({}): {}\n",
        data.input.clusters.len(),
        data.input.clusters.join(", ")
    ));
    out.push_str(&format!(
        "Interactions: {} listed, {} passed the expression gate (>= {})\n\n",
        data.input.n_interactions,
        data.permutation.n_gated,
        format_f64_6(data.params.min_mean_expr)
    ));

    out.push_str("2. Permutation testing\n");
    out.push_str(&format!(
        "Replicates: {} (seed {})\n",
        data.params.n_replicates, data.params.seed
    ));
    out.push_str(&format!(
        "Null pool: {}\nTail: {}\n",
        null_pool_label(data.params.null_pool),
        tail_label(data.params.tail)
    ));
    out.push_str(&format!(
        "Units permuted: {}\nNull scores: {}\nTested combinations: {}\n",
        data.permutation.n_units, data.permutation.n_null_scores, data.permutation.n_tested
    ));
    if !data.permutation.unscorable.is_empty() {
        let parts: Vec<String> = data
            .permutation
            .unscorable
            .iter()
            .map(|(reason, n)| format!("{reason}={n}"))
            .collect();
        out.push_str(&format!("Unscorable (sample, interaction): {}\n", parts.join(", ")));
    }
    out.push('\n');

    out.push_str("3. Cross-sample aggregation\n");
    out.push_str(&format!("Scope: {}\n", scope_label(data.params.scope)));
    out.push_str(&format!(
        "Results: {}\nSignificant (p_adjusted < {}): {}\n",
        data.aggregation.n_results,
        data.params.significance,
        data.aggregation.n_significant
    ));
    out.push_str(&format!(
        "Dropped: {} self-pairs, {} excluded pairs\n\n",
        data.aggregation.n_self_pairs_dropped, data.aggregation.n_excluded_pairs_dropped
    ));

    out.push_str("4. Top interactions\n");
    if data.top_results.is_empty() {
        out.push_str("No interactions to report.\n");
    }
    for r in &data.top_results {
        out.push_str(&format!(
            "{}\t{}\t{}\tp_adjusted={}\tmean_normalized={}\n",
            r.group,
            r.interaction,
            r.cluster_pair,
            format_pvalue(r.p_adjusted),
            format_f64_6(r.mean_normalized_interaction)
        ));
    }
    out.push('\n');

    out.push_str("5. Caveats\n");
    out.push_str(&format!(
        "Empirical p-values have a resolution of 1/{} per pool.\n",
        data.params.n_replicates
    ));
    if data.aggregation.n_floored > 0 {
        out.push_str(&format!(
            "{} adjusted p-values of exactly 0 were floored to {} before Fisher combination.\n",
            data.aggregation.n_floored,
            data.params.fisher_floor
        ));
    }
    if data.permutation.n_gated == 0 {
        out.push_str("No interaction passed the expression gate.\n");
    }

    out
}

fn null_pool_label(pool: NullPool) -> &'static str {
    match pool {
        NullPool::ClusterPair => "per cluster pair",
        NullPool::Sample => "per sample (all cluster pairs)",
    }
}

fn tail_label(tail: TailMode) -> &'static str {
    match tail {
        TailMode::Inclusive => "null >= observed",
        TailMode::Strict => "null > observed",
    }
}

fn scope_label(scope: AggregationScope) -> &'static str {
    match scope {
        AggregationScope::Pooled => "all samples pooled",
        AggregationScope::ByStatus => "per malignancy status",
    }
}
