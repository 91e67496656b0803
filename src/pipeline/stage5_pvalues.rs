use crate::model::params::{AnalysisParams, NullPool, TailMode};
use crate::model::records::PValueRecord;
use crate::pipeline::stage3_score::Stage3Output;
use crate::pipeline::stage4_null::Stage4Output;

#[derive(Debug)]
pub struct Stage5Output {
    pub records: Vec<PValueRecord>,
}

/// Counts null values reaching `observed` under `tail`; NaN never reaches.
pub fn empirical_counts<'a>(
    null: impl IntoIterator<Item = &'a f64>,
    observed: f64,
    tail: TailMode,
) -> (u32, u32) {
    let mut hits = 0u32;
    let mut total = 0u32;
    for &v in null {
        total += 1;
        if tail.reaches(v, observed) {
            hits += 1;
        }
    }
    (hits, total)
}

/// Only positive observed scores are tested; raw p = 0 is kept as is.
pub fn run_stage5(stage3: &Stage3Output, stage4: &Stage4Output, params: &AnalysisParams) -> Stage5Output {
    let mut records = Vec::new();
    let mut empty_pools = 0usize;
    if stage4.null.is_empty() && stage3.n_gated() > 0 {
        tracing::warn!("permutation null is empty; no observed score can be tested");
    }

    for (key, score) in stage3.observed.iter() {
        if !stage3.passes_gate(key.interaction) || score.score <= 0.0 {
            continue;
        }
        let (hits, total) = match params.null_pool {
            NullPool::ClusterPair => empirical_counts(
                stage4
                    .null
                    .replicates(key.interaction, key.sample, key.pair)
                    .map(|(_, v)| v),
                score.score,
                params.tail,
            ),
            NullPool::Sample => empirical_counts(
                stage4
                    .null
                    .unit(key.interaction, key.sample)
                    .map(|(_, v)| v),
                score.score,
                params.tail,
            ),
        };
        if total == 0 {
            empty_pools += 1;
            continue;
        }
        records.push(PValueRecord {
            interaction: key.interaction,
            sample: key.sample,
            pair: key.pair,
            observed: score.score,
            n_greater_or_equal: hits,
            n_null_total: total,
            p: hits as f64 / total as f64,
        });
    }

    if empty_pools > 0 {
        tracing::warn!(empty_pools, "observed rows without a null pool were not tested");
    }
    tracing::info!(tested = records.len(), "empirical p-values computed");
    Stage5Output { records }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage5_pvalues.rs"]
mod tests;
