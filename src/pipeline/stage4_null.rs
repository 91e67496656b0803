use std::collections::BTreeSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::model::interaction::InteractionDef;
use crate::model::params::AnalysisParams;
use crate::model::store::{ResultStore, StoreKey};
use crate::pipeline::PipelineError;
use crate::pipeline::stage2_expression::FetchedRows;
use crate::pipeline::stage3_score::{Stage3Output, score_grid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullUnit {
    pub interaction: usize,
    pub sample: usize,
}

#[derive(Debug)]
pub struct Stage4Output {
    pub null: ResultStore<f64>,
    pub n_units: usize,
}

/// Seed of one replicate: FNV-1a over the base seed, interaction name,
/// sample id and replicate index. Independent of thread scheduling.
pub fn replicate_seed(base_seed: u64, interaction: &str, sample: &str, replicate: u32) -> u64 {
    let mut h = Fnv64::new();
    h.update(&base_seed.to_le_bytes());
    h.update(interaction.as_bytes());
    h.update(&[0]);
    h.update(sample.as_bytes());
    h.update(&[0]);
    h.update(&replicate.to_le_bytes());
    h.finish()
}

/// Uniform permutation of the label vector; the multiset of labels is kept.
pub fn permute_labels(labels: &[u32], seed: u64) -> Vec<u32> {
    let mut out = labels.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    out.shuffle(&mut rng);
    out
}

pub fn plan_units(stage3: &Stage3Output, n_samples: usize) -> Vec<NullUnit> {
    let mut units = Vec::new();
    for gate in stage3.gate.iter().filter(|g| g.passed) {
        for sample in 0..n_samples {
            if stage3.scorable[gate.interaction][sample] {
                units.push(NullUnit {
                    interaction: gate.interaction,
                    sample,
                });
            }
        }
    }
    units
}

/// Null scores the units will store: R x (clusters present in the sample)^2
/// per unit.
pub fn estimate_null_entries(
    units: &[NullUnit],
    rows_by_sample: &[FetchedRows],
    n_replicates: u32,
) -> u64 {
    let clusters: Vec<u64> = rows_by_sample
        .iter()
        .map(|rows| rows.labels.iter().collect::<BTreeSet<_>>().len() as u64)
        .collect();
    units
        .iter()
        .map(|u| {
            let k = clusters[u.sample];
            (n_replicates as u64).saturating_mul(k * k)
        })
        .fold(0u64, u64::saturating_add)
}

fn run_unit(
    unit: NullUnit,
    rows: &FetchedRows,
    interaction: &InteractionDef,
    sample_id: &str,
    params: &AnalysisParams,
) -> Vec<(StoreKey, f64)> {
    let (Some(ligand), Some(receptor)) = (
        rows.column(&interaction.ligand),
        rows.column(&interaction.receptor),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for replicate in 1..=params.n_replicates {
        let seed = replicate_seed(params.seed, &interaction.name, sample_id, replicate);
        let labels = permute_labels(&rows.labels, seed);
        for (pair, score) in score_grid(&labels, ligand, receptor) {
            out.push((
                StoreKey::null(unit.interaction, unit.sample, pair, replicate),
                score.score,
            ));
        }
    }
    out
}

pub fn run_stage4(
    rows_by_sample: &[FetchedRows],
    sample_ids: &[String],
    interactions: &[InteractionDef],
    stage3: &Stage3Output,
    params: &AnalysisParams,
) -> Result<Stage4Output, PipelineError> {
    let units = plan_units(stage3, rows_by_sample.len());
    let entries = estimate_null_entries(&units, rows_by_sample, params.n_replicates);
    if entries > params.max_dense_values {
        return Err(PipelineError::NullLimit {
            entries,
            units: units.len(),
            replicates: params.n_replicates,
            limit: params.max_dense_values,
        });
    }
    tracing::info!(
        units = units.len(),
        replicates = params.n_replicates,
        null_scores = entries,
        threads = rayon::current_num_threads(),
        "generating permutation null"
    );

    let per_unit: Vec<Vec<(StoreKey, f64)>> = units
        .par_iter()
        .map(|&unit| {
            run_unit(
                unit,
                &rows_by_sample[unit.sample],
                &interactions[unit.interaction],
                &sample_ids[unit.sample],
                params,
            )
        })
        .collect();

    let mut null = ResultStore::new();
    for slot in per_unit {
        null.extend(slot)?;
    }

    tracing::info!(null_scores = null.len(), "permutation null complete");
    Ok(Stage4Output {
        null,
        n_units: units.len(),
    })
}

struct Fnv64 {
    hash: u64,
}

impl Fnv64 {
    fn new() -> Self {
        Self {
            hash: 0xcbf29ce484222325,
        }
    }

    fn update(&mut self, data: &[u8]) {
        let mut h = self.hash;
        for &b in data {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        self.hash = h;
    }

    fn finish(&self) -> u64 {
        self.hash
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage4_null.rs"]
mod tests;
