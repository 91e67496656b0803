use thiserror::Error;

use crate::input::InputError;
use crate::model::store::StoreError;

pub mod stage2_expression;
pub mod stage3_score;
pub mod stage4_null;
pub mod stage5_pvalues;
pub mod stage6_aggregate;
pub mod stage7_report;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(
        "sample {sample}: dense expression block of {cells} cells x {genes} genes exceeds the limit of {limit} values; reduce the interaction list or raise --max-dense-values"
    )]
    ResourceLimit {
        sample: String,
        cells: usize,
        genes: usize,
        limit: u64,
    },
    #[error(
        "permutation null of {entries} scores ({units} units x {replicates} replicates) exceeds the limit of {limit} values; lower --replicates or raise --max-dense-values"
    )]
    NullLimit {
        entries: u64,
        units: usize,
        replicates: u32,
        limit: u64,
    },
    #[error("expected {expected} samples but the sample sheet lists {found}")]
    SampleCount { expected: usize, found: usize },
    #[error("no cluster labels found in any sample (cluster field '{0}')")]
    NoClusters(String),
}
