use std::collections::HashMap;

use thiserror::Error;

pub mod features;
pub mod interactions;
pub mod meta;
pub mod mtx;
pub mod reader;
pub mod samples;
pub mod tenx;

use features::{Feature, parse_features};
use meta::load_cluster_labels;
use mtx::{CellMajorCounts, read_mtx};
use samples::SampleEntry;
use tenx::{discover_tenx, parse_barcodes};

#[derive(Debug, Clone)]
pub struct GeneIndex {
    pub gene_id_by_feature: Vec<Option<usize>>,
    pub symbols_by_gene_id: Vec<String>,
}

impl GeneIndex {
    /// Symbol to dense gene id.
    pub fn lookup(&self) -> HashMap<String, u32> {
        self.symbols_by_gene_id
            .iter()
            .enumerate()
            .map(|(id, s)| (s.clone(), id as u32))
            .collect()
    }
}

/// One sample as loaded from disk: counts, barcodes and raw cluster labels.
#[derive(Debug, Clone)]
pub struct SampleBundle {
    pub sample_id: String,
    pub gene_index: GeneIndex,
    pub barcodes: Vec<String>,
    pub cluster_labels: Vec<Option<String>>,
    pub counts: CellMajorCounts,
}

impl SampleBundle {
    pub fn n_cells(&self) -> usize {
        self.barcodes.len()
    }

    pub fn n_labelled(&self) -> usize {
        self.cluster_labels.iter().filter(|l| l.is_some()).count()
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("parse error: {0}")]
    Parse(String),
}

pub fn load_sample(entry: &SampleEntry, cluster_field: &str) -> Result<SampleBundle, InputError> {
    let paths = discover_tenx(&entry.dir)?;
    tracing::info!(
        sample = %entry.sample_id,
        mtx = %paths.mtx.display(),
        features = %paths.features.display(),
        barcodes = %paths.barcodes.display(),
        "discovered input files"
    );

    let features = parse_features(&paths.features)?;
    let gene_index = build_gene_index(&features);
    let barcodes = parse_barcodes(&paths.barcodes)?;
    let counts = read_mtx(&paths.mtx, features.len(), barcodes.len(), &gene_index)?;

    if !entry.meta_path.exists() {
        return Err(InputError::MissingInput(format!(
            "metadata {} for sample {} does not exist",
            entry.meta_path.display(),
            entry.sample_id
        )));
    }
    let cluster_labels = load_cluster_labels(&entry.meta_path, &barcodes, cluster_field)?;

    let bundle = SampleBundle {
        sample_id: entry.sample_id.clone(),
        gene_index,
        barcodes,
        cluster_labels,
        counts,
    };
    tracing::info!(
        sample = %bundle.sample_id,
        n_cells = bundle.n_cells(),
        n_labelled = bundle.n_labelled(),
        n_genes = bundle.gene_index.symbols_by_gene_id.len(),
        "sample loaded"
    );
    Ok(bundle)
}

pub fn build_gene_index(features: &[Feature]) -> GeneIndex {
    let mut symbols_by_gene_id: Vec<String> = Vec::new();
    let mut symbol_to_gene_id: HashMap<String, usize> = HashMap::new();
    let mut gene_id_by_feature: Vec<Option<usize>> = Vec::with_capacity(features.len());

    for (idx, feature) in features.iter().enumerate() {
        if feature.symbol_norm.is_empty() {
            gene_id_by_feature.push(None);
            continue;
        }
        if let Some(existing) = symbol_to_gene_id.get(feature.symbol_norm.as_str()) {
            tracing::warn!(
                feature_index = idx,
                feature_id = %feature.id,
                symbol = %feature.symbol_raw,
                "duplicate gene symbol; summing into existing gene id"
            );
            gene_id_by_feature.push(Some(*existing));
            continue;
        }
        let gene_id = symbols_by_gene_id.len();
        symbols_by_gene_id.push(feature.symbol_norm.clone());
        symbol_to_gene_id.insert(feature.symbol_norm.clone(), gene_id);
        gene_id_by_feature.push(Some(gene_id));
    }

    GeneIndex {
        gene_id_by_feature,
        symbols_by_gene_id,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tests.rs"]
mod tests;
