use std::collections::{BTreeMap, HashMap};

use crate::input::SampleBundle;
use crate::model::interaction::ClusterUniverse;
use crate::pipeline::PipelineError;

/// Per-sample expression capability. Gene presence is a checked answer
/// rather than an implicitly missing column.
pub trait GeneExpressionSource: Sync {
    fn sample_id(&self) -> &str;
    fn has_gene(&self, symbol: &str) -> bool;
    /// Dense expression of `symbol` over every cell of the source.
    fn gene_values(&self, symbol: &str) -> Option<Vec<f32>>;
    /// `(cell, cluster)` of every labelled cell, in cell order.
    fn labelled_cells(&self) -> Vec<(usize, u32)>;

    /// Per-cluster mean of `symbol` over labelled cells; `None` when the
    /// gene is absent.
    fn mean_by_cluster(&self, symbol: &str) -> Option<BTreeMap<u32, f64>> {
        let values = self.gene_values(symbol)?;
        let (cells, labels): (Vec<usize>, Vec<u32>) = self.labelled_cells().into_iter().unzip();
        let picked: Vec<f32> = cells.iter().map(|&c| values[c]).collect();
        Some(cluster_means(&labels, &picked))
    }
}

/// Mean of the finite values per cluster. Clusters whose values are all
/// non-finite get no entry.
pub fn cluster_means(labels: &[u32], values: &[f32]) -> BTreeMap<u32, f64> {
    let mut acc: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (&label, &value) in labels.iter().zip(values) {
        let e = acc.entry(label).or_insert((0.0, 0));
        if value.is_finite() {
            e.0 += value as f64;
            e.1 += 1;
        }
    }
    acc.into_iter()
        .filter(|(_, (_, n))| *n > 0)
        .map(|(c, (sum, n))| (c, sum / n as f64))
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct ExpressionParams {
    pub normalize: bool,
    pub scale: f32,
}

/// Gene-major normalized expression of one sample.
#[derive(Debug, Clone)]
pub struct SampleExpression {
    sample_id: String,
    n_cells: usize,
    gene_lookup: HashMap<String, u32>,
    by_gene: Vec<Vec<(u32, f32)>>,
    labels: Vec<Option<u32>>,
}

impl GeneExpressionSource for SampleExpression {
    fn sample_id(&self) -> &str {
        &self.sample_id
    }

    fn has_gene(&self, symbol: &str) -> bool {
        self.gene_lookup.contains_key(symbol)
    }

    fn gene_values(&self, symbol: &str) -> Option<Vec<f32>> {
        let gene = *self.gene_lookup.get(symbol)?;
        let mut dense = vec![0.0f32; self.n_cells];
        for &(cell, value) in &self.by_gene[gene as usize] {
            dense[cell as usize] = value;
        }
        Some(dense)
    }

    fn labelled_cells(&self) -> Vec<(usize, u32)> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(cell, l)| l.map(|c| (cell, c)))
            .collect()
    }
}

pub fn build_sample_expression(
    bundle: SampleBundle,
    universe: &ClusterUniverse,
    params: ExpressionParams,
) -> SampleExpression {
    let n_cells = bundle.n_cells();
    let n_genes = bundle.counts.n_genes;
    let mut by_gene: Vec<Vec<(u32, f32)>> = vec![Vec::new(); n_genes];

    for (cell, entries) in bundle.counts.cells.iter().enumerate() {
        let lib = bundle.counts.libsize(cell);
        for &(gene, count) in entries {
            let value = if params.normalize {
                if lib == 0.0 {
                    0.0
                } else {
                    ((count as f64) / lib * (params.scale as f64)).ln_1p() as f32
                }
            } else {
                count
            };
            if value != 0.0 {
                by_gene[gene as usize].push((cell as u32, value));
            }
        }
    }

    let gene_lookup = bundle.gene_index.lookup();

    let labels = bundle
        .cluster_labels
        .iter()
        .map(|l| l.as_deref().and_then(|name| universe.id(name)))
        .collect();

    SampleExpression {
        sample_id: bundle.sample_id,
        n_cells,
        gene_lookup,
        by_gene,
        labels,
    }
}

/// Rows of labelled cells with one column per requested gene that the
/// sample actually has. Absent genes are left out; callers check
/// [`FetchedRows::column`].
#[derive(Debug, Clone)]
pub struct FetchedRows {
    pub sample_id: String,
    pub labels: Vec<u32>,
    pub columns: BTreeMap<String, Vec<f32>>,
}

impl FetchedRows {
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }

    pub fn column(&self, gene: &str) -> Option<&[f32]> {
        self.columns.get(gene).map(|v| v.as_slice())
    }
}

impl GeneExpressionSource for FetchedRows {
    fn sample_id(&self) -> &str {
        &self.sample_id
    }

    fn has_gene(&self, symbol: &str) -> bool {
        self.columns.contains_key(symbol)
    }

    fn gene_values(&self, symbol: &str) -> Option<Vec<f32>> {
        self.column(symbol).map(<[f32]>::to_vec)
    }

    fn labelled_cells(&self) -> Vec<(usize, u32)> {
        self.labels.iter().copied().enumerate().collect()
    }

    fn mean_by_cluster(&self, symbol: &str) -> Option<BTreeMap<u32, f64>> {
        Some(cluster_means(&self.labels, self.column(symbol)?))
    }
}

pub fn fetch(
    source: &dyn GeneExpressionSource,
    gene_names: &[&str],
    max_dense_values: u64,
) -> Result<FetchedRows, PipelineError> {
    let (labelled, labels): (Vec<usize>, Vec<u32>) = source.labelled_cells().into_iter().unzip();

    let mut present: Vec<&str> = gene_names
        .iter()
        .copied()
        .filter(|g| source.has_gene(g))
        .collect();
    present.sort_unstable();
    present.dedup();

    let dense = labelled.len() as u64 * present.len() as u64;
    if dense > max_dense_values {
        return Err(PipelineError::ResourceLimit {
            sample: source.sample_id().to_string(),
            cells: labelled.len(),
            genes: present.len(),
            limit: max_dense_values,
        });
    }

    let mut columns = BTreeMap::new();
    for gene in present {
        if let Some(all) = source.gene_values(gene) {
            let column: Vec<f32> = labelled.iter().map(|&cell| all[cell]).collect();
            columns.insert(gene.to_string(), column);
        }
    }

    Ok(FetchedRows {
        sample_id: source.sample_id().to_string(),
        labels,
        columns,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage2_expression.rs"]
mod tests;
