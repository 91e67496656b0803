use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use crate::input::reader::open_maybe_gz;
use crate::input::{GeneIndex, InputError};

/// Cell-major sparse counts restricted to indexed genes. Entries of features
/// that collapse onto the same gene symbol are summed.
#[derive(Debug, Clone)]
pub struct CellMajorCounts {
    pub n_genes: usize,
    pub cells: Vec<Vec<(u32, f32)>>,
}

impl CellMajorCounts {
    pub fn libsize(&self, cell: usize) -> f64 {
        self.cells[cell].iter().map(|&(_, v)| v as f64).sum()
    }
}

fn parse_field<T: std::str::FromStr>(raw: Option<&str>, what: &str) -> Result<T, InputError> {
    raw.ok_or_else(|| InputError::Parse(format!("missing {what}")))?
        .parse()
        .map_err(|_| InputError::Parse(format!("invalid {what}")))
}

pub fn read_mtx(
    path: &Path,
    n_features_raw: usize,
    n_cells: usize,
    gene_index: &GeneIndex,
) -> Result<CellMajorCounts, InputError> {
    let mut reader = open_maybe_gz(path)?;
    let mut buf = String::new();

    if reader.read_line(&mut buf)? == 0 {
        return Err(InputError::Parse(format!("{} is empty", path.display())));
    }
    let header = buf.trim_end().to_ascii_lowercase();
    if !header.starts_with("%%matrixmarket") {
        return Err(InputError::Parse("missing MatrixMarket header".to_string()));
    }
    if header.contains("pattern") || header.contains("complex") {
        return Err(InputError::InvalidInput(format!(
            "unsupported MatrixMarket field type in {}",
            path.display()
        )));
    }

    let (rows, cols) = loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            return Err(InputError::Parse("missing matrix size line".to_string()));
        }
        let line = buf.trim_end();
        if line.starts_with('%') || line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let rows: usize = parse_field(parts.next(), "row count")?;
        let cols: usize = parse_field(parts.next(), "column count")?;
        let _nnz: usize = parse_field(parts.next(), "nnz count")?;
        break (rows, cols);
    };

    if rows != n_features_raw {
        return Err(InputError::InvalidInput(format!(
            "matrix row count {} does not match features {}",
            rows, n_features_raw
        )));
    }
    if cols != n_cells {
        return Err(InputError::InvalidInput(format!(
            "matrix column count {} does not match barcodes {}",
            cols, n_cells
        )));
    }

    let mut per_cell: Vec<BTreeMap<u32, f64>> = vec![BTreeMap::new(); cols];
    let mut line_no = 0usize;
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim_end();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let row: usize = parse_field(parts.next(), "row index")?;
        let col: usize = parse_field(parts.next(), "column index")?;
        let val: f64 = parse_field(parts.next(), "value")?;
        if row == 0 || row > rows || col == 0 || col > cols {
            return Err(InputError::Parse(format!(
                "matrix entry out of bounds at line {}",
                line_no
            )));
        }
        if !val.is_finite() || val < 0.0 {
            return Err(InputError::InvalidInput(format!(
                "matrix entry at line {} is negative or not finite",
                line_no
            )));
        }
        if val == 0.0 {
            continue;
        }
        if let Some(gene_id) = gene_index.gene_id_by_feature.get(row - 1).and_then(|v| *v) {
            *per_cell[col - 1].entry(gene_id as u32).or_insert(0.0) += val;
        }
    }

    let cells = per_cell
        .into_iter()
        .map(|m| m.into_iter().map(|(g, v)| (g, v as f32)).collect())
        .collect();

    Ok(CellMajorCounts {
        n_genes: gene_index.symbols_by_gene_id.len(),
        cells,
    })
}
