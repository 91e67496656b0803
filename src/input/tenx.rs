use std::path::{Path, PathBuf};

use crate::input::InputError;
use crate::input::reader::TsvLines;

#[derive(Debug, Clone)]
pub struct TenxPaths {
    pub mtx: PathBuf,
    pub features: PathBuf,
    pub barcodes: PathBuf,
}

pub fn discover_tenx(dir: &Path) -> Result<TenxPaths, InputError> {
    if !dir.is_dir() {
        return Err(InputError::MissingInput(format!(
            "10x directory {} does not exist",
            dir.display()
        )));
    }
    let mtx = first_existing(dir, &["matrix.mtx", "matrix.mtx.gz"]).ok_or_else(|| {
        InputError::MissingInput(format!(
            "missing matrix.mtx or matrix.mtx.gz in {}",
            dir.display()
        ))
    })?;
    let features = first_existing(
        dir,
        &[
            "features.tsv",
            "features.tsv.gz",
            "genes.tsv",
            "genes.tsv.gz",
        ],
    )
    .ok_or_else(|| {
        InputError::MissingInput(format!(
            "missing features.tsv(.gz) or genes.tsv in {}",
            dir.display()
        ))
    })?;
    let barcodes =
        first_existing(dir, &["barcodes.tsv", "barcodes.tsv.gz"]).ok_or_else(|| {
            InputError::MissingInput(format!(
                "missing barcodes.tsv or barcodes.tsv.gz in {}",
                dir.display()
            ))
        })?;
    Ok(TenxPaths {
        mtx,
        features,
        barcodes,
    })
}

fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names.iter().map(|n| dir.join(n)).find(|p| p.exists())
}

pub fn parse_barcodes(path: &Path) -> Result<Vec<String>, InputError> {
    let mut lines = TsvLines::open(path)?;
    let mut barcodes = Vec::new();
    while let Some(cols) = lines.next_fields()? {
        barcodes.push(cols[0].clone());
    }

    if barcodes.is_empty() {
        return Err(InputError::Parse(format!(
            "barcodes file {} is empty",
            path.display()
        )));
    }

    Ok(barcodes)
}
