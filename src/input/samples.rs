use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::input::InputError;
use crate::input::reader::{TsvTable, field};
use crate::model::interaction::SampleStatus;

#[derive(Debug, Clone)]
pub struct SampleEntry {
    pub sample_id: String,
    pub dir: PathBuf,
    pub meta_path: PathBuf,
}

/// Sample sheet: `sample`, `path` and an optional `meta` column. Relative
/// paths resolve against the directory holding the sheet.
pub fn load_sample_sheet(path: &Path) -> Result<Vec<SampleEntry>, InputError> {
    let table = TsvTable::read(path)?;
    let sample_col = table.require_column(&["sample", "sample_id"], path)?;
    let path_col = table.require_column(&["path", "dir"], path)?;
    let meta_col = table.column(&["meta", "metadata"]);
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        let sample_id = field(row, sample_col).to_string();
        let dir_raw = field(row, path_col);
        if sample_id.is_empty() || dir_raw.is_empty() {
            return Err(InputError::Parse(format!(
                "sample sheet line {} needs both sample and path",
                idx + 2
            )));
        }
        if !seen.insert(sample_id.clone()) {
            return Err(InputError::InvalidInput(format!(
                "duplicate sample '{}' in sample sheet",
                sample_id
            )));
        }
        let dir = resolve(base, dir_raw);
        let meta_path = match meta_col.map(|c| field(row, c)) {
            Some(m) if !m.is_empty() => resolve(base, m),
            _ => dir.join("meta.tsv"),
        };
        out.push(SampleEntry {
            sample_id,
            dir,
            meta_path,
        });
    }

    if out.is_empty() {
        return Err(InputError::MissingInput(format!(
            "sample sheet {} lists no samples",
            path.display()
        )));
    }
    Ok(out)
}

fn resolve(base: &Path, raw: &str) -> PathBuf {
    let p = PathBuf::from(raw);
    if p.is_absolute() { p } else { base.join(p) }
}

pub fn parse_status(raw: &str) -> Option<SampleStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "malignant" | "tumor" | "tumour" | "true" | "1" => Some(SampleStatus::Malignant),
        "non-malignant" | "nonmalignant" | "non_malignant" | "normal" | "false" | "0" => {
            Some(SampleStatus::NonMalignant)
        }
        _ => None,
    }
}

pub fn load_status_table(path: &Path) -> Result<BTreeMap<String, SampleStatus>, InputError> {
    let table = TsvTable::read(path)?;
    let sample_col = table.require_column(&["sample", "sample_id"], path)?;
    let status_col = table.require_column(&["status", "malignant", "malignancy"], path)?;

    let mut out = BTreeMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let sample = field(row, sample_col);
        let raw = field(row, status_col);
        let status = parse_status(raw).ok_or_else(|| {
            InputError::Parse(format!(
                "status table line {}: unrecognized status '{}'",
                idx + 2,
                raw
            ))
        })?;
        if out.insert(sample.to_string(), status).is_some() {
            return Err(InputError::InvalidInput(format!(
                "duplicate sample '{}' in status table",
                sample
            )));
        }
    }
    Ok(out)
}

/// Aligns status labels with the computed samples. Any naming mismatch in
/// either direction aborts the run.
pub fn assign_status(
    samples: &[String],
    table: &BTreeMap<String, SampleStatus>,
) -> Result<Vec<SampleStatus>, InputError> {
    let known: BTreeSet<&str> = samples.iter().map(|s| s.as_str()).collect();
    let unknown: Vec<&str> = table
        .keys()
        .map(|s| s.as_str())
        .filter(|s| !known.contains(s))
        .collect();
    if !unknown.is_empty() {
        return Err(InputError::InvalidInput(format!(
            "status table names samples not in the sample sheet: {}",
            unknown.join(", ")
        )));
    }

    let mut out = Vec::with_capacity(samples.len());
    let mut missing = Vec::new();
    for sample in samples {
        match table.get(sample) {
            Some(status) => out.push(*status),
            None => missing.push(sample.as_str()),
        }
    }
    if !missing.is_empty() {
        return Err(InputError::InvalidInput(format!(
            "samples without a malignancy status: {}",
            missing.join(", ")
        )));
    }
    Ok(out)
}
