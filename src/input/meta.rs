use std::collections::HashMap;
use std::path::Path;

use crate::input::InputError;
use crate::input::reader::{TsvTable, field};

const MISSING_LABELS: &[&str] = &["", "NA", "NaN", "nan", "null", "None"];

/// Per-cell cluster labels aligned with `barcodes`. Cells absent from the
/// metadata, or carrying an NA-like value, get no label.
pub fn load_cluster_labels(
    path: &Path,
    barcodes: &[String],
    cluster_field: &str,
) -> Result<Vec<Option<String>>, InputError> {
    let table = TsvTable::read(path)?;

    let barcode_col = table.column(&["barcode", "barcodes", "cell", "cell_id"]).unwrap_or(0);
    let cluster_col = table.column(&[cluster_field]).ok_or_else(|| {
        InputError::InvalidInput(format!(
            "metadata {} has no cluster column '{}'",
            path.display(),
            cluster_field
        ))
    })?;
    if cluster_col == barcode_col {
        return Err(InputError::InvalidInput(format!(
            "cluster column '{}' is the barcode column in {}",
            cluster_field,
            path.display()
        )));
    }

    let mut by_barcode: HashMap<&str, &str> = HashMap::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        let barcode = field(row, barcode_col);
        if barcode.is_empty() {
            tracing::warn!(line = idx + 2, "metadata line has empty barcode; skipping");
            continue;
        }
        if by_barcode.contains_key(barcode) {
            tracing::warn!(
                line = idx + 2,
                barcode,
                "duplicate barcode in metadata; keeping first"
            );
            continue;
        }
        by_barcode.insert(barcode, field(row, cluster_col));
    }

    let mut unmatched = 0usize;
    let labels: Vec<Option<String>> = barcodes
        .iter()
        .map(|bc| match by_barcode.get(bc.as_str()) {
            Some(label) if !MISSING_LABELS.contains(label) => Some(label.to_string()),
            Some(_) => None,
            None => {
                unmatched += 1;
                None
            }
        })
        .collect();

    if unmatched > 0 {
        tracing::warn!(
            path = %path.display(),
            unmatched,
            "barcodes without a metadata row are left unlabelled"
        );
    }

    Ok(labels)
}
