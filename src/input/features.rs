use std::path::Path;

use crate::input::InputError;
use crate::input::reader::TsvLines;

#[derive(Debug, Clone)]
pub struct Feature {
    pub id: String,
    pub symbol_raw: String,
    pub symbol_norm: String,
}

pub fn parse_features(path: &Path) -> Result<Vec<Feature>, InputError> {
    let mut lines = TsvLines::open(path)?;
    let mut features = Vec::new();
    let mut skipped_non_gene = 0usize;

    while let Some(cols) = lines.next_fields()? {
        if cols.len() < 2 {
            return Err(InputError::Parse(format!(
                "features line {} has <2 columns",
                lines.line_no()
            )));
        }
        // Antibody capture / CRISPR rows keep their slot in the matrix but
        // must never be looked up as genes.
        let symbol_norm = match cols.get(2).map(|t| t.as_str()) {
            Some(t) if !t.eq_ignore_ascii_case("Gene Expression") => {
                skipped_non_gene += 1;
                String::new()
            }
            _ => normalize_symbol(&cols[1]),
        };
        features.push(Feature {
            id: cols[0].clone(),
            symbol_raw: cols[1].clone(),
            symbol_norm,
        });
    }

    if features.is_empty() {
        return Err(InputError::Parse(format!(
            "features file {} is empty",
            path.display()
        )));
    }
    if skipped_non_gene > 0 {
        tracing::debug!(
            path = %path.display(),
            skipped_non_gene,
            "ignoring non gene-expression features"
        );
    }

    Ok(features)
}

/// Canonical gene symbol used for every lookup: trimmed, upper-case, with
/// Ensembl version suffixes removed.
pub fn normalize_symbol(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let upper = trimmed.to_ascii_uppercase();
    if let Some((left, right)) = upper.rsplit_once('.') {
        if left.starts_with("ENS") && right.chars().all(|c| c.is_ascii_digit()) {
            return left.to_string();
        }
    }
    upper
}
