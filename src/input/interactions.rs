use std::collections::BTreeSet;
use std::path::Path;

use crate::input::InputError;
use crate::input::features::normalize_symbol;
use crate::input::reader::{TsvTable, field};
use crate::model::interaction::InteractionDef;

/// Reads the ligand-receptor reference table (`Ligand`, `Receptor`,
/// `Merged`). Missing columns are fatal; rows with an empty gene are skipped.
pub fn load_interactions(path: &Path) -> Result<Vec<InteractionDef>, InputError> {
    let table = TsvTable::read(path)?;
    let ligand_col = table.require_column(&["Ligand"], path)?;
    let receptor_col = table.require_column(&["Receptor"], path)?;
    let merged_col = table.require_column(&["Merged"], path)?;

    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(table.rows.len());
    for (idx, row) in table.rows.iter().enumerate() {
        let ligand = normalize_symbol(field(row, ligand_col));
        let receptor = normalize_symbol(field(row, receptor_col));
        if ligand.is_empty() || receptor.is_empty() {
            tracing::warn!(line = idx + 2, "interaction row without ligand or receptor; skipping");
            continue;
        }
        let merged = field(row, merged_col);
        let name = if merged.is_empty() {
            format!("{}_{}", ligand, receptor)
        } else {
            merged.to_string()
        };
        if !seen.insert(name.clone()) {
            tracing::warn!(line = idx + 2, interaction = %name, "duplicate interaction; keeping first");
            continue;
        }
        out.push(InteractionDef {
            id: out.len(),
            name,
            ligand,
            receptor,
        });
    }

    if out.is_empty() {
        return Err(InputError::InvalidInput(format!(
            "interaction table {} has no usable rows",
            path.display()
        )));
    }
    Ok(out)
}
