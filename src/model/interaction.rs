use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionDef {
    pub id: usize,
    pub name: String,
    pub ligand: String,
    pub receptor: String,
}

/// (ligand-expressing cluster, receptor-expressing cluster), as indices into
/// the run's [`ClusterUniverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterPair {
    pub ligand: u32,
    pub receptor: u32,
}

impl ClusterPair {
    pub fn new(ligand: u32, receptor: u32) -> Self {
        Self { ligand, receptor }
    }

    pub fn is_self_pair(&self) -> bool {
        self.ligand == self.receptor
    }
}

/// Sorted union of the cluster labels seen across all samples.
#[derive(Debug, Clone, Default)]
pub struct ClusterUniverse {
    names: Vec<String>,
    index: BTreeMap<String, u32>,
}

impl ClusterUniverse {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut index = BTreeMap::new();
        for label in labels {
            index.entry(label.to_string()).or_insert(0u32);
        }
        let names: Vec<String> = index.keys().cloned().collect();
        for (i, name) in names.iter().enumerate() {
            index.insert(name.clone(), i as u32);
        }
        Self { names, index }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn id(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: u32) -> &str {
        &self.names[id as usize]
    }

    /// Every ordered pair, self-pairs included, in (ligand, receptor) order.
    pub fn all_pairs(&self) -> Vec<ClusterPair> {
        let n = self.names.len() as u32;
        let mut out = Vec::with_capacity((n * n) as usize);
        for l in 0..n {
            for r in 0..n {
                out.push(ClusterPair::new(l, r));
            }
        }
        out
    }

    pub fn pair_label(&self, pair: ClusterPair) -> String {
        format!("{}|{}", self.name(pair.ligand), self.name(pair.receptor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleStatus {
    Malignant,
    NonMalignant,
}

impl SampleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleStatus::Malignant => "malignant",
            SampleStatus::NonMalignant => "non-malignant",
        }
    }
}
