use std::collections::BTreeMap;
use std::collections::btree_map;
use std::ops::RangeInclusive;

use thiserror::Error;

use crate::model::interaction::ClusterPair;

/// Key of every score the pipeline produces. Observed scores carry no
/// replicate; null scores carry replicates `1..=R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    pub interaction: usize,
    pub sample: usize,
    pub pair: ClusterPair,
    pub replicate: Option<u32>,
}

impl StoreKey {
    pub fn observed(interaction: usize, sample: usize, pair: ClusterPair) -> Self {
        Self {
            interaction,
            sample,
            pair,
            replicate: None,
        }
    }

    pub fn null(interaction: usize, sample: usize, pair: ClusterPair, replicate: u32) -> Self {
        Self {
            interaction,
            sample,
            pair,
            replicate: Some(replicate),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate result for interaction {interaction}, sample {sample}, pair ({ligand},{receptor}), replicate {replicate:?}")]
    Duplicate {
        interaction: usize,
        sample: usize,
        ligand: u32,
        receptor: u32,
        replicate: Option<u32>,
    },
}

/// Append-only results store. Values are never overwritten, so the order in
/// which parallel units finish cannot change what a key maps to.
#[derive(Debug, Clone)]
pub struct ResultStore<T> {
    entries: BTreeMap<StoreKey, T>,
}

impl<T> Default for ResultStore<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> ResultStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, key: StoreKey, value: T) -> Result<(), StoreError> {
        match self.entries.entry(key) {
            btree_map::Entry::Occupied(_) => Err(StoreError::Duplicate {
                interaction: key.interaction,
                sample: key.sample,
                ligand: key.pair.ligand,
                receptor: key.pair.receptor,
                replicate: key.replicate,
            }),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    pub fn extend(
        &mut self,
        items: impl IntoIterator<Item = (StoreKey, T)>,
    ) -> Result<(), StoreError> {
        for (key, value) in items {
            self.append(key, value)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &StoreKey) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StoreKey, &T)> {
        self.entries.iter()
    }

    /// Everything stored for one (interaction, sample), ordered by pair and
    /// then replicate.
    pub fn unit(&self, interaction: usize, sample: usize) -> btree_map::Range<'_, StoreKey, T> {
        self.entries.range(unit_bounds(interaction, sample))
    }

    /// Every replicate stored for one (interaction, sample, pair).
    pub fn replicates(
        &self,
        interaction: usize,
        sample: usize,
        pair: ClusterPair,
    ) -> btree_map::Range<'_, StoreKey, T> {
        let lo = StoreKey::null(interaction, sample, pair, 0);
        let hi = StoreKey::null(interaction, sample, pair, u32::MAX);
        self.entries.range(lo..=hi)
    }
}

fn unit_bounds(interaction: usize, sample: usize) -> RangeInclusive<StoreKey> {
    let lo = StoreKey::observed(interaction, sample, ClusterPair::new(0, 0));
    let hi = StoreKey::null(
        interaction,
        sample,
        ClusterPair::new(u32::MAX, u32::MAX),
        u32::MAX,
    );
    lo..=hi
}
