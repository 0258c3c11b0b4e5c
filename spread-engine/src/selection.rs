use crate::{
    error::EngineError,
    model::{Pair, PairId, SeriesKey, Side},
};
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::debug;

/// A user-chosen `(pair, side)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEntry {
    pub pair: Pair,
    pub side: Side,
}

impl SelectionEntry {
    pub fn new(pair: Pair, side: Side) -> Self {
        Self { pair, side }
    }

    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.pair.id.clone(), self.side)
    }

    /// Chart label, eg/ "BTC-ETH (buy)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.pair.name, self.side)
    }
}

/// Ordered set of [`SelectionEntry`]s keyed by `(pair_id, side)`.
///
/// Insertion order defines display and series order. While locked (live mode) every toggle
/// is rejected.
#[derive(Debug, Clone, Default)]
pub struct PairSelectionStore {
    entries: IndexMap<SeriesKey, SelectionEntry>,
    locked: bool,
}

impl PairSelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or remove the `(pair, side)` entry.
    ///
    /// Returns whether the selection changed. Inserting a present key or removing an absent
    /// key is a no-op.
    pub fn toggle(&mut self, pair: &Pair, side: Side, selected: bool) -> Result<bool, EngineError> {
        if self.locked {
            return Err(EngineError::LiveModeLocked);
        }

        let key = SeriesKey::new(pair.id.clone(), side);
        let changed = if selected {
            if self.entries.contains_key(&key) {
                false
            } else {
                self.entries
                    .insert(key.clone(), SelectionEntry::new(pair.clone(), side));
                true
            }
        } else {
            // shift_remove keeps the relative order of the remaining entries
            self.entries.shift_remove(&key).is_some()
        };

        debug!(%key, selected, changed, len = self.entries.len(), "selection toggled");
        Ok(changed)
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &SeriesKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&SelectionEntry> {
        self.entries.get(key)
    }

    /// Insertion position of the provided key.
    pub fn position(&self, key: &SeriesKey) -> Option<usize> {
        self.entries.get_index_of(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectionEntry> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.entries.keys()
    }

    /// Entries referring to the provided pair (at most one per [`Side`]).
    pub fn entries_for_pair<'a>(
        &'a self,
        pair_id: &'a PairId,
    ) -> impl Iterator<Item = &'a SelectionEntry> + 'a {
        self.entries
            .values()
            .filter(move |entry| &entry.pair.id == pair_id)
    }

    /// Distinct pair identifiers in selection order.
    pub fn pair_ids(&self) -> Vec<PairId> {
        self.entries
            .keys()
            .map(|key| key.pair_id.clone())
            .unique()
            .collect()
    }
}
