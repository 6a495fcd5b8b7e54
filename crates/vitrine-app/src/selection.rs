// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use crate::model::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub checked: bool,
    pub indeterminate: bool,
}

/// Chosen rows keyed by id, holding full snapshots so bulk actions see
/// complete records even after the rows scroll off the current page.
///
/// Every operation returns a new set; the receiver is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSet<T: Entity> {
    rows: BTreeMap<T::Id, T>,
}

impl<T: Entity> Default for SelectionSet<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Entity> SelectionSet<T> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn ids(&self) -> Vec<T::Id> {
        self.rows.keys().copied().collect()
    }

    pub fn wire_ids(&self) -> Vec<i64> {
        self.rows.keys().map(|id| (*id).into()).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    #[must_use]
    pub fn toggled_row(&self, row: &T) -> Self {
        let mut rows = self.rows.clone();
        if rows.remove(&row.id()).is_none() {
            rows.insert(row.id(), row.clone());
        }
        Self { rows }
    }

    /// If any visible row is selected, deselects exactly the visible rows;
    /// otherwise selects them all. Partial selections therefore clear in one click.
    #[must_use]
    pub fn toggled_all_visible(&self, visible: &[T]) -> Self {
        let mut rows = self.rows.clone();
        if visible.iter().any(|row| rows.contains_key(&row.id())) {
            for row in visible {
                rows.remove(&row.id());
            }
        } else {
            for row in visible {
                rows.insert(row.id(), row.clone());
            }
        }
        Self { rows }
    }

    #[must_use]
    pub fn cleared(&self) -> Self {
        Self::default()
    }

    /// Replaces the snapshot of every selected row that appears in `rows`.
    #[must_use]
    pub fn refreshed(&self, rows: &[T]) -> Self {
        let mut next = self.rows.clone();
        for row in rows {
            if let Some(entry) = next.get_mut(&row.id()) {
                *entry = row.clone();
            }
        }
        Self { rows: next }
    }

    pub fn control_state(&self, total_count: usize) -> ControlState {
        let selected = self.rows.len();
        let checked = total_count > 0 && selected == total_count;
        ControlState {
            checked,
            indeterminate: selected > 0 && !checked,
        }
    }
}
