// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::fields::{partial_update_body, read_field};
use crate::ids::{RequestId, RequestIdGen};
use crate::model::Entity;

/// How a cell's control signals that an edit is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlClass {
    /// Text and number inputs: commit on blur.
    FreeText,
    /// Selects and date pickers: commit on every value change.
    Enumerated,
}

impl ControlClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeText => "free_text",
            Self::Enumerated => "enumerated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditableField {
    pub path: String,
    pub control: ControlClass,
}

impl EditableField {
    pub fn free_text(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            control: ControlClass::FreeText,
        }
    }

    pub fn enumerated(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            control: ControlClass::Enumerated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellPhase {
    Idle,
    Editing,
    Committing,
    Reverting,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellKey<Id> {
    pub row_id: Id,
    pub field_path: String,
}

impl<Id> CellKey<Id> {
    pub fn new(row_id: Id, field_path: impl Into<String>) -> Self {
        Self {
            row_id,
            field_path: field_path.into(),
        }
    }
}

/// The cell currently open for editing.
#[derive(Debug, Clone, PartialEq)]
pub struct EditableCell<Id> {
    pub key: CellKey<Id>,
    pub control: ControlClass,
    pub pending_value: Value,
    pub committed_value: Value,
}

impl<Id> EditableCell<Id> {
    pub fn is_dirty(&self) -> bool {
        self.pending_value != self.committed_value
    }
}

/// Partial update sent to the backend for one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialUpdate {
    pub id: i64,
    pub field_path: String,
    pub value: Value,
}

impl PartialUpdate {
    pub fn body(&self) -> Result<Value> {
        partial_update_body(self.id, &self.field_path, &self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistTicket<Id> {
    pub request_id: RequestId,
    pub key: CellKey<Id>,
    pub update: PartialUpdate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersistOutcome<T> {
    /// The backend accepted `value` and may have returned the stored row.
    Confirmed { row: Option<T>, value: Value },
    /// A later edit of the same cell owns the result now.
    Superseded,
    Failed(String),
}

/// What a gesture asks the owner to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum EditSignal<Id> {
    None,
    Commit { key: CellKey<Id>, value: Value },
}

#[derive(Debug, Clone, PartialEq)]
struct PendingWrite {
    request_id: RequestId,
    value: Value,
}

#[derive(Debug)]
pub struct InlineCellEditor<T: Entity> {
    fields: Vec<EditableField>,
    active: Option<EditableCell<T::Id>>,
    pending: BTreeMap<CellKey<T::Id>, PendingWrite>,
    reverting: BTreeMap<CellKey<T::Id>, Option<RequestId>>,
}

impl<T: Entity> InlineCellEditor<T> {
    pub fn new(fields: Vec<EditableField>) -> Self {
        Self {
            fields,
            active: None,
            pending: BTreeMap::new(),
            reverting: BTreeMap::new(),
        }
    }

    pub fn fields(&self) -> &[EditableField] {
        &self.fields
    }

    pub fn field(&self, path: &str) -> Option<&EditableField> {
        self.fields.iter().find(|field| field.path == path)
    }

    fn editable(&self, path: &str) -> Result<&EditableField> {
        self.field(path)
            .ok_or_else(|| anyhow!("field {path:?} is not editable"))
    }

    pub fn active(&self) -> Option<&EditableCell<T::Id>> {
        self.active.as_ref()
    }

    pub fn phase(&self, row_id: T::Id, field_path: &str) -> CellPhase {
        let key = CellKey::new(row_id, field_path);
        if self.active.as_ref().is_some_and(|cell| cell.key == key) {
            CellPhase::Editing
        } else if self.reverting.contains_key(&key) {
            CellPhase::Reverting
        } else if self.pending.contains_key(&key) {
            CellPhase::Committing
        } else {
            CellPhase::Idle
        }
    }

    /// Opens `field_path` of `row`, seeding both values from the row. Any
    /// other open cell is abandoned without a request.
    pub fn begin_edit(&mut self, row: &T, field_path: &str) -> Result<()> {
        let control = self.editable(field_path)?.control;
        let current = read_field(row, field_path)?;
        self.active = Some(EditableCell {
            key: CellKey::new(row.id(), field_path),
            control,
            pending_value: current.clone(),
            committed_value: current,
        });
        Ok(())
    }

    pub fn input(&mut self, value: Value) -> Result<EditSignal<T::Id>> {
        let Some(cell) = self.active.as_mut() else {
            bail!("no cell is being edited");
        };
        cell.pending_value = value;
        match cell.control {
            ControlClass::FreeText => Ok(EditSignal::None),
            ControlClass::Enumerated if !cell.is_dirty() => Ok(EditSignal::None),
            ControlClass::Enumerated => Ok(EditSignal::Commit {
                key: cell.key.clone(),
                value: cell.pending_value.clone(),
            }),
        }
    }

    /// Focus left the open cell. Free-text cells commit when dirty; a clean
    /// cell or an enumerated one simply closes.
    pub fn blur(&mut self) -> EditSignal<T::Id> {
        let Some(cell) = self.active.take() else {
            return EditSignal::None;
        };
        if cell.control == ControlClass::FreeText && cell.is_dirty() {
            return EditSignal::Commit {
                key: cell.key,
                value: cell.pending_value,
            };
        }
        EditSignal::None
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }

    /// Registers a persist of `value` for the cell and returns the ticket to
    /// send. Earlier requests for the same cell become superseded.
    pub fn commit(
        &mut self,
        row_id: T::Id,
        field_path: &str,
        value: Value,
        ids: &mut RequestIdGen,
    ) -> Result<PersistTicket<T::Id>> {
        self.editable(field_path)?;
        let key = CellKey::new(row_id, field_path);
        if self.active.as_ref().is_some_and(|cell| cell.key == key) {
            self.active = None;
        }

        let update = PartialUpdate {
            id: row_id.into(),
            field_path: field_path.to_owned(),
            value,
        };
        update.body()?;

        let request_id = ids.next_id();
        let write = PendingWrite {
            request_id,
            value: update.value.clone(),
        };
        if let Some(previous) = self.pending.insert(key.clone(), write) {
            tracing::debug!(
                superseded = previous.request_id.get(),
                request_id = request_id.get(),
                field = field_path,
                "cell edit superseded"
            );
        }
        self.reverting.remove(&key);
        Ok(PersistTicket {
            request_id,
            key,
            update,
        })
    }

    pub fn resolve(
        &mut self,
        request_id: RequestId,
        key: &CellKey<T::Id>,
        result: Result<Option<T>>,
    ) -> PersistOutcome<T> {
        if self.pending.get(key).map(|write| write.request_id) != Some(request_id) {
            tracing::debug!(
                request_id = request_id.get(),
                field = key.field_path.as_str(),
                "superseded cell response ignored"
            );
            return PersistOutcome::Superseded;
        }
        let Some(write) = self.pending.remove(key) else {
            return PersistOutcome::Superseded;
        };

        match result {
            Ok(row) => PersistOutcome::Confirmed {
                row,
                value: write.value,
            },
            Err(error) => {
                let message = format!("{error:#}");
                tracing::warn!(
                    request_id = request_id.get(),
                    field = key.field_path.as_str(),
                    error = %message,
                    "cell persist failed"
                );
                self.reverting.insert(key.clone(), None);
                PersistOutcome::Failed(message)
            }
        }
    }

    /// Ties every reverting cell without a refetch to `refetch`; `None` means
    /// no refetch could be issued and the cells settle immediately.
    pub fn await_reconciliation(&mut self, refetch: Option<RequestId>) {
        match refetch {
            Some(request_id) => {
                for waiting in self.reverting.values_mut() {
                    waiting.get_or_insert(request_id);
                }
            }
            None => self.reverting.retain(|_, waiting| waiting.is_some()),
        }
    }

    /// A page fetch finished; cells waiting on it return to idle.
    pub fn reconciled(&mut self, page_request: RequestId) {
        self.reverting
            .retain(|_, waiting| *waiting != Some(page_request));
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Values committed locally whose persist has not answered yet. A row
    /// arriving from the backend in the meantime still lacks them.
    pub fn pending_writes(&self) -> impl Iterator<Item = (&CellKey<T::Id>, &Value)> {
        self.pending.iter().map(|(key, write)| (key, &write.value))
    }
}
