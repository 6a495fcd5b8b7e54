// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::editor::PartialUpdate;
use crate::facets::FacetVocabulary;
use crate::model::Entity;
use crate::source::{ListingRequest, Page};

/// One bulk mutation over a set of wire ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BulkStep {
    #[serde(rename_all = "camelCase")]
    Delete { id_list: Vec<i64> },
    #[serde(rename_all = "camelCase")]
    Patch {
        id_list: Vec<i64>,
        properties: Map<String, Value>,
    },
}

impl BulkStep {
    pub fn id_list(&self) -> &[i64] {
        match self {
            Self::Delete { id_list } | Self::Patch { id_list, .. } => id_list,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "delete",
            Self::Patch { .. } => "patch",
        }
    }
}

/// The remote collaborators of one list page.
pub trait TableBackend<T: Entity> {
    fn list(&mut self, request: &ListingRequest) -> Result<Page<T>>;
    fn facet_vocabulary(&mut self) -> Result<FacetVocabulary>;
    /// Stores one field. Backends that answer with an empty body return `None`.
    fn update(&mut self, update: &PartialUpdate) -> Result<Option<T>>;
    fn bulk_delete(&mut self, id_list: &[i64]) -> Result<()>;
    fn bulk_patch(&mut self, id_list: &[i64], properties: &Map<String, Value>) -> Result<()>;

    fn bulk(&mut self, step: &BulkStep) -> Result<()> {
        match step {
            BulkStep::Delete { id_list } => self.bulk_delete(id_list),
            BulkStep::Patch {
                id_list,
                properties,
            } => self.bulk_patch(id_list, properties),
        }
    }
}

impl<T: Entity, B: TableBackend<T> + ?Sized> TableBackend<T> for &mut B {
    fn list(&mut self, request: &ListingRequest) -> Result<Page<T>> {
        (**self).list(request)
    }

    fn facet_vocabulary(&mut self) -> Result<FacetVocabulary> {
        (**self).facet_vocabulary()
    }

    fn update(&mut self, update: &PartialUpdate) -> Result<Option<T>> {
        (**self).update(update)
    }

    fn bulk_delete(&mut self, id_list: &[i64]) -> Result<()> {
        (**self).bulk_delete(id_list)
    }

    fn bulk_patch(&mut self, id_list: &[i64], properties: &Map<String, Value>) -> Result<()> {
        (**self).bulk_patch(id_list, properties)
    }
}
