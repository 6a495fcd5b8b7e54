// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::query::QueryState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetOption {
    pub value: String,
    pub label: String,
}

impl FacetOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Wire shape of the vocabulary endpoint: facet key to its ordered options.
pub type FacetVocabulary = BTreeMap<String, Vec<FacetOption>>;

/// Static description of one filterable dimension of a list page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetSpec {
    pub key: String,
    pub label: String,
}

impl FacetSpec {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterFacet {
    pub key: String,
    pub label: String,
    pub options: Vec<FacetOption>,
}

impl FilterFacet {
    pub fn option(&self, value: &str) -> Option<&FacetOption> {
        self.options.iter().find(|option| option.value == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFilterOption {
    pub facet_key: String,
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetRegistry {
    facets: Vec<FilterFacet>,
}

impl FacetRegistry {
    /// Builds the registry from a vocabulary fetch. A failed fetch yields an
    /// empty registry: the page keeps working, just without filters.
    pub fn from_vocabulary(specs: &[FacetSpec], vocabulary: Result<FacetVocabulary>) -> Self {
        let mut vocabulary = match vocabulary {
            Ok(vocabulary) => vocabulary,
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "facet vocabulary unavailable");
                return Self::default();
            }
        };

        let facets = specs
            .iter()
            .map(|spec| FilterFacet {
                key: spec.key.clone(),
                label: spec.label.clone(),
                options: vocabulary.remove(&spec.key).unwrap_or_default(),
            })
            .collect();
        Self { facets }
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    pub fn facets(&self) -> &[FilterFacet] {
        &self.facets
    }

    pub fn facet(&self, key: &str) -> Option<&FilterFacet> {
        self.facets.iter().find(|facet| facet.key == key)
    }

    pub fn project_selected(&self, state: &QueryState) -> Vec<SelectedFilterOption> {
        state
            .selections
            .iter()
            .filter_map(|selection| {
                let facet = self.facet(&selection.facet_key)?;
                let label = facet
                    .option(&selection.value)
                    .map(|option| option.label.clone())
                    .unwrap_or_else(|| selection.value.clone());
                Some(SelectedFilterOption {
                    facet_key: facet.key.clone(),
                    value: selection.value.clone(),
                    label,
                })
            })
            .collect()
    }

    pub fn project_available(&self, state: &QueryState) -> Vec<FilterFacet> {
        self.facets
            .iter()
            .map(|facet| FilterFacet {
                key: facet.key.clone(),
                label: facet.label.clone(),
                options: facet
                    .options
                    .iter()
                    .filter(|option| !state.is_selected(&facet.key, &option.value))
                    .cloned()
                    .collect(),
            })
            .collect()
    }
}
