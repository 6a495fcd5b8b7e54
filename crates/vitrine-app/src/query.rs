// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;
use url::form_urlencoded;

pub const KEYWORD_KEY: &str = "keyword";
pub const PAGE_INDEX_KEY: &str = "pageIndex";
pub const PAGE_SIZE_KEY: &str = "pageSize";
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// One `(facetKey, value)` pair as it travels through the URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilterSelection {
    pub facet_key: String,
    pub value: String,
}

impl FilterSelection {
    pub fn new(facet_key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            facet_key: facet_key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub keyword: Option<String>,
    pub selections: Vec<FilterSelection>,
    pub page_index: usize,
    pub page_size: usize,
    /// URL pairs owned by someone else; carried through every rewrite untouched.
    pub passthrough: Vec<(String, String)>,
}

impl QueryState {
    pub fn new(page_size: usize) -> Self {
        Self {
            keyword: None,
            selections: Vec::new(),
            page_index: 0,
            page_size,
            passthrough: Vec::new(),
        }
    }

    pub fn offset(&self) -> usize {
        self.page_index.saturating_mul(self.page_size)
    }

    pub fn is_selected(&self, facet_key: &str, value: &str) -> bool {
        self.selections
            .iter()
            .any(|selection| selection.facet_key == facet_key && selection.value == value)
    }

    pub fn values_for<'a>(&'a self, facet_key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.selections
            .iter()
            .filter(move |selection| selection.facet_key == facet_key)
            .map(|selection| selection.value.as_str())
    }
}

/// How a navigation should touch the browser history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Push,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub location: String,
    pub history: HistoryMode,
}

/// Maps [`QueryState`] to and from the query string of a list page.
///
/// Every mutator returns `None` when the state would not change, so callers
/// never emit a navigation that only duplicates the current URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStateCodec {
    facet_keys: BTreeSet<String>,
    default_page_size: usize,
    history: HistoryMode,
}

impl QueryStateCodec {
    pub fn new<I, S>(facet_keys: I, default_page_size: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            facet_keys: facet_keys.into_iter().map(Into::into).collect(),
            default_page_size: default_page_size.max(1),
            history: HistoryMode::Replace,
        }
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    pub fn is_facet_key(&self, key: &str) -> bool {
        self.facet_keys.contains(key)
    }

    pub fn empty_state(&self) -> QueryState {
        QueryState::new(self.default_page_size)
    }

    pub fn parse(&self, query: &str) -> QueryState {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut state = self.empty_state();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                KEYWORD_KEY => {
                    let trimmed = value.trim();
                    state.keyword = (!trimmed.is_empty()).then(|| trimmed.to_owned());
                }
                PAGE_INDEX_KEY => {
                    state.page_index = value.trim().parse().unwrap_or(0);
                }
                PAGE_SIZE_KEY => {
                    state.page_size = value
                        .trim()
                        .parse()
                        .ok()
                        .filter(|size: &usize| *size > 0)
                        .unwrap_or(self.default_page_size);
                }
                facet if self.facet_keys.contains(facet) => {
                    if !state.is_selected(facet, &value) {
                        state
                            .selections
                            .push(FilterSelection::new(facet, value.into_owned()));
                    }
                }
                _ => state.passthrough.push((key.to_string(), value.into_owned())),
            }
        }

        state
    }

    pub fn serialize(&self, state: &QueryState) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &state.passthrough {
            out.append_pair(key, value);
        }
        if let Some(keyword) = state.keyword.as_deref()
            && !keyword.trim().is_empty()
        {
            out.append_pair(KEYWORD_KEY, keyword);
        }
        for selection in &state.selections {
            out.append_pair(&selection.facet_key, &selection.value);
        }
        if state.page_index != 0 {
            out.append_pair(PAGE_INDEX_KEY, &state.page_index.to_string());
        }
        if state.page_size != self.default_page_size {
            out.append_pair(PAGE_SIZE_KEY, &state.page_size.to_string());
        }
        out.finish()
    }

    pub fn navigation(&self, state: &QueryState) -> Navigation {
        Navigation {
            location: self.serialize(state),
            history: self.history,
        }
    }

    pub fn add_filter_option(
        &self,
        state: &QueryState,
        facet_key: &str,
        value: &str,
    ) -> Option<QueryState> {
        if state.is_selected(facet_key, value) {
            return None;
        }
        let mut next = state.clone();
        next.selections.push(FilterSelection::new(facet_key, value));
        next.page_index = 0;
        Some(next)
    }

    pub fn remove_filter_option(
        &self,
        state: &QueryState,
        facet_key: &str,
        value: &str,
    ) -> Option<QueryState> {
        if !state.is_selected(facet_key, value) {
            return None;
        }
        let mut next = state.clone();
        next.selections
            .retain(|selection| !(selection.facet_key == facet_key && selection.value == value));
        next.page_index = 0;
        Some(next)
    }

    pub fn clear_filters(&self, state: &QueryState) -> Option<QueryState> {
        if state.selections.is_empty() {
            return None;
        }
        let mut next = state.clone();
        next.selections.clear();
        next.page_index = 0;
        Some(next)
    }

    pub fn set_keyword(&self, state: &QueryState, raw: &str) -> Option<QueryState> {
        let trimmed = raw.trim();
        let keyword = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        if keyword == state.keyword {
            return None;
        }
        let mut next = state.clone();
        next.keyword = keyword;
        next.page_index = 0;
        Some(next)
    }

    pub fn set_page(&self, state: &QueryState, page_index: usize) -> Option<QueryState> {
        if page_index == state.page_index {
            return None;
        }
        let mut next = state.clone();
        next.page_index = page_index;
        Some(next)
    }

    pub fn set_page_size(&self, state: &QueryState, page_size: usize) -> Option<QueryState> {
        if page_size == 0 || page_size == state.page_size {
            return None;
        }
        let mut next = state.clone();
        next.page_size = page_size;
        next.page_index = 0;
        Some(next)
    }
}
