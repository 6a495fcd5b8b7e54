// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use crate::fields::with_field;
use crate::ids::{RequestId, RequestIdGen};
use crate::model::Entity;
use crate::query::{FilterSelection, QueryState};

pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// One structured filter: the row's `field` must equal any of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriterion {
    pub field: String,
    pub values: Vec<String>,
}

/// A predicate every request of a list page carries, such as a lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPredicate {
    pub field: String,
    pub values: Vec<String>,
}

impl FixedPredicate {
    pub fn new<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterCriterion>,
    pub offset: usize,
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_predicate: Option<FixedPredicate>,
}

impl ListingRequest {
    pub fn from_query(state: &QueryState, fixed: Option<&FixedPredicate>) -> Self {
        Self {
            keyword: state.keyword.clone(),
            filters: group_filters(&state.selections),
            offset: state.offset(),
            limit: state.page_size,
            fixed_predicate: fixed.cloned(),
        }
    }

    /// Canonical form used as the cache key. Filter groups and their values
    /// are sorted so that selection order does not split the cache.
    pub fn cache_key(&self) -> String {
        let mut canonical = self.clone();
        canonical.filters.sort_by(|left, right| left.field.cmp(&right.field));
        for criterion in &mut canonical.filters {
            criterion.values.sort();
        }
        serde_json::to_string(&canonical).unwrap_or_else(|_| format!("{canonical:?}"))
    }
}

fn group_filters(selections: &[FilterSelection]) -> Vec<FilterCriterion> {
    let mut groups: Vec<FilterCriterion> = Vec::new();
    for selection in selections {
        match groups
            .iter_mut()
            .find(|criterion| criterion.field == selection.facet_key)
        {
            Some(criterion) => criterion.values.push(selection.value.clone()),
            None => groups.push(FilterCriterion {
                field: selection.facet_key.clone(),
                values: vec![selection.value.clone()],
            }),
        }
    }
    groups
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub offset: usize,
    pub take: usize,
}

impl<T> Page<T> {
    pub fn empty(take: usize) -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            offset: 0,
            take,
        }
    }
}

/// The locally held working copy of the displayed page. Optimistic edits land
/// here; the cached page it was cloned from stays untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSnapshot<T: Entity> {
    page: Page<T>,
}

impl<T: Entity> PageSnapshot<T> {
    pub fn new(page: Page<T>) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page<T> {
        &self.page
    }

    pub fn rows(&self) -> &[T] {
        &self.page.items
    }

    pub fn row(&self, id: T::Id) -> Option<&T> {
        self.page.items.iter().find(|row| row.id() == id)
    }

    /// Copy-on-write field edit on the row with `id`. Missing rows are not an
    /// error: the row may have left the page after a refetch.
    pub fn with_field(&self, id: T::Id, path: &str, value: &Value) -> Result<Option<Self>> {
        let Some(index) = self.page.items.iter().position(|row| row.id() == id) else {
            return Ok(None);
        };
        let updated = with_field(&self.page.items[index], path, value)?;
        let mut page = self.page.clone();
        page.items[index] = updated;
        Ok(Some(Self { page }))
    }

    pub fn with_row(&self, row: &T) -> Option<Self> {
        let index = self
            .page
            .items
            .iter()
            .position(|existing| existing.id() == row.id())?;
        let mut page = self.page.clone();
        page.items[index] = row.clone();
        Some(Self { page })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub request_id: RequestId,
    pub key: String,
    pub request: ListingRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Failed,
    Stale,
}

#[derive(Debug, Clone)]
struct CachedPage<T> {
    request_id: RequestId,
    page: Page<T>,
}

#[derive(Debug)]
struct Displayed<T: Entity> {
    key: String,
    request_id: RequestId,
    snapshot: PageSnapshot<T>,
}

/// Fetches pages for query states and decides which results may be shown.
///
/// Results are applied in request-freshness order, not completion order: a
/// response is shown only if it answers the currently wanted key, and never
/// over a page of the same key that came from a later request.
#[derive(Debug)]
pub struct PagedDataSource<T: Entity> {
    fixed: Option<FixedPredicate>,
    cache: LruCache<String, CachedPage<T>>,
    wanted: Option<ListingRequest>,
    wanted_key: Option<String>,
    in_flight: BTreeMap<RequestId, String>,
    displayed: Option<Displayed<T>>,
    error: Option<String>,
}

impl<T: Entity> PagedDataSource<T> {
    pub fn new(fixed: Option<FixedPredicate>, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            fixed,
            cache: LruCache::new(capacity),
            wanted: None,
            wanted_key: None,
            in_flight: BTreeMap::new(),
            displayed: None,
            error: None,
        }
    }

    pub fn fixed_predicate(&self) -> Option<&FixedPredicate> {
        self.fixed.as_ref()
    }

    pub fn request_for(&self, state: &QueryState) -> ListingRequest {
        ListingRequest::from_query(state, self.fixed.as_ref())
    }

    /// Points the source at `state`. Serves from cache when possible and
    /// otherwise returns the fetch to issue; the previous page stays visible
    /// until a fresher result lands. Tickets are drawn from `ids`, which the
    /// owner shares with its other request kinds.
    pub fn query(&mut self, state: &QueryState, ids: &mut RequestIdGen) -> Option<FetchTicket> {
        let request = self.request_for(state);
        let key = request.cache_key();
        self.wanted = Some(request.clone());
        self.wanted_key = Some(key.clone());

        if let Some(cached) = self.cache.get(&key).cloned() {
            tracing::debug!(%key, "page served from cache");
            self.display(key, cached.request_id, cached.page);
            return None;
        }

        if self.in_flight.values().any(|pending| *pending == key) {
            tracing::debug!(%key, "page already in flight");
            return None;
        }

        Some(self.issue(key, request, ids))
    }

    /// Forces a new fetch of the wanted page, bypassing the cache and any
    /// request already in flight for the same key.
    pub fn refresh(&mut self, ids: &mut RequestIdGen) -> Option<FetchTicket> {
        let request = self.wanted.clone()?;
        let key = self.wanted_key.clone()?;
        self.cache.pop(&key);
        Some(self.issue(key, request, ids))
    }

    fn issue(
        &mut self,
        key: String,
        request: ListingRequest,
        ids: &mut RequestIdGen,
    ) -> FetchTicket {
        let request_id = ids.next_id();
        self.in_flight.insert(request_id, key.clone());
        tracing::debug!(request_id = request_id.get(), %key, "page fetch issued");
        FetchTicket {
            request_id,
            key,
            request,
        }
    }

    pub fn resolve(&mut self, request_id: RequestId, result: Result<Page<T>>) -> FetchOutcome {
        let Some(key) = self.in_flight.remove(&request_id) else {
            tracing::debug!(request_id = request_id.get(), "unknown page response dropped");
            return FetchOutcome::Stale;
        };

        let wanted = self.wanted_key.as_deref() == Some(key.as_str());
        let superseded = self
            .displayed
            .as_ref()
            .is_some_and(|shown| shown.key == key && shown.request_id > request_id);
        let fresh = wanted && !superseded;

        let result = result.and_then(|page| {
            if page.items.len() > page.take {
                bail!(
                    "backend returned {} rows for a page of {}",
                    page.items.len(),
                    page.take
                );
            }
            Ok(page)
        });

        match result {
            Ok(page) => {
                let newer_cached = self
                    .cache
                    .peek(&key)
                    .is_some_and(|cached| cached.request_id > request_id);
                if !newer_cached {
                    self.cache.put(
                        key.clone(),
                        CachedPage {
                            request_id,
                            page: page.clone(),
                        },
                    );
                }
                if !fresh {
                    tracing::debug!(request_id = request_id.get(), %key, "stale page ignored");
                    return FetchOutcome::Stale;
                }
                self.display(key, request_id, page);
                FetchOutcome::Applied
            }
            Err(error) => {
                if !fresh {
                    tracing::debug!(request_id = request_id.get(), "stale page failure ignored");
                    return FetchOutcome::Stale;
                }
                let message = format!("{error:#}");
                tracing::warn!(request_id = request_id.get(), error = %message, "page fetch failed");
                self.error = Some(message);
                FetchOutcome::Failed
            }
        }
    }

    fn display(&mut self, key: String, request_id: RequestId, page: Page<T>) {
        self.displayed = Some(Displayed {
            key,
            request_id,
            snapshot: PageSnapshot::new(page),
        });
        self.error = None;
    }

    pub fn snapshot(&self) -> Option<&PageSnapshot<T>> {
        self.displayed.as_ref().map(|displayed| &displayed.snapshot)
    }

    pub fn rows(&self) -> &[T] {
        self.snapshot().map(PageSnapshot::rows).unwrap_or(&[])
    }

    pub fn total_count(&self) -> usize {
        self.snapshot()
            .map(|snapshot| snapshot.page().total_count)
            .unwrap_or(0)
    }

    pub fn displayed_key(&self) -> Option<&str> {
        self.displayed.as_ref().map(|displayed| displayed.key.as_str())
    }

    pub fn is_loading(&self) -> bool {
        self.wanted_key
            .as_ref()
            .is_some_and(|wanted| self.in_flight.values().any(|pending| pending == wanted))
    }

    /// True while the rows on screen answer an older query than the wanted one.
    pub fn is_stale(&self) -> bool {
        self.wanted_key.as_deref() != self.displayed_key()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Applies an optimistic field edit to the page snapshot only.
    pub fn apply_local_edit(&mut self, id: T::Id, path: &str, value: &Value) -> Result<bool> {
        let Some(displayed) = self.displayed.as_mut() else {
            return Ok(false);
        };
        match displayed.snapshot.with_field(id, path, value)? {
            Some(snapshot) => {
                displayed.snapshot = snapshot;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Writes a server-confirmed row into the snapshot and every cached page
    /// that holds it.
    pub fn apply_confirmed_row(&mut self, row: &T) {
        if let Some(displayed) = self.displayed.as_mut() {
            if let Some(snapshot) = displayed.snapshot.with_row(row) {
                displayed.snapshot = snapshot;
            }
        }
        for (_, cached) in self.cache.iter_mut() {
            if let Some(item) = cached.page.items.iter_mut().find(|item| item.id() == row.id()) {
                *item = row.clone();
            }
        }
    }

    /// Writes one server-confirmed field into the snapshot and every cached
    /// page that holds the row. Used when the backend confirms without
    /// returning the stored row.
    pub fn apply_confirmed_field(&mut self, id: T::Id, path: &str, value: &Value) -> Result<()> {
        self.apply_local_edit(id, path, value)?;
        for (_, cached) in self.cache.iter_mut() {
            if let Some(item) = cached.page.items.iter_mut().find(|item| item.id() == id) {
                *item = with_field(item, path, value)?;
            }
        }
        Ok(())
    }

    pub fn invalidate(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{FetchOutcome, FilterCriterion, FixedPredicate, ListingRequest, Page, PagedDataSource};
    use crate::ids::RequestIdGen;
    use crate::model::Entity;
    use crate::query::QueryStateCodec;
    use anyhow::{Result, anyhow};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: i64,
        label: String,
    }

    impl Entity for Row {
        type Id = i64;

        fn id(&self) -> i64 {
            self.id
        }
    }

    fn page(label: &str, ids: &[i64], total_count: usize) -> Page<Row> {
        Page {
            items: ids
                .iter()
                .map(|id| Row {
                    id: *id,
                    label: format!("{label}-{id}"),
                })
                .collect(),
            total_count,
            offset: 0,
            take: 50,
        }
    }

    fn codec() -> QueryStateCodec {
        QueryStateCodec::new(["storeTypes", "nationality"], 50)
    }

    #[test]
    fn listing_request_maps_query_state() {
        let state = codec().parse("keyword=rose&storeTypes=lend&nationality=JP&storeTypes=repair&pageIndex=2&pageSize=20");
        let fixed = FixedPredicate::new("status", ["active"]);
        let request = ListingRequest::from_query(&state, Some(&fixed));

        assert_eq!(request.keyword.as_deref(), Some("rose"));
        assert_eq!(
            request.filters,
            vec![
                FilterCriterion {
                    field: "storeTypes".to_owned(),
                    values: vec!["lend".to_owned(), "repair".to_owned()],
                },
                FilterCriterion {
                    field: "nationality".to_owned(),
                    values: vec!["JP".to_owned()],
                },
            ]
        );
        assert_eq!(request.offset, 40);
        assert_eq!(request.limit, 20);
        assert_eq!(request.fixed_predicate, Some(fixed));
    }

    #[test]
    fn cache_key_ignores_selection_order_but_not_fixed_predicate() {
        let codec = codec();
        let left = ListingRequest::from_query(&codec.parse("storeTypes=lend&nationality=JP"), None);
        let right = ListingRequest::from_query(&codec.parse("nationality=JP&storeTypes=lend"), None);
        assert_eq!(left.cache_key(), right.cache_key());

        let fixed = FixedPredicate::new("status", ["active"]);
        let scoped =
            ListingRequest::from_query(&codec.parse("storeTypes=lend&nationality=JP"), Some(&fixed));
        assert_ne!(left.cache_key(), scoped.cache_key());
    }

    #[test]
    fn late_response_for_superseded_query_is_ignored() -> Result<()> {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();

        let q1 = source.query(&codec.parse("storeTypes=lend"), &mut ids).expect("q1 fetch");
        let q2 = source
            .query(&codec.parse("storeTypes=repair"), &mut ids)
            .expect("q2 fetch");

        assert_eq!(
            source.resolve(q2.request_id, Ok(page("q2", &[2], 1))),
            FetchOutcome::Applied
        );
        assert_eq!(
            source.resolve(q1.request_id, Ok(page("q1", &[1], 1))),
            FetchOutcome::Stale
        );

        assert_eq!(source.rows()[0].label, "q2-2");
        assert_eq!(source.displayed_key(), Some(q2.key.as_str()));
        Ok(())
    }

    #[test]
    fn previous_page_stays_visible_while_fetch_is_pending() {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();
        let first = source.query(&codec.parse(""), &mut ids).expect("first fetch");
        source.resolve(first.request_id, Ok(page("p0", &[1, 2], 80)));

        let _second = source.query(&codec.parse("pageIndex=1"), &mut ids).expect("second fetch");
        assert!(source.is_loading());
        assert!(source.is_stale());
        assert_eq!(source.rows().len(), 2);
        assert_eq!(source.total_count(), 80);
    }

    #[test]
    fn failure_keeps_last_good_page_and_sets_error() {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();
        let first = source.query(&codec.parse(""), &mut ids).expect("first fetch");
        source.resolve(first.request_id, Ok(page("p0", &[1], 1)));

        let second = source.query(&codec.parse("keyword=x"), &mut ids).expect("second fetch");
        assert_eq!(
            source.resolve(second.request_id, Err(anyhow!("gateway timeout"))),
            FetchOutcome::Failed
        );
        assert_eq!(source.error(), Some("gateway timeout"));
        assert_eq!(source.rows()[0].label, "p0-1");

        let retry = source.refresh(&mut ids).expect("retry fetch");
        source.resolve(retry.request_id, Ok(page("kw", &[9], 1)));
        assert_eq!(source.error(), None);
        assert_eq!(source.rows()[0].label, "kw-9");
    }

    #[test]
    fn identical_queries_reuse_cached_results() {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();
        let first = source.query(&codec.parse("storeTypes=lend"), &mut ids).expect("first fetch");
        source.resolve(first.request_id, Ok(page("lend", &[1], 1)));

        let other = source.query(&codec.parse("storeTypes=repair"), &mut ids).expect("other fetch");
        source.resolve(other.request_id, Ok(page("repair", &[2], 1)));

        assert!(source.query(&codec.parse("storeTypes=lend"), &mut ids).is_none());
        assert_eq!(source.rows()[0].label, "lend-1");
    }

    #[test]
    fn pending_duplicate_query_is_not_reissued() {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();
        assert!(source.query(&codec.parse("storeTypes=lend"), &mut ids).is_some());
        assert!(source.query(&codec.parse("storeTypes=lend"), &mut ids).is_none());
    }

    #[test]
    fn local_edits_touch_snapshot_not_cache() -> Result<()> {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();
        let first = source.query(&codec.parse(""), &mut ids).expect("first fetch");
        source.resolve(first.request_id, Ok(page("p", &[1, 2], 2)));

        assert!(source.apply_local_edit(2, "label", &json!("edited"))?);
        assert!(!source.apply_local_edit(99, "label", &json!("missing"))?);
        assert_eq!(source.rows()[1].label, "edited");

        let other = source.query(&codec.parse("keyword=x"), &mut ids).expect("other fetch");
        source.resolve(other.request_id, Ok(page("x", &[5], 1)));
        assert!(source.query(&codec.parse(""), &mut ids).is_none());
        assert_eq!(source.rows()[1].label, "p-2", "cache must hold the fetched row");
        Ok(())
    }

    #[test]
    fn confirmed_rows_update_snapshot_and_cache() {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();
        let first = source.query(&codec.parse(""), &mut ids).expect("first fetch");
        source.resolve(first.request_id, Ok(page("p", &[1, 2], 2)));

        source.apply_confirmed_row(&Row {
            id: 1,
            label: "server".to_owned(),
        });
        assert_eq!(source.rows()[0].label, "server");

        let other = source.query(&codec.parse("keyword=x"), &mut ids).expect("other fetch");
        source.resolve(other.request_id, Ok(page("x", &[5], 1)));
        assert!(source.query(&codec.parse(""), &mut ids).is_none());
        assert_eq!(source.rows()[0].label, "server");
    }

    #[test]
    fn returning_to_a_pending_query_applies_its_response() {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();
        let lend = source.query(&codec.parse("storeTypes=lend"), &mut ids).expect("lend fetch");
        let repair = source.query(&codec.parse("storeTypes=repair"), &mut ids).expect("repair fetch");
        source.resolve(repair.request_id, Ok(page("repair", &[2], 1)));

        assert!(source.query(&codec.parse("storeTypes=lend"), &mut ids).is_none());
        assert_eq!(
            source.resolve(lend.request_id, Ok(page("lend", &[1], 1))),
            FetchOutcome::Applied
        );
        assert_eq!(source.rows()[0].label, "lend-1");
    }

    #[test]
    fn older_response_for_same_key_never_replaces_newer_page() {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();
        let first = source.query(&codec.parse("storeTypes=lend"), &mut ids).expect("lend fetch");
        let refresh = source.refresh(&mut ids).expect("refresh");

        source.resolve(refresh.request_id, Ok(page("new", &[1], 1)));
        assert_eq!(
            source.resolve(first.request_id, Ok(page("old", &[1], 1))),
            FetchOutcome::Stale
        );
        assert_eq!(source.rows()[0].label, "new-1");

        let other = source.query(&codec.parse("storeTypes=repair"), &mut ids).expect("repair fetch");
        source.resolve(other.request_id, Ok(page("repair", &[2], 1)));
        assert!(source.query(&codec.parse("storeTypes=lend"), &mut ids).is_none());
        assert_eq!(source.rows()[0].label, "new-1", "cache keeps the newer page");
    }

    #[test]
    fn oversized_page_is_rejected_and_last_good_page_kept() {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();
        let first = source.query(&codec.parse(""), &mut ids).expect("first fetch");
        source.resolve(first.request_id, Ok(page("p", &[1], 1)));

        let second = source.query(&codec.parse("keyword=x"), &mut ids).expect("second fetch");
        let oversized = Page {
            take: 2,
            ..page("x", &[4, 5, 6], 3)
        };
        assert_eq!(
            source.resolve(second.request_id, Ok(oversized)),
            FetchOutcome::Failed
        );
        assert_eq!(source.error(), Some("backend returned 3 rows for a page of 2"));
        assert_eq!(source.rows()[0].label, "p-1");
        assert!(source.query(&codec.parse("keyword=x"), &mut ids).is_some(), "nothing was cached");
    }

    #[test]
    fn confirmed_field_reaches_snapshot_and_cache() -> Result<()> {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();
        let first = source.query(&codec.parse(""), &mut ids).expect("first fetch");
        source.resolve(first.request_id, Ok(page("p", &[1, 2], 2)));

        source.apply_confirmed_field(2, "label", &json!("saved"))?;
        assert_eq!(source.rows()[1].label, "saved");

        let other = source.query(&codec.parse("keyword=x"), &mut ids).expect("other fetch");
        source.resolve(other.request_id, Ok(page("x", &[5], 1)));
        assert!(source.query(&codec.parse(""), &mut ids).is_none());
        assert_eq!(source.rows()[1].label, "saved");
        assert_eq!(source.rows()[0].label, "p-1");
        Ok(())
    }

    #[test]
    fn tickets_come_from_the_shared_generator() {
        let codec = codec();
        let mut source = PagedDataSource::<Row>::new(None, 8);
        let mut ids = RequestIdGen::default();
        let taken = ids.next_id();
        let ticket = source.query(&codec.parse(""), &mut ids).expect("fetch");
        assert!(ticket.request_id > taken);
    }
}
