// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::backend::BulkStep;
use crate::editor::{
    CellKey, CellPhase, EditSignal, EditableCell, EditableField, InlineCellEditor, PartialUpdate,
    PersistOutcome,
};
use crate::facets::{
    FacetOption, FacetRegistry, FacetSpec, FacetVocabulary, FilterFacet, SelectedFilterOption,
};
use crate::ids::{RequestId, RequestIdGen};
use crate::model::{ArtworkStatus, Entity, StoreType};
use crate::paginator::{
    DEFAULT_JUMP_STRIDE, DEFAULT_SIBLING_COUNT, PageItem, TablePaginator, total_pages,
};
use crate::query::{DEFAULT_PAGE_SIZE, Navigation, QueryState, QueryStateCodec};
use crate::selection::{ControlState, SelectionSet};
use crate::source::{
    DEFAULT_CACHE_CAPACITY, FetchOutcome, FetchTicket, FixedPredicate, ListingRequest, Page,
    PagedDataSource,
};

/// Per-entity configuration of a list page.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub resource: String,
    pub facets: Vec<FacetSpec>,
    pub fixed_predicate: Option<FixedPredicate>,
    pub editable_fields: Vec<EditableField>,
    pub default_page_size: usize,
    pub sibling_count: usize,
    pub jump_stride: usize,
    pub cache_capacity: usize,
}

impl TableSpec {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            facets: Vec::new(),
            fixed_predicate: None,
            editable_fields: Vec::new(),
            default_page_size: DEFAULT_PAGE_SIZE,
            sibling_count: DEFAULT_SIBLING_COUNT,
            jump_stride: DEFAULT_JUMP_STRIDE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// The artwork catalogue: active works only, filterable by store type,
    /// nationality and artist.
    pub fn artworks() -> Self {
        Self {
            facets: vec![
                FacetSpec::new("storeType", "庫存狀態"),
                FacetSpec::new("nationality", "國籍"),
                FacetSpec::new("artist", "藝術家"),
            ],
            fixed_predicate: Some(FixedPredicate::new(
                "status",
                [ArtworkStatus::Active.as_str()],
            )),
            editable_fields: vec![
                EditableField::free_text("title"),
                EditableField::free_text("artist"),
                EditableField::free_text("location"),
                EditableField::free_text("notes"),
                EditableField::free_text("year"),
                EditableField::free_text("priceCents"),
                EditableField::enumerated("storeType"),
                EditableField::enumerated("acquiredOn"),
            ],
            ..Self::new("artworks")
        }
    }

    pub fn facet_keys(&self) -> impl Iterator<Item = &str> {
        self.facets.iter().map(|facet| facet.key.as_str())
    }
}

/// Labels of the fixed store-type vocabulary, for backends that build it.
pub fn store_type_options() -> Vec<FacetOption> {
    StoreType::ALL
        .iter()
        .map(|store_type| FacetOption::new(store_type.as_str(), store_type.label()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    First,
    Previous,
    Next,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    Delete,
    Patch(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableCommand<Id> {
    SetKeyword(String),
    AddFilter { facet_key: String, value: String },
    RemoveFilter { facet_key: String, value: String },
    ClearFilters,
    SetPage(usize),
    StepPage(PageStep),
    SetPageSize(usize),
    JumpPages { forward: bool },
    /// The host navigated (back button, pasted link).
    LocationChanged(String),
    Refresh,
    ToggleRow(Id),
    ToggleAllVisible,
    ClearSelection,
    BeginEdit { row_id: Id, field_path: String },
    EditInput(Value),
    EditBlur,
    CancelEdit,
    Commit { row_id: Id, field_path: String, value: Value },
    BulkDelete,
    BulkPatch(Map<String, Value>),
    BulkCompound(Vec<BulkAction>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableRequest {
    LoadFacets {
        request_id: RequestId,
    },
    FetchPage {
        request_id: RequestId,
        listing: ListingRequest,
    },
    Persist {
        request_id: RequestId,
        update: PartialUpdate,
    },
    Bulk {
        request_id: RequestId,
        steps: Vec<BulkStep>,
    },
}

impl TableRequest {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::LoadFacets { request_id }
            | Self::FetchPage { request_id, .. }
            | Self::Persist { request_id, .. }
            | Self::Bulk { request_id, .. } => *request_id,
        }
    }
}

/// Result of a [`TableRequest`], fed back through [`TableController::complete`].
#[derive(Debug)]
pub enum Completion<T> {
    Facets {
        request_id: RequestId,
        result: Result<FacetVocabulary>,
    },
    Page {
        request_id: RequestId,
        result: Result<Page<T>>,
    },
    Persist {
        request_id: RequestId,
        result: Result<Option<T>>,
    },
    Bulk {
        request_id: RequestId,
        result: Result<()>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableEffect {
    Navigate(Navigation),
    Request(TableRequest),
    Notice(Notice),
}

#[derive(Debug, Clone, PartialEq)]
struct BulkInFlight {
    request_id: RequestId,
    summary: String,
}

/// One list page: query state in the URL, a server-paginated result set,
/// a cross-page selection and inline cell edits.
///
/// The controller performs no I/O. Commands return effects; requests it
/// emits come back through [`TableController::complete`] in any order.
#[derive(Debug)]
pub struct TableController<T: Entity> {
    spec: TableSpec,
    codec: QueryStateCodec,
    query: QueryState,
    registry: FacetRegistry,
    facets_request: Option<RequestId>,
    source: PagedDataSource<T>,
    selection: SelectionSet<T>,
    editor: InlineCellEditor<T>,
    persists: BTreeMap<RequestId, CellKey<T::Id>>,
    paginator: TablePaginator,
    ids: RequestIdGen,
    bulk: Option<BulkInFlight>,
}

impl<T: Entity> TableController<T> {
    pub fn new(spec: TableSpec) -> Self {
        let codec = QueryStateCodec::new(spec.facet_keys(), spec.default_page_size);
        let query = codec.empty_state();
        let source = PagedDataSource::new(spec.fixed_predicate.clone(), spec.cache_capacity);
        let editor = InlineCellEditor::new(spec.editable_fields.clone());
        let paginator = TablePaginator {
            sibling_count: spec.sibling_count,
            jump_stride: spec.jump_stride.max(1),
        };
        Self {
            spec,
            codec,
            query,
            registry: FacetRegistry::default(),
            facets_request: None,
            source,
            selection: SelectionSet::default(),
            editor,
            persists: BTreeMap::new(),
            paginator,
            ids: RequestIdGen::default(),
            bulk: None,
        }
    }

    /// First render: adopt the query in `location`, then load the facet
    /// vocabulary and the first page side by side.
    pub fn open(&mut self, location: &str) -> Vec<TableEffect> {
        self.query = self.codec.parse(location);
        let mut effects = vec![self.load_facets()];
        effects.extend(self.fetch());
        effects
    }

    pub fn dispatch(&mut self, command: TableCommand<T::Id>) -> Vec<TableEffect> {
        match command {
            TableCommand::SetKeyword(keyword) => {
                let next = self.codec.set_keyword(&self.query, &keyword);
                self.navigate(next)
            }
            TableCommand::AddFilter { facet_key, value } => {
                let next = self.codec.add_filter_option(&self.query, &facet_key, &value);
                self.navigate(next)
            }
            TableCommand::RemoveFilter { facet_key, value } => {
                let next = self
                    .codec
                    .remove_filter_option(&self.query, &facet_key, &value);
                self.navigate(next)
            }
            TableCommand::ClearFilters => {
                let next = self.codec.clear_filters(&self.query);
                self.navigate(next)
            }
            TableCommand::SetPage(page_index) => {
                let next = self.codec.set_page(&self.query, page_index);
                self.navigate(next)
            }
            TableCommand::StepPage(step) => {
                let current = self.query.page_index;
                let pages = self.page_count();
                let target = match step {
                    PageStep::First => self.paginator.first(current, pages),
                    PageStep::Previous => self.paginator.previous(current, pages),
                    PageStep::Next => self.paginator.next(current, pages),
                    PageStep::Last => self.paginator.last(current, pages),
                };
                self.go_to_page(target)
            }
            TableCommand::SetPageSize(page_size) => {
                let next = self.codec.set_page_size(&self.query, page_size);
                self.navigate(next)
            }
            TableCommand::JumpPages { forward } => {
                let target = self
                    .paginator
                    .jump(self.query.page_index, self.page_count(), forward);
                self.go_to_page(target)
            }
            TableCommand::LocationChanged(location) => {
                let next = self.codec.parse(&location);
                if next == self.query {
                    return Vec::new();
                }
                self.query = next;
                self.fetch().into_iter().collect()
            }
            TableCommand::Refresh => self.refresh(),
            TableCommand::ToggleRow(row_id) => {
                let row = self
                    .source
                    .snapshot()
                    .and_then(|snapshot| snapshot.row(row_id))
                    .or_else(|| self.selection.get(row_id))
                    .cloned();
                match row {
                    Some(row) => {
                        self.selection = self.selection.toggled_row(&row);
                        Vec::new()
                    }
                    None => vec![notice_error(format!("row {row_id:?} is not loaded"))],
                }
            }
            TableCommand::ToggleAllVisible => {
                self.selection = self.selection.toggled_all_visible(self.source.rows());
                Vec::new()
            }
            TableCommand::ClearSelection => {
                self.selection = self.selection.cleared();
                Vec::new()
            }
            TableCommand::BeginEdit { row_id, field_path } => {
                let Some(row) = self
                    .source
                    .snapshot()
                    .and_then(|snapshot| snapshot.row(row_id))
                    .cloned()
                else {
                    return vec![notice_error(format!("row {row_id:?} is not on this page"))];
                };
                match self.editor.begin_edit(&row, &field_path) {
                    Ok(()) => Vec::new(),
                    Err(error) => vec![notice_error(format!("{error:#}"))],
                }
            }
            TableCommand::EditInput(value) => match self.editor.input(value) {
                Ok(signal) => self.follow(signal),
                Err(error) => vec![notice_error(format!("{error:#}"))],
            },
            TableCommand::EditBlur => {
                let signal = self.editor.blur();
                self.follow(signal)
            }
            TableCommand::CancelEdit => {
                self.editor.cancel();
                Vec::new()
            }
            TableCommand::Commit {
                row_id,
                field_path,
                value,
            } => self.commit(row_id, &field_path, value),
            TableCommand::BulkDelete => self.bulk(vec![BulkAction::Delete]),
            TableCommand::BulkPatch(properties) => self.bulk(vec![BulkAction::Patch(properties)]),
            TableCommand::BulkCompound(actions) => self.bulk(actions),
        }
    }

    /// Applies a finished request. Late or superseded results are dropped.
    pub fn complete(&mut self, completion: Completion<T>) -> Vec<TableEffect> {
        match completion {
            Completion::Facets { request_id, result } => {
                if self.facets_request != Some(request_id) {
                    tracing::debug!(request_id = request_id.get(), "stale facet response ignored");
                    return Vec::new();
                }
                self.facets_request = None;
                self.registry = FacetRegistry::from_vocabulary(&self.spec.facets, result);
                Vec::new()
            }
            Completion::Page { request_id, result } => self.complete_page(request_id, result),
            Completion::Persist { request_id, result } => {
                self.complete_persist(request_id, result)
            }
            Completion::Bulk { request_id, result } => self.complete_bulk(request_id, result),
        }
    }

    /// Explicit cell commit for renderers that manage their own input state.
    pub fn commit(&mut self, row_id: T::Id, field_path: &str, value: Value) -> Vec<TableEffect> {
        if self.editor.field(field_path).is_none() {
            return vec![notice_error(format!("field {field_path:?} is not editable"))];
        }
        if let Err(error) = self.source.apply_local_edit(row_id, field_path, &value) {
            return vec![notice_error(format!("{error:#}"))];
        }
        self.selection = self.selection.refreshed(self.source.rows());

        match self.editor.commit(row_id, field_path, value, &mut self.ids) {
            Ok(ticket) => {
                self.persists.insert(ticket.request_id, ticket.key);
                vec![TableEffect::Request(TableRequest::Persist {
                    request_id: ticket.request_id,
                    update: ticket.update,
                })]
            }
            Err(error) => vec![notice_error(format!("{error:#}"))],
        }
    }

    fn follow(&mut self, signal: EditSignal<T::Id>) -> Vec<TableEffect> {
        match signal {
            EditSignal::None => Vec::new(),
            EditSignal::Commit { key, value } => self.commit(key.row_id, &key.field_path, value),
        }
    }

    fn navigate(&mut self, next: Option<QueryState>) -> Vec<TableEffect> {
        let Some(next) = next else {
            return Vec::new();
        };
        self.query = next;
        let mut effects = vec![TableEffect::Navigate(self.codec.navigation(&self.query))];
        effects.extend(self.fetch());
        effects
    }

    fn go_to_page(&mut self, target: Option<usize>) -> Vec<TableEffect> {
        let next = target.and_then(|page_index| self.codec.set_page(&self.query, page_index));
        self.navigate(next)
    }

    fn fetch(&mut self) -> Option<TableEffect> {
        self.source.query(&self.query, &mut self.ids).map(fetch_effect)
    }

    fn refresh(&mut self) -> Vec<TableEffect> {
        let mut effects = Vec::new();
        if self.registry.is_empty() && self.facets_request.is_none() {
            effects.push(self.load_facets());
        }
        match self.source.refresh(&mut self.ids) {
            Some(ticket) => effects.push(fetch_effect(ticket)),
            None => effects.extend(self.fetch()),
        }
        effects
    }

    fn load_facets(&mut self) -> TableEffect {
        let request_id = self.ids.next_id();
        self.facets_request = Some(request_id);
        TableEffect::Request(TableRequest::LoadFacets { request_id })
    }

    fn complete_page(&mut self, request_id: RequestId, result: Result<Page<T>>) -> Vec<TableEffect> {
        let outcome = self.source.resolve(request_id, result);
        self.editor.reconciled(request_id);

        match outcome {
            FetchOutcome::Stale => Vec::new(),
            FetchOutcome::Failed => {
                let message = self.source.error().unwrap_or("unknown error");
                vec![notice_error(format!("could not load {}: {message}", self.spec.resource))]
            }
            FetchOutcome::Applied => {
                self.reapply_pending_writes();
                self.selection = self.selection.refreshed(self.source.rows());
                let pages = self.page_count();
                if pages > 0 && self.query.page_index >= pages {
                    return self.go_to_page(Some(pages - 1));
                }
                Vec::new()
            }
        }
    }

    fn complete_persist(&mut self, request_id: RequestId, result: Result<Option<T>>) -> Vec<TableEffect> {
        let Some(key) = self.persists.remove(&request_id) else {
            tracing::debug!(request_id = request_id.get(), "unknown persist response dropped");
            return Vec::new();
        };

        match self.editor.resolve(request_id, &key, result) {
            PersistOutcome::Superseded => Vec::new(),
            PersistOutcome::Confirmed { row, value } => {
                match row {
                    Some(row) => {
                        self.source.apply_confirmed_row(&row);
                        self.selection = self.selection.refreshed(std::slice::from_ref(&row));
                    }
                    None => {
                        let written =
                            self.source
                                .apply_confirmed_field(key.row_id, &key.field_path, &value);
                        if let Err(error) = written {
                            tracing::warn!(
                                field = key.field_path.as_str(),
                                error = %format!("{error:#}"),
                                "confirmed value could not be cached"
                            );
                        }
                    }
                }
                self.reapply_pending_writes();
                self.selection = self.selection.refreshed(self.source.rows());
                Vec::new()
            }
            PersistOutcome::Failed(message) => {
                let refetch = self.source.refresh(&mut self.ids);
                self.editor
                    .await_reconciliation(refetch.as_ref().map(|ticket| ticket.request_id));
                let mut effects = vec![notice_error(format!(
                    "could not save {}: {message}",
                    key.field_path
                ))];
                effects.extend(refetch.map(fetch_effect));
                effects
            }
        }
    }

    /// Rows that came from the backend predate edits still in flight; put
    /// those values back so the snapshot keeps showing them.
    fn reapply_pending_writes(&mut self) {
        for (key, value) in self.editor.pending_writes() {
            if let Err(error) = self
                .source
                .apply_local_edit(key.row_id, &key.field_path, value)
            {
                tracing::warn!(
                    field = key.field_path.as_str(),
                    error = %format!("{error:#}"),
                    "pending edit could not be reapplied"
                );
            }
        }
    }

    fn bulk(&mut self, actions: Vec<BulkAction>) -> Vec<TableEffect> {
        if self.selection.is_empty() {
            return vec![notice_error("select at least one row first")];
        }
        if actions.is_empty() {
            return Vec::new();
        }

        let id_list = self.selection.wire_ids();
        let steps: Vec<BulkStep> = actions
            .into_iter()
            .map(|action| match action {
                BulkAction::Delete => BulkStep::Delete {
                    id_list: id_list.clone(),
                },
                BulkAction::Patch(properties) => BulkStep::Patch {
                    id_list: id_list.clone(),
                    properties,
                },
            })
            .collect();
        let summary = format!(
            "{} on {} row{}",
            steps
                .iter()
                .map(BulkStep::label)
                .collect::<Vec<_>>()
                .join(" + "),
            id_list.len(),
            if id_list.len() == 1 { "" } else { "s" }
        );

        let request_id = self.ids.next_id();
        tracing::debug!(request_id = request_id.get(), %summary, "bulk action issued");
        self.bulk = Some(BulkInFlight {
            request_id,
            summary,
        });
        vec![TableEffect::Request(TableRequest::Bulk { request_id, steps })]
    }

    fn complete_bulk(&mut self, request_id: RequestId, result: Result<()>) -> Vec<TableEffect> {
        let Some(bulk) = self.bulk.take_if(|bulk| bulk.request_id == request_id) else {
            tracing::debug!(request_id = request_id.get(), "unknown bulk response dropped");
            return Vec::new();
        };

        match result {
            Ok(()) => {
                tracing::info!(summary = %bulk.summary, "bulk action applied");
                self.selection = self.selection.cleared();
                self.source.invalidate();
                let mut effects = vec![TableEffect::Notice(Notice::info(format!(
                    "{} done",
                    bulk.summary
                )))];
                effects.extend(self.source.refresh(&mut self.ids).map(fetch_effect));
                effects
            }
            Err(error) => {
                tracing::info!(summary = %bulk.summary, error = %format!("{error:#}"), "bulk action failed");
                vec![notice_error(format!("{} failed: {error:#}", bulk.summary))]
            }
        }
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn codec(&self) -> &QueryStateCodec {
        &self.codec
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn location(&self) -> String {
        self.codec.serialize(&self.query)
    }

    pub fn registry(&self) -> &FacetRegistry {
        &self.registry
    }

    pub fn selected_filters(&self) -> Vec<SelectedFilterOption> {
        self.registry.project_selected(&self.query)
    }

    pub fn available_filters(&self) -> Vec<FilterFacet> {
        self.registry.project_available(&self.query)
    }

    pub fn rows(&self) -> &[T] {
        self.source.rows()
    }

    pub fn total_count(&self) -> usize {
        self.source.total_count()
    }

    pub fn page_count(&self) -> usize {
        total_pages(self.total_count(), self.query.page_size)
    }

    pub fn is_loading(&self) -> bool {
        self.source.is_loading()
    }

    /// The rows on screen still answer a previous query.
    pub fn is_stale(&self) -> bool {
        self.source.is_stale()
    }

    pub fn is_saving(&self) -> bool {
        self.editor.has_pending()
    }

    pub fn error(&self) -> Option<&str> {
        self.source.error()
    }

    pub fn page_range(&self) -> Vec<PageItem> {
        self.paginator
            .range(self.query.page_index, self.total_count(), self.query.page_size)
    }

    pub fn selection(&self) -> &SelectionSet<T> {
        &self.selection
    }

    pub fn selection_control(&self) -> ControlState {
        self.selection.control_state(self.total_count())
    }

    pub fn active_cell(&self) -> Option<&EditableCell<T::Id>> {
        self.editor.active()
    }

    pub fn cell_phase(&self, row_id: T::Id, field_path: &str) -> CellPhase {
        self.editor.phase(row_id, field_path)
    }

    pub fn is_bulk_pending(&self) -> bool {
        self.bulk.is_some()
    }
}

fn fetch_effect(ticket: FetchTicket) -> TableEffect {
    TableEffect::Request(TableRequest::FetchPage {
        request_id: ticket.request_id,
        listing: ticket.request,
    })
}

fn notice_error(message: impl Into<String>) -> TableEffect {
    TableEffect::Notice(Notice::error(message))
}
