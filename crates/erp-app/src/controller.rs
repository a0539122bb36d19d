// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeSet, VecDeque};
use std::fmt::Debug;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::bulk::{BulkDispatcher, BulkField, BulkUpdateRequest, UpdateResponse};
use crate::columns::{ColumnCache, ColumnDescriptor, ColumnSet};
use crate::confirm::{DeleteDialog, DeleteRequest};
use crate::error::ListError;
use crate::filters::ListQuery;
use crate::ids::RowId;
use crate::menu::{ActionOutcome, MenuCommand, MenuEntry, MenuItem};
use crate::modal::{ModalAction, ModalState};
use crate::model::{CustomColumn, Lookups, Page};
use crate::notify::Toast;
use crate::paths;
use crate::permissions::PermissionOracle;
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeKind, Subscription};
use crate::row::EntityRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryAction {
    pub label: &'static str,
    pub to: String,
}

/// Per-entity table declaration consumed by [`ListController`].
pub trait TableSpec {
    type Row: EntityRow + Debug;
    type Field: BulkField;

    const TITLE: &'static str;
    /// Change-feed table name.
    const TABLE: &'static str;

    fn columns(lookups: &Lookups, custom: &[CustomColumn]) -> Result<ColumnSet<Self::Row>, ListError>;
    fn default_hidden() -> &'static [&'static str];
    fn default_pinned() -> &'static [&'static str];
    fn primary_action(permissions: &dyn PermissionOracle) -> Option<PrimaryAction>;

    fn selectable(_permissions: &dyn PermissionOracle) -> bool {
        true
    }

    fn bulk_actions(selected: &[Self::Row], permissions: &dyn PermissionOracle) -> Vec<MenuEntry>;
    fn context_menu(row: &Self::Row, permissions: &dyn PermissionOracle, query: &str) -> Vec<MenuEntry>;
    fn display_name(row: &Self::Row) -> String;
}

/// How an incoming change event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    Unchanged,
    /// A newer page already reflects the change.
    Superseded,
    /// The row is not on this page; nothing is inserted.
    MissingRow,
    /// Held until the pending page load is adopted.
    Buffered,
    Ignored,
}

/// Pinned columns first, then the remaining visible columns in declared order.
#[derive(Debug, Clone)]
pub struct ColumnView<R> {
    pub set: Rc<ColumnSet<R>>,
    pub order: Vec<usize>,
}

impl<R: EntityRow> ColumnView<R> {
    pub fn iter(&self) -> impl Iterator<Item = &ColumnDescriptor<R>> {
        self.order.iter().filter_map(|index| self.set.at(*index))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub struct ListController<S: TableSpec> {
    permissions: Rc<dyn PermissionOracle>,
    query: ListQuery,
    rows: Vec<S::Row>,
    count: usize,
    revision: u64,
    lookups: Lookups,
    custom: Vec<CustomColumn>,
    cache: ColumnCache<S::Row>,
    hidden: BTreeSet<String>,
    pinned: Vec<String>,
    selection: BTreeSet<RowId>,
    loading: bool,
    buffered: Vec<ChangeEvent>,
    subscription: Option<Subscription>,
    torn_down: bool,
    dispatcher: BulkDispatcher<S::Field>,
    delete: DeleteDialog,
    deleting: Option<DeleteRequest>,
    modal: ModalState,
    toasts: VecDeque<Toast>,
}

impl<S: TableSpec> Debug for ListController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListController")
            .field("title", &S::TITLE)
            .field("rows", &self.rows.len())
            .field("count", &self.count)
            .field("revision", &self.revision)
            .field("selected", &self.selection.len())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl<S: TableSpec> ListController<S> {
    pub fn new(permissions: Rc<dyn PermissionOracle>, query: ListQuery) -> Self {
        Self {
            permissions,
            query,
            rows: Vec::new(),
            count: 0,
            revision: 0,
            lookups: Lookups::default(),
            custom: Vec::new(),
            cache: ColumnCache::default(),
            hidden: S::default_hidden().iter().map(|id| (*id).to_owned()).collect(),
            pinned: S::default_pinned().iter().map(|id| (*id).to_owned()).collect(),
            selection: BTreeSet::new(),
            loading: false,
            buffered: Vec::new(),
            subscription: None,
            torn_down: false,
            dispatcher: BulkDispatcher::default(),
            delete: DeleteDialog::default(),
            deleting: None,
            modal: ModalState::default(),
            toasts: VecDeque::new(),
        }
    }

    pub fn subscribe(&mut self, feed: &ChangeFeed) {
        if self.torn_down {
            return;
        }
        self.subscription = Some(feed.subscribe(S::TABLE));
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn title(&self) -> &'static str {
        S::TITLE
    }

    pub fn permissions(&self) -> &dyn PermissionOracle {
        self.permissions.as_ref()
    }

    pub fn rows(&self) -> &[S::Row] {
        &self.rows
    }

    pub fn row(&self, id: &str) -> Option<&S::Row> {
        self.rows.iter().find(|row| row.row_id() == id)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn query_string(&self) -> String {
        self.query.to_query_string()
    }

    pub fn lookups(&self) -> &Lookups {
        &self.lookups
    }

    pub fn set_lookups(&mut self, lookups: Lookups) {
        self.lookups = lookups;
    }

    pub fn set_custom_columns(&mut self, custom: Vec<CustomColumn>) {
        self.custom = custom;
    }

    pub fn columns(&mut self) -> Result<Rc<ColumnSet<S::Row>>, ListError> {
        self.cache.get_or_build(&self.lookups, &self.custom, S::columns)
    }

    pub fn column_builds(&self) -> usize {
        self.cache.builds()
    }

    // Page lifecycle

    /// Marks a load as pending and returns the query to load with. Patches
    /// that arrive before [`Self::adopt_page`] are held and replayed after it.
    pub fn begin_reload(&mut self) -> ListQuery {
        self.loading = true;
        self.query.clone()
    }

    pub fn adopt_page(&mut self, page: Page<S::Row>) -> Result<Vec<PatchOutcome>, ListError> {
        if self.torn_down {
            debug!(table = S::TABLE, "late page dropped after teardown");
            return Ok(Vec::new());
        }
        self.columns()?.validate_rows(&page.rows)?;
        self.rows = page.rows;
        self.count = page.count;
        self.revision = page.revision;
        self.loading = false;
        let present: BTreeSet<RowId> = self.rows.iter().map(EntityRow::row_id).collect();
        self.selection.retain(|id| present.contains(id));
        info!(
            table = S::TABLE,
            rows = self.rows.len(),
            count = self.count,
            revision = self.revision,
            "page adopted"
        );
        let buffered = std::mem::take(&mut self.buffered);
        buffered
            .into_iter()
            .map(|event| self.apply_event(event))
            .collect()
    }

    /// Ends a pending load that failed. The current rows stay and held
    /// patches are applied to them.
    pub fn abort_reload(&mut self) -> Vec<PatchOutcome> {
        if !self.loading {
            return Vec::new();
        }
        self.loading = false;
        warn!(table = S::TABLE, held = self.buffered.len(), "page load abandoned");
        let buffered = std::mem::take(&mut self.buffered);
        buffered
            .into_iter()
            .map(|event| {
                self.apply_event(event).unwrap_or_else(|error| {
                    warn!(table = S::TABLE, %error, "dropping invalid change");
                    PatchOutcome::Ignored
                })
            })
            .collect()
    }

    /// Merges one change into the page, last write wins per field.
    pub fn apply_event(&mut self, event: ChangeEvent) -> Result<PatchOutcome, ListError> {
        if self.torn_down || event.table != S::TABLE {
            return Ok(PatchOutcome::Ignored);
        }
        if self.loading {
            self.buffered.push(event);
            return Ok(PatchOutcome::Buffered);
        }
        if event.revision <= self.revision {
            return Ok(PatchOutcome::Superseded);
        }
        let Some(index) = self.rows.iter().position(|row| row.row_id() == event.new.id) else {
            self.revision = event.revision;
            return Ok(PatchOutcome::MissingRow);
        };
        let outcome = match event.kind {
            ChangeKind::Delete => {
                let removed = self.rows.remove(index);
                self.selection.remove(&removed.row_id());
                self.count = self.count.saturating_sub(1);
                PatchOutcome::Applied
            }
            ChangeKind::Insert | ChangeKind::Update => {
                if event.new.apply_to(&mut self.rows[index])? {
                    PatchOutcome::Applied
                } else {
                    PatchOutcome::Unchanged
                }
            }
        };
        self.revision = event.revision;
        debug!(table = S::TABLE, id = %event.new.id, ?outcome, "change applied");
        Ok(outcome)
    }

    /// Applies everything waiting on the subscription.
    pub fn pump(&mut self) -> Vec<PatchOutcome> {
        let events = match &self.subscription {
            Some(subscription) => subscription.drain(),
            None => return Vec::new(),
        };
        events
            .into_iter()
            .map(|event| {
                self.apply_event(event).unwrap_or_else(|error| {
                    warn!(table = S::TABLE, %error, "dropping invalid change");
                    PatchOutcome::Ignored
                })
            })
            .collect()
    }

    /// Unsubscribes and turns every later page, patch and response into a no-op.
    pub fn teardown(&mut self) {
        self.subscription = None;
        self.torn_down = true;
        self.buffered.clear();
        self.dispatcher.abandon();
        self.delete.cancel();
        self.deleting = None;
        self.modal.reset();
        self.selection.clear();
        debug!(table = S::TABLE, "list view torn down");
    }

    // Columns

    pub fn is_visible(&self, id: &str) -> bool {
        !self.hidden.contains(id)
    }

    pub fn toggle_column(&mut self, id: &str) {
        if !self.hidden.remove(id) {
            self.hidden.insert(id.to_owned());
        }
    }

    pub fn show_all_columns(&mut self) {
        self.hidden.clear();
    }

    pub fn reset_columns(&mut self) {
        self.hidden = S::default_hidden().iter().map(|id| (*id).to_owned()).collect();
        self.pinned = S::default_pinned().iter().map(|id| (*id).to_owned()).collect();
    }

    pub fn is_pinned(&self, id: &str) -> bool {
        self.pinned.iter().any(|pinned| pinned == id)
    }

    pub fn toggle_pin(&mut self, id: &str) {
        if let Some(index) = self.pinned.iter().position(|pinned| pinned == id) {
            self.pinned.remove(index);
        } else {
            self.pinned.push(id.to_owned());
        }
    }

    pub fn visible_columns(&mut self) -> Result<ColumnView<S::Row>, ListError> {
        let set = self.columns()?;
        let mut order: Vec<usize> = Vec::with_capacity(set.len());
        for pinned in &self.pinned {
            if let Some(index) = set.iter().position(|column| &column.id == pinned) {
                if self.is_visible(pinned) {
                    order.push(index);
                }
            }
        }
        for (index, column) in set.iter().enumerate() {
            if !self.is_pinned(&column.id) && self.is_visible(&column.id) {
                order.push(index);
            }
        }
        Ok(ColumnView { set, order })
    }

    // Selection

    pub fn selectable(&self) -> bool {
        S::selectable(self.permissions.as_ref())
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.contains(id)
    }

    pub fn toggle_selected(&mut self, id: &str) -> bool {
        if !self.selectable() || self.row(id).is_none() {
            return false;
        }
        if !self.selection.remove(id) {
            self.selection.insert(id.to_owned());
        }
        true
    }

    pub fn select_all(&mut self) {
        if self.selectable() {
            self.selection = self.rows.iter().map(EntityRow::row_id).collect();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &BTreeSet<RowId> {
        &self.selection
    }

    pub fn selected_rows(&self) -> Vec<S::Row> {
        self.rows
            .iter()
            .filter(|row| self.selection.contains(&row.row_id()))
            .cloned()
            .collect()
    }

    // Pagination

    pub fn page_index(&self) -> usize {
        self.query.page_index()
    }

    pub fn page_count(&self) -> usize {
        self.count.div_ceil(self.query.limit.max(1)).max(1)
    }

    /// Moves to the next page. Returns whether a reload is needed.
    pub fn next_page(&mut self) -> bool {
        let next = self.page_index() + 1;
        if next >= self.page_count() {
            return false;
        }
        self.query.set_page(next);
        true
    }

    pub fn prev_page(&mut self) -> bool {
        let index = self.page_index();
        if index == 0 {
            return false;
        }
        self.query.set_page(index - 1);
        true
    }

    pub fn set_query(&mut self, query: ListQuery) {
        self.query = query;
    }

    // Actions

    pub fn primary_action(&self) -> Option<PrimaryAction> {
        S::primary_action(self.permissions.as_ref())
    }

    pub fn bulk_menu(&self) -> Vec<MenuEntry> {
        let selected = self.selected_rows();
        if selected.is_empty() {
            return Vec::new();
        }
        let mut entries = S::bulk_actions(&selected, self.permissions.as_ref());
        if self.dispatcher.is_in_flight() {
            for entry in &mut entries {
                disable(entry);
            }
        }
        entries
    }

    pub fn context_menu(&self, id: &str) -> Option<Vec<MenuEntry>> {
        self.row(id)
            .map(|row| S::context_menu(row, self.permissions.as_ref(), &self.query_string()))
    }

    /// Link target of a cell with the current query carried along.
    pub fn link_for(&mut self, id: &str, column: &str) -> Result<Option<String>, ListError> {
        let columns = self.columns()?;
        let (Some(row), Some(column)) = (self.row(id), columns.get(column)) else {
            return Ok(None);
        };
        Ok(column
            .cell(row, &self.lookups)
            .link_target()
            .map(|target| paths::with_query(target, &self.query_string())))
    }

    pub fn activate(&mut self, item: &MenuItem) -> ActionOutcome {
        if self.torn_down || !item.enabled {
            debug!(label = %item.label, "blocked menu activation");
            return ActionOutcome::Blocked;
        }
        match &item.command {
            MenuCommand::Navigate(to) => ActionOutcome::Navigate(to.clone()),
            MenuCommand::ConfirmDelete(confirm) => {
                self.delete.open(confirm.clone());
                ActionOutcome::ConfirmOpened
            }
            MenuCommand::OpenModal { kind, targets } => match self.modal.open(*kind, targets.clone()) {
                Ok(()) => ActionOutcome::ModalOpened(*kind),
                Err(error) => {
                    debug!(%error, "modal not opened");
                    ActionOutcome::Blocked
                }
            },
            MenuCommand::BulkUpdate { field, value } => {
                let Some(field) = S::Field::parse(field) else {
                    return ActionOutcome::Blocked;
                };
                let rows = self.selected_rows();
                match self.dispatcher.compose(&rows, field, value) {
                    Ok(request) => ActionOutcome::BulkSubmitted(request),
                    Err(error) => {
                        self.toasts.push_back(Toast::error(error.to_string()));
                        ActionOutcome::Blocked
                    }
                }
            }
        }
    }

    pub fn bulk_pending(&self) -> Option<&BulkUpdateRequest> {
        self.dispatcher.pending()
    }

    /// Feeds back the endpoint result for the in-flight bulk update. Rows are
    /// not touched; fresh values arrive with the next page or change event.
    pub fn finish_bulk(&mut self, result: anyhow::Result<UpdateResponse>) {
        if self.torn_down {
            return;
        }
        let toast = match result {
            Ok(response) => self.dispatcher.complete(&response),
            Err(error) => self.dispatcher.fail(&error),
        };
        match toast {
            Ok(toast) => self.toasts.push_back(toast),
            Err(error) => warn!(%error, "bulk response without a pending request"),
        }
    }

    pub fn delete_dialog(&self) -> &DeleteDialog {
        &self.delete
    }

    pub fn cancel_delete(&mut self) {
        self.delete.cancel();
    }

    pub fn confirm_delete(&mut self) -> Option<DeleteRequest> {
        let request = self.delete.submit()?;
        self.deleting = Some(request.clone());
        Some(request)
    }

    pub fn finish_delete(&mut self, result: anyhow::Result<()>) {
        if self.torn_down {
            return;
        }
        let Some(request) = self.deleting.take() else {
            return;
        };
        match result {
            Ok(()) => {
                info!(table = S::TABLE, id = %request.id, "row deleted");
                self.toasts.push_back(Toast::info("Deleted"));
            }
            Err(error) => {
                warn!(table = S::TABLE, id = %request.id, error = %format!("{error:#}"), "delete failed");
                self.toasts.push_back(Toast::error(format!("Failed to delete: {error:#}")));
            }
        }
    }

    pub fn modal(&self) -> &ModalState {
        &self.modal
    }

    pub fn cancel_modal(&mut self) -> Result<(), ListError> {
        self.modal.cancel()
    }

    pub fn submit_modal(&mut self) -> Result<ModalAction, ListError> {
        if self.torn_down {
            return Err(ListError::TornDown);
        }
        self.modal.begin_submit()
    }

    pub fn finish_modal(&mut self, result: anyhow::Result<UpdateResponse>) {
        if self.torn_down {
            return;
        }
        let kind = self.modal.kind();
        let failure = match result {
            Ok(response) => response.error.map(|error| error.message),
            Err(error) => Some(format!("{error:#}")),
        };
        let transition = match failure {
            None => {
                if let Some(kind) = kind {
                    self.toasts.push_back(Toast::info(format!("{} complete", kind.title())));
                }
                self.modal.succeed()
            }
            Some(message) => {
                self.toasts.push_back(Toast::error(message));
                self.modal.fail()
            }
        };
        if let Err(error) = transition {
            warn!(%error, "modal response arrived in the wrong phase");
        }
    }

    pub fn push_toast(&mut self, toast: Toast) {
        self.toasts.push_back(toast);
    }

    pub fn take_toasts(&mut self) -> Vec<Toast> {
        self.toasts.drain(..).collect()
    }
}

fn disable(entry: &mut MenuEntry) {
    match entry {
        MenuEntry::Item(item) => item.enabled = false,
        MenuEntry::Submenu { items, .. } => {
            for item in items {
                item.enabled = false;
            }
        }
        MenuEntry::Separator => {}
    }
}
