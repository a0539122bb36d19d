// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use erp_app::paths::{self, Route};
use erp_app::{
    ActionOutcome, ActionResult, AppCommand, AppMode, AppState, BulkUpdateRequest, Capability,
    ChangeEvent, ChangeFeed, ConfirmDelete, CustomColumn, CustomColumnKind, DEFAULT_PAGE_SIZE,
    DeleteRequest, Employee, EmployeeId, EmployeesTable, EntityRow, FieldValue, FormErrors, ItemId,
    ListController, ListError, ListQuery, Lookups, MenuCommand, MenuEntry, MenuItem, MethodType,
    ModalAction, ModalKind, ModalState, ModuleKind, Page, Part, PartDetailsView, PartEditView,
    PartFormInput, PartsTable, PermissionOracle, Permissions, ReplenishmentSystem, Resource,
    TableSpec, Toast, TrackingType, UpdateResponse, Verb, navigation,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::collections::BTreeSet;
use std::io;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const CHANGE_POLL_TICKS: u64 = 8;
const MAX_COLUMN_WIDTH: usize = 32;
const SIDEBAR_WIDTH: u16 = 22;
const SELECTED_MARK: &str = "●";
const UNSELECTED_MARK: &str = "○";
const PIN_MARK: &str = "▪";
const SUBMENU_ARROW: &str = "›";

/// Backend seam the event loop drives. Implemented over the local store and
/// the hosted API.
pub trait AppRuntime {
    fn permissions(&mut self) -> Result<Permissions>;
    fn load_lookups(&mut self) -> Result<Lookups>;
    fn load_custom_columns(&mut self, table: &str) -> Result<Vec<CustomColumn>>;
    fn load_parts(&mut self, query: &ListQuery) -> Result<Page<Part>>;
    fn load_employees(&mut self, query: &ListQuery) -> Result<Page<Employee>>;
    fn bulk_update(&mut self, request: &BulkUpdateRequest) -> Result<UpdateResponse>;
    fn delete(&mut self, request: &DeleteRequest) -> Result<()>;
    fn submit_modal(&mut self, action: &ModalAction) -> Result<UpdateResponse>;
    fn load_user_permissions(&mut self, employee_id: &EmployeeId) -> Result<BTreeSet<Capability>>;
    fn load_part_edit(&mut self, item_id: &ItemId) -> Result<PartEditView>;
    fn save_part(
        &mut self,
        item_id: &ItemId,
        fields: &[(String, String)],
        origin: FormOrigin,
    ) -> Result<ActionResult>;
    fn load_part_details(&mut self, item_id: &ItemId) -> Result<PartDetailsView>;
    fn poll_changes(&mut self, since: u64) -> Result<Vec<ChangeEvent>>;
    fn logout(&mut self) -> Result<()>;

    fn page_size(&self) -> usize {
        DEFAULT_PAGE_SIZE
    }
}

/// Where the part form was opened; each posts to its own page action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOrigin {
    EditPage,
    DetailsPane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TableProjection {
    title: String,
    headers: Vec<String>,
    column_ids: Vec<String>,
    rows: Vec<RowProjection>,
    footer: String,
    selectable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RowProjection {
    id: String,
    selected: bool,
    cells: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct MenuUiState {
    title: String,
    lines: Vec<String>,
    items: Vec<MenuItem>,
    cursor: usize,
}

impl MenuUiState {
    /// Flattens submenus into `Group › Item` lines.
    fn from_entries(title: impl Into<String>, entries: &[MenuEntry]) -> Self {
        let mut lines = Vec::new();
        let mut items = Vec::new();
        for entry in entries {
            match entry {
                MenuEntry::Item(item) => {
                    lines.push(item.label.clone());
                    items.push(item.clone());
                }
                MenuEntry::Submenu {
                    label,
                    items: children,
                } => {
                    for child in children {
                        lines.push(format!("{label} {SUBMENU_ARROW} {}", child.label));
                        items.push(child.clone());
                    }
                }
                MenuEntry::Separator => {}
            }
        }
        Self {
            title: title.into(),
            lines,
            items,
            cursor: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct PermissionPicker {
    granted: BTreeSet<Capability>,
    cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormFieldKind {
    Text,
    Choice(Vec<String>),
    Toggle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormField {
    key: String,
    label: String,
    value: String,
    kind: FormFieldKind,
}

impl FormField {
    fn text(key: &str, label: &str, value: &str) -> Self {
        Self {
            key: key.to_owned(),
            label: label.to_owned(),
            value: value.to_owned(),
            kind: FormFieldKind::Text,
        }
    }

    fn choice(key: &str, label: &str, value: &str, options: &[&str]) -> Self {
        Self {
            key: key.to_owned(),
            label: label.to_owned(),
            value: value.to_owned(),
            kind: FormFieldKind::Choice(options.iter().map(|option| (*option).to_owned()).collect()),
        }
    }

    fn cycle(&mut self, delta: isize) {
        let FormFieldKind::Choice(options) = &self.kind else {
            return;
        };
        if options.is_empty() {
            return;
        }
        let len = options.len() as isize;
        let next = match options.iter().position(|option| *option == self.value) {
            Some(index) => (index as isize + delta).rem_euclid(len),
            None => 0,
        };
        self.value = options[next as usize].clone();
    }

    fn flip(&mut self) {
        self.value = if self.value == "true" { "false" } else { "true" }.to_owned();
    }
}

#[derive(Debug, Clone)]
struct PartFormUiState {
    item_id: ItemId,
    origin: FormOrigin,
    title: String,
    attachments: Vec<String>,
    fields: Vec<FormField>,
    cursor: usize,
    errors: FormErrors,
}

impl PartFormUiState {
    fn new(edit: &PartEditView, custom: &[CustomColumn], origin: FormOrigin) -> Self {
        let input = PartFormInput::from_part(&edit.part);
        let replenishment: Vec<&str> = ReplenishmentSystem::ALL.iter().map(|value| value.as_str()).collect();
        let methods: Vec<&str> = MethodType::ALL.iter().map(|value| value.as_str()).collect();
        let tracking: Vec<&str> = TrackingType::ALL.iter().map(|value| value.as_str()).collect();

        let mut fields = vec![
            FormField::text("name", "Name", &input.name),
            FormField::text("description", "Description", &input.description),
            FormField::choice(
                "replenishmentSystem",
                "Replenishment",
                input.replenishment_system.as_str(),
                &replenishment,
            ),
            FormField::choice(
                "defaultMethodType",
                "Default Method Type",
                input.default_method_type.as_str(),
                &methods,
            ),
            FormField::choice(
                "itemTrackingType",
                "Tracking Type",
                input.item_tracking_type.as_str(),
                &tracking,
            ),
            FormField {
                key: "active".to_owned(),
                label: "Active".to_owned(),
                value: input.active.to_string(),
                kind: FormFieldKind::Toggle,
            },
        ];
        for column in custom {
            let value = input
                .custom_fields
                .get(&column.id)
                .map(FieldValue::as_query_literal)
                .unwrap_or_default();
            let kind = match &column.kind {
                CustomColumnKind::List(options) => FormFieldKind::Choice(options.clone()),
                CustomColumnKind::Boolean => FormFieldKind::Toggle,
                _ => FormFieldKind::Text,
            };
            fields.push(FormField {
                key: format!("custom-{}", column.id),
                label: column.header.clone(),
                value,
                kind,
            });
        }

        let mut attachments = Vec::new();
        if let Some(serial) = edit.serial_number.as_deref().filter(|serial| !serial.is_empty()) {
            attachments.push(format!("serial: {serial}"));
        }
        if let Some(name) = &edit.barcode_file_name {
            attachments.push(format!("barcode: {name}"));
        }
        if let Some(name) = &edit.model_file_name {
            attachments.push(format!("cad model: {name}"));
        }

        Self {
            item_id: edit.part.id.clone(),
            origin,
            title: format!("edit {} ({})", edit.part.name, edit.part.readable_id_with_revision),
            attachments,
            fields,
            cursor: 0,
            errors: FormErrors::new(),
        }
    }

    fn to_form(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|field| (field.key.clone(), field.value.clone()))
            .collect()
    }

    fn current(&mut self) -> Option<&mut FormField> {
        self.fields.get_mut(self.cursor)
    }
}

enum FormKeyAction {
    Stay,
    Submit,
    Cancel,
}

/// Change-log position per table. Adopting a page moves only its own table,
/// so polling starts from whichever table is further behind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct FeedCursor {
    parts: u64,
    employees: u64,
}

impl FeedCursor {
    fn since(self) -> u64 {
        self.parts.min(self.employees)
    }

    fn advance(&mut self, revision: u64) {
        self.parts = self.parts.max(revision);
        self.employees = self.employees.max(revision);
    }
}

struct ViewData {
    permissions: Permissions,
    parts: ListController<PartsTable>,
    employees: ListController<EmployeesTable>,
    part_custom_columns: Vec<CustomColumn>,
    feed: ChangeFeed,
    feed_cursor: FeedCursor,
    projection: TableProjection,
    cursor_row: usize,
    cursor_col: usize,
    sidebar_cursor: usize,
    menu: MenuUiState,
    confirm_input: String,
    picker: PermissionPicker,
    form: Option<PartFormUiState>,
    details: Option<PartDetailsView>,
    help_visible: bool,
    status_token: u64,
    ticks: u64,
}

impl ViewData {
    fn new(permissions: Permissions, page_size: usize) -> Self {
        let oracle: Rc<dyn PermissionOracle> = Rc::new(permissions.clone());
        let query = ListQuery::with_limit(page_size);
        let feed = ChangeFeed::new();
        let mut parts = ListController::new(Rc::clone(&oracle), query.clone());
        let mut employees = ListController::new(oracle, query);
        parts.subscribe(&feed);
        employees.subscribe(&feed);
        Self {
            permissions,
            parts,
            employees,
            part_custom_columns: Vec::new(),
            feed,
            feed_cursor: FeedCursor::default(),
            projection: TableProjection::default(),
            cursor_row: 0,
            cursor_col: 0,
            sidebar_cursor: 0,
            menu: MenuUiState::default(),
            confirm_input: String::new(),
            picker: PermissionPicker::default(),
            form: None,
            details: None,
            help_visible: false,
            status_token: 0,
            ticks: 0,
        }
    }
}

/// Runs `$body` with `$list` bound to the active module's controller.
macro_rules! with_list {
    ($state:expr, $view:expr, $list:ident => $body:expr) => {
        match $state.active_module {
            ModuleKind::Parts => {
                let $list = &mut $view.parts;
                $body
            }
            ModuleKind::Employees => {
                let $list = &mut $view.employees;
                $body
            }
        }
    };
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    let permissions = runtime.permissions().context("load caller permissions")?;
    let mut view_data = ViewData::new(permissions, runtime.page_size());
    let (internal_tx, internal_rx) = mpsc::channel();

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    if !module_allowed(&view_data.permissions, state.active_module)
        && let Some(first) = ModuleKind::ALL
            .into_iter()
            .find(|module| module_allowed(&view_data.permissions, *module))
    {
        state.dispatch(AppCommand::OpenModule(first));
    }

    if let Err(error) = load_reference_data(runtime, &mut view_data)
        .and_then(|()| reload_active(state, runtime, &mut view_data))
    {
        state.set_status(&format!("load failed: {error:#}"));
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &view_data, &internal_rx);
        poll_tick(runtime, &mut view_data);
        sync_projection(state, &mut view_data);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    view_data.parts.teardown();
    view_data.employees.teardown();
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(state: &mut AppState, view_data: &ViewData, rx: &Receiver<InternalEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.set_status(&message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn toast_text(toast: &Toast) -> String {
    if toast.is_error() {
        format!("error: {}", toast.message)
    } else {
        toast.message.clone()
    }
}

/// Moves queued controller toasts to the status line. Returns whether any
/// were shown.
fn flush_toasts(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) -> bool {
    let toasts = with_list!(state, view_data, list => list.take_toasts());
    if toasts.is_empty() {
        return false;
    }
    let message = toasts.iter().map(toast_text).collect::<Vec<_>>().join("; ");
    emit_status(state, view_data, internal_tx, message);
    true
}

fn module_allowed(permissions: &Permissions, module: ModuleKind) -> bool {
    let path = module.path();
    navigation::modules(permissions)
        .iter()
        .any(|item| item.to == path)
}

fn load_reference_data<R: AppRuntime>(runtime: &mut R, view_data: &mut ViewData) -> Result<()> {
    let lookups = runtime.load_lookups().context("load lookups")?;
    view_data.part_custom_columns = runtime
        .load_custom_columns(PartsTable::TABLE)
        .context("load part custom columns")?;
    let employee_columns = runtime
        .load_custom_columns(EmployeesTable::TABLE)
        .context("load employee custom columns")?;
    view_data
        .parts
        .set_custom_columns(view_data.part_custom_columns.clone());
    view_data.employees.set_custom_columns(employee_columns);
    view_data.parts.set_lookups(lookups.clone());
    view_data.employees.set_lookups(lookups);
    Ok(())
}

fn reload_active<R: AppRuntime>(
    state: &AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    let result = match state.active_module {
        ModuleKind::Parts => {
            let query = view_data.parts.begin_reload();
            let page = runtime.load_parts(&query);
            adopt(&mut view_data.parts, page, &mut view_data.feed_cursor.parts)
        }
        ModuleKind::Employees => {
            let query = view_data.employees.begin_reload();
            let page = runtime.load_employees(&query);
            adopt(&mut view_data.employees, page, &mut view_data.feed_cursor.employees)
        }
    };
    sync_projection(state, view_data);
    result
}

fn adopt<S: TableSpec>(
    list: &mut ListController<S>,
    page: Result<Page<S::Row>>,
    feed_revision: &mut u64,
) -> Result<()> {
    let page = match page {
        Ok(page) => page,
        Err(error) => {
            list.abort_reload();
            return Err(error.context(format!("load {}", S::TITLE.to_lowercase())));
        }
    };
    *feed_revision = (*feed_revision).max(page.revision);
    if let Err(error) = list.adopt_page(page) {
        list.abort_reload();
        return Err(error.into());
    }
    Ok(())
}

fn poll_tick<R: AppRuntime>(runtime: &mut R, view_data: &mut ViewData) {
    view_data.ticks = view_data.ticks.wrapping_add(1);
    if view_data.ticks % CHANGE_POLL_TICKS != 0 {
        return;
    }
    if let Err(error) = pump_changes(runtime, view_data) {
        warn!(error = %format!("{error:#}"), "change poll failed");
    }
}

/// Pulls new change-log entries and fans them out to both list views.
fn pump_changes<R: AppRuntime>(runtime: &mut R, view_data: &mut ViewData) -> Result<usize> {
    let events = runtime.poll_changes(view_data.feed_cursor.since())?;
    for event in &events {
        view_data.feed_cursor.advance(event.revision);
        view_data.feed.publish(event);
    }
    let applied = view_data.parts.pump().len() + view_data.employees.pump().len();
    if !events.is_empty() {
        debug!(events = events.len(), applied, "change poll");
    }
    Ok(events.len())
}

fn sync_projection(state: &AppState, view_data: &mut ViewData) {
    let projection = with_list!(state, view_data, list => project(list));
    view_data.projection = projection.unwrap_or_else(|error| TableProjection {
        title: state.active_module.title().to_owned(),
        footer: format!("columns unavailable: {error}"),
        ..TableProjection::default()
    });
    clamp_cursor(view_data);
}

fn project<S: TableSpec>(list: &mut ListController<S>) -> Result<TableProjection, ListError> {
    let columns = list.visible_columns()?;
    let headers = columns
        .iter()
        .map(|column| {
            if list.is_pinned(&column.id) {
                format!("{PIN_MARK}{}", column.header)
            } else {
                column.header.clone()
            }
        })
        .collect();
    let column_ids = columns.iter().map(|column| column.id.clone()).collect();
    let rows = list
        .rows()
        .iter()
        .map(|row| {
            let id = row.row_id();
            RowProjection {
                selected: list.is_selected(&id),
                cells: columns
                    .iter()
                    .map(|column| column.cell(row, list.lookups()).display())
                    .collect(),
                id,
            }
        })
        .collect();

    let mut footer = format!(
        "page {}/{} · {} rows",
        list.page_index() + 1,
        list.page_count(),
        list.count()
    );
    if !list.selection().is_empty() {
        footer.push_str(&format!(" · {} selected", list.selection().len()));
    }
    if list.is_loading() {
        footer.push_str(" · loading");
    }

    Ok(TableProjection {
        title: list.title().to_owned(),
        headers,
        column_ids,
        rows,
        footer,
        selectable: list.selectable(),
    })
}

fn clamp_cursor(view_data: &mut ViewData) {
    let rows = view_data.projection.rows.len();
    let cols = view_data.projection.column_ids.len();
    view_data.cursor_row = view_data.cursor_row.min(rows.saturating_sub(1));
    view_data.cursor_col = view_data.cursor_col.min(cols.saturating_sub(1));
}

fn move_row(view_data: &mut ViewData, delta: isize) {
    let rows = view_data.projection.rows.len();
    if rows == 0 {
        return;
    }
    let next = (view_data.cursor_row as isize + delta).clamp(0, rows as isize - 1);
    view_data.cursor_row = next as usize;
}

fn move_col(view_data: &mut ViewData, delta: isize) {
    let cols = view_data.projection.column_ids.len();
    if cols == 0 {
        return;
    }
    let next = (view_data.cursor_col as isize + delta).clamp(0, cols as isize - 1);
    view_data.cursor_col = next as usize;
}

fn current_row_id(view_data: &ViewData) -> Option<String> {
    view_data
        .projection
        .rows
        .get(view_data.cursor_row)
        .map(|row| row.id.clone())
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    let quit = match state.mode {
        AppMode::Table => handle_table_key(state, runtime, view_data, internal_tx, key),
        AppMode::Sidebar => {
            handle_sidebar_key(state, runtime, view_data, internal_tx, key);
            false
        }
        AppMode::ContextMenu | AppMode::BulkMenu => {
            handle_menu_key(state, runtime, view_data, internal_tx, key)
        }
        AppMode::ConfirmDelete => {
            handle_confirm_key(state, runtime, view_data, internal_tx, key);
            false
        }
        AppMode::Modal => {
            handle_modal_key(state, runtime, view_data, internal_tx, key);
            false
        }
        AppMode::PartForm => {
            handle_form_key(state, runtime, view_data, internal_tx, key);
            false
        }
        AppMode::Details => {
            handle_details_key(state, runtime, view_data, internal_tx, key);
            false
        }
    };
    sync_projection(state, view_data);
    quit
}

fn handle_table_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE) => return true,
        (KeyCode::Char('?'), _) => view_data.help_visible = true,
        (KeyCode::Char('j') | KeyCode::Down, _) => move_row(view_data, 1),
        (KeyCode::Char('k') | KeyCode::Up, _) => move_row(view_data, -1),
        (KeyCode::Char('h') | KeyCode::Left, _) => move_col(view_data, -1),
        (KeyCode::Char('l') | KeyCode::Right, _) => move_col(view_data, 1),
        (KeyCode::Tab, _) => rotate_module(state, runtime, view_data, internal_tx, 1),
        (KeyCode::BackTab, _) => rotate_module(state, runtime, view_data, internal_tx, -1),
        (KeyCode::Char('s'), KeyModifiers::NONE) => {
            view_data.sidebar_cursor = 0;
            state.dispatch(AppCommand::ToggleSidebar);
        }
        (KeyCode::Char(' '), _) => toggle_current_selection(state, view_data, internal_tx),
        (KeyCode::Char('a'), KeyModifiers::NONE) => toggle_select_all(state, view_data, internal_tx),
        (KeyCode::Enter, _) => open_context_menu(state, view_data, internal_tx),
        (KeyCode::Char('b'), KeyModifiers::NONE) => open_bulk_menu(state, view_data, internal_tx),
        (KeyCode::Char(']'), _) => change_page(state, runtime, view_data, internal_tx, true),
        (KeyCode::Char('['), _) => change_page(state, runtime, view_data, internal_tx, false),
        (KeyCode::Char('c'), KeyModifiers::NONE) => {
            toggle_current_column(state, view_data, internal_tx);
        }
        (KeyCode::Char('C'), _) => {
            with_list!(state, view_data, list => list.show_all_columns());
            emit_status(state, view_data, internal_tx, "all columns shown");
        }
        (KeyCode::Char('R'), _) => {
            with_list!(state, view_data, list => list.reset_columns());
            emit_status(state, view_data, internal_tx, "columns reset");
        }
        (KeyCode::Char('p'), KeyModifiers::NONE) => toggle_current_pin(state, view_data, internal_tx),
        (KeyCode::Char('r'), KeyModifiers::NONE) => {
            match reload_active(state, runtime, view_data) {
                Ok(()) => emit_status(state, view_data, internal_tx, "reloaded"),
                Err(error) => emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("load failed: {error:#}"),
                ),
            }
        }
        (KeyCode::Char('n'), KeyModifiers::NONE) => {
            let action = with_list!(state, view_data, list => list.primary_action());
            match action {
                Some(action) => return follow_link(state, runtime, view_data, internal_tx, &action.to),
                None => emit_status(state, view_data, internal_tx, "nothing to create here"),
            }
        }
        (KeyCode::Char('L'), _) => return logout(state, runtime, view_data, internal_tx),
        _ => {}
    }
    false
}

fn rotate_module<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    delta: isize,
) {
    let modules = ModuleKind::ALL;
    let current = modules
        .iter()
        .position(|module| *module == state.active_module)
        .unwrap_or(0) as isize;
    let len = modules.len() as isize;
    for step in 1..len {
        let next = modules[(current + delta * step).rem_euclid(len) as usize];
        if module_allowed(&view_data.permissions, next) {
            open_module(state, runtime, view_data, internal_tx, next);
            return;
        }
    }
    emit_status(state, view_data, internal_tx, "no other module available");
}

fn open_module<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    module: ModuleKind,
) {
    if !module_allowed(&view_data.permissions, module) {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("no access to {}", module.title().to_lowercase()),
        );
        return;
    }
    state.dispatch(AppCommand::OpenModule(module));
    view_data.cursor_row = 0;
    view_data.cursor_col = 0;
    if let Err(error) = reload_active(state, runtime, view_data) {
        emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
    }
}

fn toggle_current_selection(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(id) = current_row_id(view_data) else {
        return;
    };
    let toggled = with_list!(state, view_data, list => list.toggle_selected(&id));
    if !toggled {
        emit_status(
            state,
            view_data,
            internal_tx,
            "selecting rows needs update permission",
        );
    }
}

fn toggle_select_all(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if !view_data.projection.selectable {
        emit_status(
            state,
            view_data,
            internal_tx,
            "selecting rows needs update permission",
        );
        return;
    }
    with_list!(state, view_data, list => {
        if !list.selection().is_empty() && list.selection().len() == list.rows().len() {
            list.clear_selection();
        } else {
            list.select_all();
        }
    });
}

fn open_context_menu(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(id) = current_row_id(view_data) else {
        emit_status(state, view_data, internal_tx, "no row under the cursor");
        return;
    };
    let Some(entries) = with_list!(state, view_data, list => list.context_menu(&id)) else {
        return;
    };
    open_menu(state, view_data, internal_tx, "actions", &entries, AppMode::ContextMenu);
}

fn open_bulk_menu(state: &mut AppState, view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    let (entries, selected) = with_list!(state, view_data, list => (list.bulk_menu(), list.selection().len()));
    if selected == 0 {
        emit_status(state, view_data, internal_tx, "select rows first (space)");
        return;
    }
    let title = format!("{selected} selected");
    open_menu(state, view_data, internal_tx, &title, &entries, AppMode::BulkMenu);
}

fn open_menu(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    title: &str,
    entries: &[MenuEntry],
    mode: AppMode,
) {
    let menu = MenuUiState::from_entries(title, entries);
    if menu.items.is_empty() {
        emit_status(state, view_data, internal_tx, "no actions available");
        return;
    }
    view_data.menu = menu;
    state.dispatch(AppCommand::Enter(mode));
}

fn handle_menu_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Esc => {
            view_data.menu = MenuUiState::default();
            state.dispatch(AppCommand::ExitToTable);
        }
        KeyCode::Char('j') | KeyCode::Down => {
            let last = view_data.menu.items.len().saturating_sub(1);
            view_data.menu.cursor = (view_data.menu.cursor + 1).min(last);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.menu.cursor = view_data.menu.cursor.saturating_sub(1);
        }
        KeyCode::Enter => {
            let Some(item) = view_data.menu.items.get(view_data.menu.cursor).cloned() else {
                return false;
            };
            view_data.menu = MenuUiState::default();
            state.dispatch(AppCommand::ExitToTable);
            return activate_item(state, runtime, view_data, internal_tx, &item);
        }
        _ => {}
    }
    false
}

fn activate_item<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    item: &MenuItem,
) -> bool {
    let outcome = with_list!(state, view_data, list => list.activate(item));
    match outcome {
        ActionOutcome::Navigate(to) => {
            return follow_link(state, runtime, view_data, internal_tx, &to);
        }
        ActionOutcome::ConfirmOpened => {
            view_data.confirm_input.clear();
            state.dispatch(AppCommand::Enter(AppMode::ConfirmDelete));
        }
        ActionOutcome::ModalOpened(kind) => open_modal(state, runtime, view_data, internal_tx, kind),
        ActionOutcome::BulkSubmitted(request) => {
            info!(
                field = %request.field,
                value = %request.value,
                rows = request.identifiers.len(),
                "submitting bulk update"
            );
            let result = runtime.bulk_update(&request);
            with_list!(state, view_data, list => list.finish_bulk(result));
            after_mutation(state, runtime, view_data, internal_tx);
        }
        ActionOutcome::Blocked => {
            if !flush_toasts(state, view_data, internal_tx) {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("{} is unavailable", item.label),
                );
            }
        }
    }
    false
}

/// Reloads the page so server-side values replace stale ones, then shows
/// whatever the controller reported.
fn after_mutation<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let reloaded = reload_active(state, runtime, view_data);
    flush_toasts(state, view_data, internal_tx);
    if let Err(error) = reloaded {
        emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
    }
}

fn follow_link<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    to: &str,
) -> bool {
    match Route::parse(to) {
        Some(Route::EditPart(id)) => {
            open_part_form(
                state,
                runtime,
                view_data,
                internal_tx,
                &ItemId::new(id),
                FormOrigin::EditPage,
            );
        }
        Some(Route::Part(id) | Route::PartDetails(id)) => {
            open_part_details(state, runtime, view_data, internal_tx, &ItemId::new(id));
        }
        Some(Route::Parts) => open_module(state, runtime, view_data, internal_tx, ModuleKind::Parts),
        Some(Route::Employees) => {
            open_module(state, runtime, view_data, internal_tx, ModuleKind::Employees);
        }
        Some(Route::EmployeeAccount(id)) => {
            let can_update = view_data
                .permissions
                .can(Verb::Update, Resource::Users);
            let item = MenuItem::new(
                "Edit Permissions",
                MenuCommand::OpenModal {
                    kind: ModalKind::EditPermissions,
                    targets: vec![id],
                },
            )
            .enabled_if(can_update);
            return activate_item(state, runtime, view_data, internal_tx, &item);
        }
        Some(Route::Root) => {
            state.dispatch(AppCommand::ExitToTable);
        }
        Some(Route::Logout) => return logout(state, runtime, view_data, internal_tx),
        Some(Route::NewPart | Route::NewEmployee) | None => {
            debug!(to, "link has no terminal view");
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("{to} is only available in the web app"),
            );
        }
    }
    false
}

fn logout<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) -> bool {
    match runtime.logout() {
        Ok(()) => {
            info!(to = %paths::root(), "logged out");
            true
        }
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("logout failed: {error:#}"));
            false
        }
    }
}

fn handle_sidebar_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let links = navigation::modules(&view_data.permissions);
    match key.code {
        KeyCode::Esc | KeyCode::Char('s') => {
            state.dispatch(AppCommand::ExitToTable);
        }
        KeyCode::Char('j') | KeyCode::Down => {
            view_data.sidebar_cursor = (view_data.sidebar_cursor + 1).min(links.len().saturating_sub(1));
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.sidebar_cursor = view_data.sidebar_cursor.saturating_sub(1);
        }
        KeyCode::Enter => {
            let Some(link) = links.get(view_data.sidebar_cursor) else {
                return;
            };
            let to = state.sidebar.follow(link);
            match ModuleKind::from_path(&to) {
                Some(module) => open_module(state, runtime, view_data, internal_tx, module),
                None => {
                    state.dispatch(AppCommand::ExitToTable);
                }
            }
        }
        _ => {}
    }
}

fn handle_confirm_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            with_list!(state, view_data, list => list.cancel_delete());
            view_data.confirm_input.clear();
            state.dispatch(AppCommand::ExitToTable);
        }
        KeyCode::Backspace => {
            view_data.confirm_input.pop();
        }
        KeyCode::Enter => {
            let accepted = with_list!(state, view_data, list => list
                .delete_dialog()
                .current()
                .map(|confirm| confirm.accepts(&view_data.confirm_input)));
            match accepted {
                None => {
                    state.dispatch(AppCommand::ExitToTable);
                }
                Some(false) => {
                    emit_status(state, view_data, internal_tx, "type the name exactly to confirm");
                }
                Some(true) => {
                    let request = with_list!(state, view_data, list => list.confirm_delete());
                    view_data.confirm_input.clear();
                    state.dispatch(AppCommand::ExitToTable);
                    if let Some(request) = request {
                        info!(id = %request.id, action = %request.action, "deleting row");
                        let result = runtime.delete(&request);
                        with_list!(state, view_data, list => list.finish_delete(result));
                        after_mutation(state, runtime, view_data, internal_tx);
                    }
                }
            }
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.confirm_input.push(ch);
        }
        _ => {}
    }
}

fn open_modal<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: ModalKind,
) {
    view_data.picker = PermissionPicker::default();
    if kind == ModalKind::EditPermissions {
        let targets = with_list!(state, view_data, list => list.modal().targets().to_vec());
        if let [target] = targets.as_slice() {
            match runtime.load_user_permissions(&EmployeeId::new(target.clone())) {
                Ok(granted) => view_data.picker.granted = granted,
                Err(error) => emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("load permissions failed: {error:#}"),
                ),
            }
        }
    }
    state.dispatch(AppCommand::Enter(AppMode::Modal));
}

fn handle_modal_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(kind) = with_list!(state, view_data, list => list.modal().kind()) else {
        state.dispatch(AppCommand::ExitToTable);
        return;
    };
    let picking = kind == ModalKind::EditPermissions;
    let capabilities: Vec<Capability> = Capability::all().collect();
    match key.code {
        KeyCode::Esc => {
            if let Err(error) = with_list!(state, view_data, list => list.cancel_modal()) {
                debug!(%error, "modal cancel ignored");
                return;
            }
            state.dispatch(AppCommand::ExitToTable);
        }
        KeyCode::Char('j') | KeyCode::Down if picking => {
            let last = capabilities.len().saturating_sub(1);
            view_data.picker.cursor = (view_data.picker.cursor + 1).min(last);
        }
        KeyCode::Char('k') | KeyCode::Up if picking => {
            view_data.picker.cursor = view_data.picker.cursor.saturating_sub(1);
        }
        KeyCode::Char(' ') if picking => {
            if let Some(capability) = capabilities.get(view_data.picker.cursor) {
                if !view_data.picker.granted.remove(capability) {
                    view_data.picker.granted.insert(*capability);
                }
            }
        }
        KeyCode::Enter => submit_modal(state, runtime, view_data, internal_tx),
        _ => {}
    }
}

fn submit_modal<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let action = match with_list!(state, view_data, list => list.submit_modal()) {
        Ok(action) => action,
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("cannot submit: {error}"));
            return;
        }
    };
    let action = if action.kind == ModalKind::EditPermissions {
        action.with_capabilities(view_data.picker.granted.iter().copied())
    } else {
        action
    };
    info!(kind = action.kind.as_str(), targets = action.identifiers.len(), "submitting modal");
    let result = runtime.submit_modal(&action);
    with_list!(state, view_data, list => list.finish_modal(result));

    let still_open = with_list!(state, view_data, list => list.modal().is_open());
    if still_open {
        flush_toasts(state, view_data, internal_tx);
        return;
    }
    state.dispatch(AppCommand::ExitToTable);
    after_mutation(state, runtime, view_data, internal_tx);
}

fn open_part_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    item_id: &ItemId,
    origin: FormOrigin,
) {
    if !view_data.permissions.can(Verb::Update, Resource::Parts) {
        emit_status(state, view_data, internal_tx, "editing parts needs update:parts");
        return;
    }
    match runtime.load_part_edit(item_id) {
        Ok(edit) => {
            view_data.details = None;
            view_data.form = Some(PartFormUiState::new(
                &edit,
                &view_data.part_custom_columns,
                origin,
            ));
            state.dispatch(AppCommand::Enter(AppMode::PartForm));
        }
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("load part failed: {error:#}"),
        ),
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.form.as_mut() else {
        state.dispatch(AppCommand::ExitToTable);
        return;
    };
    let len = form.fields.len().max(1);
    let action = match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => FormKeyAction::Cancel,
        (KeyCode::Char('s'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            FormKeyAction::Submit
        }
        (KeyCode::Enter, _) => FormKeyAction::Submit,
        (KeyCode::Tab | KeyCode::Down, _) => {
            form.cursor = (form.cursor + 1) % len;
            FormKeyAction::Stay
        }
        (KeyCode::BackTab | KeyCode::Up, _) => {
            form.cursor = (form.cursor + len - 1) % len;
            FormKeyAction::Stay
        }
        (KeyCode::Left, _) => {
            if let Some(field) = form.current() {
                field.cycle(-1);
            }
            FormKeyAction::Stay
        }
        (KeyCode::Right, _) => {
            if let Some(field) = form.current() {
                field.cycle(1);
            }
            FormKeyAction::Stay
        }
        (KeyCode::Backspace, _) => {
            if let Some(field) = form.current()
                && field.kind == FormFieldKind::Text
            {
                field.value.pop();
            }
            FormKeyAction::Stay
        }
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(field) = form.current() {
                match field.kind {
                    FormFieldKind::Text => field.value.push(ch),
                    FormFieldKind::Toggle if ch == ' ' => field.flip(),
                    _ => {}
                }
            }
            FormKeyAction::Stay
        }
        _ => FormKeyAction::Stay,
    };

    match action {
        FormKeyAction::Stay => {}
        FormKeyAction::Cancel => {
            view_data.form = None;
            state.dispatch(AppCommand::ExitToTable);
            emit_status(state, view_data, internal_tx, "edit cancelled");
        }
        FormKeyAction::Submit => submit_part_form(state, runtime, view_data, internal_tx),
    }
}

fn submit_part_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.form.as_ref() else {
        return;
    };
    let item_id = form.item_id.clone();
    let origin = form.origin;
    let fields = form.to_form();
    match runtime.save_part(&item_id, &fields, origin) {
        Ok(ActionResult::Invalid(errors)) => {
            let summary = errors
                .iter()
                .map(|(field, message)| format!("{field}: {message}"))
                .collect::<Vec<_>>()
                .join("; ");
            if let Some(form) = view_data.form.as_mut() {
                form.errors = errors;
            }
            emit_status(state, view_data, internal_tx, summary);
        }
        Ok(ActionResult::Redirect { to, flash }) => {
            view_data.form = None;
            state.dispatch(AppCommand::ExitToTable);
            if let Err(error) = reload_active(state, runtime, view_data) {
                warn!(error = %format!("{error:#}"), "reload after save failed");
            }
            follow_link(state, runtime, view_data, internal_tx, &to);
            let message = match flash {
                Some(flash) => toast_text(&flash),
                None => format!("saved {item_id}"),
            };
            emit_status(state, view_data, internal_tx, message);
        }
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("save failed: {error:#}"),
        ),
    }
}

fn open_part_details<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    item_id: &ItemId,
) {
    match runtime.load_part_details(item_id) {
        Ok(details) => {
            view_data.details = Some(details);
            state.dispatch(AppCommand::Enter(AppMode::Details));
        }
        Err(error) => emit_status(
            state,
            view_data,
            internal_tx,
            format!("load part failed: {error:#}"),
        ),
    }
}

fn handle_details_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => {
            view_data.details = None;
            state.dispatch(AppCommand::ExitToTable);
        }
        KeyCode::Char('e') => {
            let Some(item_id) = view_data.details.as_ref().map(|details| details.summary.id.clone())
            else {
                return;
            };
            open_part_form(
                state,
                runtime,
                view_data,
                internal_tx,
                &item_id,
                FormOrigin::DetailsPane,
            );
        }
        _ => {}
    }
}

fn change_page<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    forward: bool,
) {
    let moved = with_list!(state, view_data, list => {
        if forward { list.next_page() } else { list.prev_page() }
    });
    if !moved {
        emit_status(state, view_data, internal_tx, "no more pages");
        return;
    }
    view_data.cursor_row = 0;
    if let Err(error) = reload_active(state, runtime, view_data) {
        emit_status(state, view_data, internal_tx, format!("load failed: {error:#}"));
    }
}

fn toggle_current_column(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(id) = view_data.projection.column_ids.get(view_data.cursor_col).cloned() else {
        return;
    };
    if view_data.projection.column_ids.len() == 1 {
        emit_status(state, view_data, internal_tx, "cannot hide the last column");
        return;
    }
    with_list!(state, view_data, list => list.toggle_column(&id));
    emit_status(state, view_data, internal_tx, format!("{id} hidden (C shows all)"));
}

fn toggle_current_pin(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(id) = view_data.projection.column_ids.get(view_data.cursor_col).cloned() else {
        return;
    };
    let pinned = with_list!(state, view_data, list => {
        list.toggle_pin(&id);
        list.is_pinned(&id)
    });
    let message = if pinned {
        format!("{id} pinned")
    } else {
        format!("{id} unpinned")
    };
    emit_status(state, view_data, internal_tx, message);
}

fn active_modal<'a>(state: &AppState, view_data: &'a ViewData) -> &'a ModalState {
    match state.active_module {
        ModuleKind::Parts => view_data.parts.modal(),
        ModuleKind::Employees => view_data.employees.modal(),
    }
}

fn active_confirm<'a>(state: &AppState, view_data: &'a ViewData) -> Option<&'a ConfirmDelete> {
    match state.active_module {
        ModuleKind::Parts => view_data.parts.delete_dialog().current(),
        ModuleKind::Employees => view_data.employees.delete_dialog().current(),
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let selected = ModuleKind::ALL
        .iter()
        .position(|module| *module == state.active_module)
        .unwrap_or(0);
    let titles = ModuleKind::ALL
        .iter()
        .map(|module| module.title().to_owned())
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(Block::default().title("erp").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    let body = if state.sidebar.expanded {
        let split = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)])
            .split(layout[1]);
        let sidebar = Paragraph::new(render_sidebar_text(state, view_data))
            .block(Block::default().title("modules").borders(Borders::ALL));
        frame.render_widget(sidebar, split[0]);
        split[1]
    } else {
        layout[1]
    };
    render_table(frame, body, view_data);

    let status_widget = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    match state.mode {
        AppMode::ContextMenu | AppMode::BulkMenu => {
            render_overlay(
                frame,
                (40, 40),
                &view_data.menu.title,
                render_menu_overlay_text(&view_data.menu),
            );
        }
        AppMode::ConfirmDelete => {
            if let Some(confirm) = active_confirm(state, view_data) {
                render_overlay(
                    frame,
                    (56, 30),
                    "delete",
                    render_confirm_overlay_text(confirm, &view_data.confirm_input),
                );
            }
        }
        AppMode::Modal => {
            let modal = active_modal(state, view_data);
            if let Some(kind) = modal.kind() {
                render_overlay(
                    frame,
                    (56, 60),
                    kind.title(),
                    render_modal_overlay_text(kind, modal, &view_data.picker),
                );
            }
        }
        AppMode::PartForm => {
            if let Some(form) = &view_data.form {
                render_overlay(frame, (70, 70), &form.title, render_form_overlay_text(form));
            }
        }
        AppMode::Details => {
            if let Some(details) = &view_data.details {
                render_overlay(
                    frame,
                    (70, 70),
                    &details.summary.readable_id_with_revision,
                    render_details_overlay_text(details),
                );
            }
        }
        AppMode::Table | AppMode::Sidebar => {}
    }

    if view_data.help_visible {
        render_overlay(frame, (80, 60), "help", help_overlay_text().to_owned());
    }
}

fn render_overlay(frame: &mut ratatui::Frame<'_>, size: (u16, u16), title: &str, text: String) {
    let area = centered_rect(size.0, size.1, frame.area());
    frame.render_widget(Clear, area);
    let widget = Paragraph::new(text).block(
        Block::default()
            .title(title.to_owned())
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(widget, area);
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let projection = &view_data.projection;
    let header_style = Style::default().add_modifier(Modifier::BOLD);
    let header = Row::new(
        std::iter::once(Cell::from(" ")).chain(projection.headers.iter().enumerate().map(
            |(index, label)| {
                let style = if index == view_data.cursor_col {
                    header_style.fg(Color::Cyan)
                } else {
                    header_style
                };
                Cell::from(truncate_label(label, MAX_COLUMN_WIDTH)).style(style)
            },
        )),
    );

    let rows = projection.rows.iter().enumerate().map(|(index, row)| {
        let marker = if row.selected {
            SELECTED_MARK
        } else if projection.selectable {
            UNSELECTED_MARK
        } else {
            " "
        };
        let cells = std::iter::once(Cell::from(marker)).chain(
            row.cells
                .iter()
                .map(|value| Cell::from(truncate_label(value, MAX_COLUMN_WIDTH))),
        );
        let style = if index == view_data.cursor_row {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        Row::new(cells).style(style)
    });

    let table = Table::new(rows, column_widths(projection))
        .header(header)
        .block(
            Block::default()
                .title(table_title(projection))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, area);
}

fn table_title(projection: &TableProjection) -> String {
    format!("{} · {}", projection.title, projection.footer)
}

fn column_widths(projection: &TableProjection) -> Vec<Constraint> {
    let mut widths = vec![Constraint::Length(2)];
    for (index, header) in projection.headers.iter().enumerate() {
        let widest = projection
            .rows
            .iter()
            .filter_map(|row| row.cells.get(index))
            .map(|cell| cell.chars().count())
            .chain(std::iter::once(header.chars().count()))
            .max()
            .unwrap_or(0);
        widths.push(Constraint::Length(widest.clamp(4, MAX_COLUMN_WIDTH) as u16));
    }
    widths
}

fn truncate_label(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    let mut truncated: String = value.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

fn render_sidebar_text(state: &AppState, view_data: &ViewData) -> String {
    navigation::modules(&view_data.permissions)
        .iter()
        .enumerate()
        .map(|(index, link)| {
            let cursor = if state.mode == AppMode::Sidebar && index == view_data.sidebar_cursor {
                ">"
            } else {
                " "
            };
            let active = if ModuleKind::from_path(&link.to) == Some(state.active_module) {
                "*"
            } else {
                " "
            };
            format!("{cursor}{active} {}", link.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_menu_overlay_text(menu: &MenuUiState) -> String {
    let mut lines = Vec::with_capacity(menu.lines.len() + 2);
    for (index, (line, item)) in menu.lines.iter().zip(&menu.items).enumerate() {
        let cursor = if index == menu.cursor { ">" } else { " " };
        let mut text = format!("{cursor} {line}");
        if item.destructive {
            text.push_str(" !");
        }
        if !item.enabled {
            text.push_str(" (disabled)");
        }
        lines.push(text);
    }
    lines.push(String::new());
    lines.push("j/k move | enter run | esc close".to_owned());
    lines.join("\n")
}

fn render_confirm_overlay_text(confirm: &ConfirmDelete, input: &str) -> String {
    [
        confirm.text.clone(),
        String::new(),
        format!("type {:?} to confirm:", confirm.name),
        format!("> {input}"),
        String::new(),
        "enter delete | esc cancel".to_owned(),
    ]
    .join("\n")
}

fn render_modal_overlay_text(kind: ModalKind, modal: &ModalState, picker: &PermissionPicker) -> String {
    let targets = modal.targets();
    let mut lines = vec![format!(
        "{} {}",
        targets.len(),
        if targets.len() == 1 { "user" } else { "users" }
    )];
    if modal.phase() == "submitting" {
        lines.push("submitting…".to_owned());
    }
    if kind == ModalKind::EditPermissions {
        lines.push(String::new());
        for (index, capability) in Capability::all().enumerate() {
            let cursor = if index == picker.cursor { ">" } else { " " };
            let mark = if picker.granted.contains(&capability) {
                "[x]"
            } else {
                "[ ]"
            };
            lines.push(format!("{cursor} {mark} {capability}"));
        }
    }
    lines.push(String::new());
    let warning = if kind.is_destructive() { " (cannot be undone)" } else { "" };
    lines.push(format!("enter {}{warning} | esc cancel", kind.confirm_label().to_lowercase()));
    lines.join("\n")
}

fn render_form_overlay_text(form: &PartFormUiState) -> String {
    let mut lines = Vec::new();
    for (index, field) in form.fields.iter().enumerate() {
        let cursor = if index == form.cursor { ">" } else { " " };
        let value = match &field.kind {
            FormFieldKind::Text => field.value.clone(),
            FormFieldKind::Choice(_) => format!("< {} >", field.value),
            FormFieldKind::Toggle if field.value == "true" => "[x]".to_owned(),
            FormFieldKind::Toggle => "[ ]".to_owned(),
        };
        lines.push(format!("{cursor} {}: {value}", field.label));
        if let Some(message) = form.errors.get(&field.key) {
            lines.push(format!("    ! {message}"));
        }
    }
    if !form.attachments.is_empty() {
        lines.push(String::new());
        lines.extend(form.attachments.iter().cloned());
    }
    lines.push(String::new());
    lines.push("tab/shift+tab field | left/right choose | space toggle | enter save | esc cancel".to_owned());
    lines.join("\n")
}

fn render_details_overlay_text(details: &PartDetailsView) -> String {
    let summary = &details.summary;
    let mut lines = vec![
        summary.name.clone(),
        String::new(),
        "notes:".to_owned(),
        if summary.notes.is_empty() {
            "  (none)".to_owned()
        } else {
            summary
                .notes
                .lines()
                .map(|line| format!("  {line}"))
                .collect::<Vec<_>>()
                .join("\n")
        },
    ];
    if let Some(documents) = &details.documents {
        lines.push(String::new());
        lines.push(format!("documents ({}):", documents.len()));
        lines.extend(
            documents
                .iter()
                .map(|file| format!("  {} ({} bytes)", file.name, file.size_bytes)),
        );
    }
    if let Some(model) = &details.cad_model {
        lines.push(String::new());
        let access = if model.read_only { "read-only" } else { "editable" };
        match &model.path {
            Some(path) => lines.push(format!("cad model: {path} ({access})")),
            None => lines.push(format!("cad model: none ({access})")),
        }
    }
    lines.push(String::new());
    lines.push("e edit | esc close".to_owned());
    lines.join("\n")
}

fn status_text(state: &AppState) -> String {
    if let Some(status) = &state.status_line {
        return status.clone();
    }
    match state.mode {
        AppMode::Table => {
            "enter actions | space select | b bulk | [/] page | s modules | ? help".to_owned()
        }
        AppMode::Sidebar => "j/k move | enter open | esc close".to_owned(),
        AppMode::ContextMenu | AppMode::BulkMenu => "j/k move | enter run | esc close".to_owned(),
        AppMode::ConfirmDelete => "type the name | enter delete | esc cancel".to_owned(),
        AppMode::Modal => "enter confirm | esc cancel".to_owned(),
        AppMode::PartForm => "enter save | esc cancel".to_owned(),
        AppMode::Details => "e edit | esc close".to_owned(),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help\n\
nav: j/k rows | h/l columns | tab/shift+tab module | s sidebar\n\
rows: space select | a select all | enter actions | b bulk actions\n\
pages: [ prev | ] next | r reload\n\
columns: c hide | C show all | R reset | p pin\n\
create: n primary action | L log out\n\
delete: type the row name, enter confirms, esc cancels\n\
form: tab/shift+tab field | left/right choose | space toggle | enter or ctrl+s save | esc cancel"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, FormOrigin, InternalEvent, MenuUiState, ViewData, follow_link, handle_key_event,
        help_overlay_text, load_reference_data, pump_changes, reload_active,
        render_confirm_overlay_text, render_menu_overlay_text, sync_projection, truncate_label,
    };
    use anyhow::{Result, anyhow};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use erp_app::paths;
    use erp_app::{
        ActionResult, AppMode, AppState, BulkUpdateRequest, Capability, ChangeEvent, ChangeKind,
        ConfirmDelete, CustomColumn, DeleteRequest, Employee, EmployeeId, FieldValue, ItemId,
        ListQuery, Lookups, MenuCommand, MenuEntry, MenuItem, MethodType, ModalAction,
        ModuleKind, Page, Part, PartDetailsView, PartEditView, PartFormInput, PartSummary, Patch,
        Permissions, ReplenishmentSystem, Resource, Role, Toast, TrackingType, UpdateResponse,
        UserId, Verb,
    };
    use std::collections::BTreeSet;
    use std::sync::mpsc::{self, Receiver, Sender};
    use time::OffsetDateTime;

    #[derive(Debug, Default)]
    struct TestRuntime {
        parts: Vec<Part>,
        employees: Vec<Employee>,
        permissions: Option<Permissions>,
        revision: u64,
        bulk_requests: Vec<BulkUpdateRequest>,
        deletes: Vec<DeleteRequest>,
        modal_actions: Vec<ModalAction>,
        saved: Vec<Vec<(String, String)>>,
        save_origins: Vec<FormOrigin>,
        changes: Vec<ChangeEvent>,
        logged_out: bool,
    }

    impl TestRuntime {
        fn sample_part(id: &str, name: &str) -> Part {
            Part {
                id: ItemId::new(id),
                readable_id_with_revision: format!("{id}.1"),
                name: name.to_owned(),
                description: String::new(),
                thumbnail_path: None,
                item_tracking_type: TrackingType::Inventory,
                default_method_type: MethodType::Make,
                replenishment_system: ReplenishmentSystem::Make,
                tags: Vec::new(),
                active: true,
                revisions: Vec::new(),
                created_by: UserId::new("u1"),
                created_at: OffsetDateTime::UNIX_EPOCH,
                updated_by: None,
                updated_at: None,
                custom_fields: Default::default(),
            }
        }

        fn sample_employee(id: &str, last_name: &str, active: bool) -> Employee {
            Employee {
                id: EmployeeId::new(id),
                first_name: "Alex".to_owned(),
                last_name: last_name.to_owned(),
                email: format!("{id}@example.com"),
                employee_type_id: None,
                active,
                employee_status_id: Some("1".to_owned()),
            }
        }

        fn seeded() -> Self {
            Self {
                parts: vec![
                    Self::sample_part("P1", "Bracket"),
                    Self::sample_part("P2", "Housing"),
                    Self::sample_part("P3", "Axle"),
                ],
                employees: vec![
                    Self::sample_employee("E1", "Stone", true),
                    Self::sample_employee("E2", "Reed", false),
                ],
                revision: 1,
                ..Self::default()
            }
        }
    }

    impl AppRuntime for TestRuntime {
        fn permissions(&mut self) -> Result<Permissions> {
            Ok(self
                .permissions
                .clone()
                .unwrap_or_else(|| Permissions::all(Role::Employee)))
        }

        fn load_lookups(&mut self) -> Result<Lookups> {
            Ok(Lookups::default())
        }

        fn load_custom_columns(&mut self, _table: &str) -> Result<Vec<CustomColumn>> {
            Ok(Vec::new())
        }

        fn load_parts(&mut self, query: &ListQuery) -> Result<Page<Part>> {
            let (rows, count) = query.apply(self.parts.clone());
            Ok(Page {
                rows,
                count,
                revision: self.revision,
            })
        }

        fn load_employees(&mut self, query: &ListQuery) -> Result<Page<Employee>> {
            let (rows, count) = query.apply(self.employees.clone());
            Ok(Page {
                rows,
                count,
                revision: self.revision,
            })
        }

        fn bulk_update(&mut self, request: &BulkUpdateRequest) -> Result<UpdateResponse> {
            self.bulk_requests.push(request.clone());
            Ok(UpdateResponse::ok())
        }

        fn delete(&mut self, request: &DeleteRequest) -> Result<()> {
            self.deletes.push(request.clone());
            self.parts.retain(|part| part.id.as_str() != request.id);
            Ok(())
        }

        fn submit_modal(&mut self, action: &ModalAction) -> Result<UpdateResponse> {
            self.modal_actions.push(action.clone());
            Ok(UpdateResponse::ok())
        }

        fn load_user_permissions(&mut self, _employee_id: &EmployeeId) -> Result<BTreeSet<Capability>> {
            Ok(BTreeSet::from([Capability::new(Verb::View, Resource::Parts)]))
        }

        fn load_part_edit(&mut self, item_id: &ItemId) -> Result<PartEditView> {
            let part = self
                .parts
                .iter()
                .find(|part| &part.id == item_id)
                .cloned()
                .ok_or_else(|| anyhow!("part {item_id} not found"))?;
            Ok(PartEditView {
                part,
                serial_number: Some("SN-1".to_owned()),
                barcode_upload_id: None,
                barcode_file_name: None,
                model_upload_id: None,
                model_file_name: None,
            })
        }

        fn save_part(
            &mut self,
            item_id: &ItemId,
            fields: &[(String, String)],
            origin: FormOrigin,
        ) -> Result<ActionResult> {
            self.saved.push(fields.to_vec());
            self.save_origins.push(origin);
            let input = match PartFormInput::from_form(fields) {
                Ok(input) => input,
                Err(errors) => return Ok(ActionResult::Invalid(errors)),
            };
            if let Some(part) = self.parts.iter_mut().find(|part| &part.id == item_id) {
                part.name = input.name;
            }
            let to = paths::part(item_id.as_str());
            Ok(match origin {
                FormOrigin::EditPage => ActionResult::redirect(to),
                FormOrigin::DetailsPane => {
                    ActionResult::redirect_with(to, Toast::info("Updated part"))
                }
            })
        }

        fn load_part_details(&mut self, item_id: &ItemId) -> Result<PartDetailsView> {
            let part = self
                .parts
                .iter()
                .find(|part| &part.id == item_id)
                .ok_or_else(|| anyhow!("part {item_id} not found"))?;
            Ok(PartDetailsView {
                summary: PartSummary {
                    id: part.id.clone(),
                    name: part.name.clone(),
                    readable_id_with_revision: part.readable_id_with_revision.clone(),
                    notes: "keep dry".to_owned(),
                    model_upload_id: None,
                    model_path: None,
                },
                documents: None,
                cad_model: None,
            })
        }

        fn poll_changes(&mut self, since: u64) -> Result<Vec<ChangeEvent>> {
            Ok(self
                .changes
                .iter()
                .filter(|event| event.revision > since)
                .cloned()
                .collect())
        }

        fn logout(&mut self) -> Result<()> {
            self.logged_out = true;
            Ok(())
        }

        fn page_size(&self) -> usize {
            2
        }
    }

    struct Harness {
        state: AppState,
        view: ViewData,
        tx: Sender<InternalEvent>,
        _rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn new(runtime: &mut TestRuntime) -> Result<Self> {
            let state = AppState::default();
            let mut view = ViewData::new(runtime.permissions()?, runtime.page_size());
            load_reference_data(runtime, &mut view)?;
            reload_active(&state, runtime, &mut view)?;
            let (tx, rx) = mpsc::channel();
            Ok(Self {
                state,
                view,
                tx,
                _rx: rx,
            })
        }

        fn press(&mut self, runtime: &mut TestRuntime, code: KeyCode) -> bool {
            handle_key_event(
                &mut self.state,
                runtime,
                &mut self.view,
                &self.tx,
                KeyEvent::new(code, KeyModifiers::NONE),
            )
        }

        fn type_text(&mut self, runtime: &mut TestRuntime, text: &str) {
            for ch in text.chars() {
                self.press(runtime, KeyCode::Char(ch));
            }
        }

        fn pick_menu_line(&mut self, line: &str) {
            let index = self
                .view
                .menu
                .lines
                .iter()
                .position(|candidate| candidate == line)
                .unwrap_or_else(|| panic!("menu line {line:?} missing: {:?}", self.view.menu.lines));
            self.view.menu.cursor = index;
        }

        fn status(&self) -> &str {
            self.state.status_line.as_deref().unwrap_or_default()
        }
    }

    #[test]
    fn tab_switches_module_and_loads_its_rows() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;
        assert_eq!(harness.view.projection.title, "Parts");
        assert_eq!(harness.view.projection.rows.len(), 2);

        harness.press(&mut runtime, KeyCode::Tab);
        assert_eq!(harness.state.active_module, ModuleKind::Employees);
        assert_eq!(harness.view.projection.title, "Employees");
        assert_eq!(harness.view.projection.rows[0].id, "E1");
        Ok(())
    }

    #[test]
    fn modules_without_view_permission_are_skipped() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        runtime.permissions = Some(
            Permissions::all(Role::Employee).without(Capability::new(Verb::View, Resource::Users)),
        );
        let mut harness = Harness::new(&mut runtime)?;

        harness.press(&mut runtime, KeyCode::Tab);
        assert_eq!(harness.state.active_module, ModuleKind::Parts);
        assert_eq!(harness.status(), "no other module available");
        Ok(())
    }

    #[test]
    fn bulk_menu_submits_selected_rows_and_reloads() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;

        harness.press(&mut runtime, KeyCode::Char('b'));
        assert_eq!(harness.status(), "select rows first (space)");

        harness.press(&mut runtime, KeyCode::Char(' '));
        harness.press(&mut runtime, KeyCode::Char('b'));
        assert_eq!(harness.state.mode, AppMode::BulkMenu);
        harness.pick_menu_line("Replenishment › Buy");
        harness.press(&mut runtime, KeyCode::Enter);

        assert_eq!(harness.state.mode, AppMode::Table);
        assert_eq!(runtime.bulk_requests.len(), 1);
        assert_eq!(runtime.bulk_requests[0].identifiers, vec!["P1".to_owned()]);
        assert_eq!(runtime.bulk_requests[0].field, "replenishmentSystem");
        assert_eq!(runtime.bulk_requests[0].value, "Buy");
        assert!(harness.state.status_line.is_some());
        Ok(())
    }

    #[test]
    fn delete_requires_the_typed_name() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;

        harness.press(&mut runtime, KeyCode::Enter);
        assert_eq!(harness.state.mode, AppMode::ContextMenu);
        harness.pick_menu_line("Delete Part");
        harness.press(&mut runtime, KeyCode::Enter);
        assert_eq!(harness.state.mode, AppMode::ConfirmDelete);

        harness.type_text(&mut runtime, "P1.");
        harness.press(&mut runtime, KeyCode::Enter);
        assert_eq!(harness.state.mode, AppMode::ConfirmDelete);
        assert!(runtime.deletes.is_empty());
        assert_eq!(harness.status(), "type the name exactly to confirm");

        harness.type_text(&mut runtime, "1");
        harness.press(&mut runtime, KeyCode::Enter);
        assert_eq!(harness.state.mode, AppMode::Table);
        assert_eq!(runtime.deletes.len(), 1);
        assert_eq!(runtime.deletes[0].id, "P1");
        assert_eq!(harness.view.projection.rows[0].id, "P2");
        Ok(())
    }

    #[test]
    fn escape_cancels_delete_without_request() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;

        harness.press(&mut runtime, KeyCode::Enter);
        harness.pick_menu_line("Delete Part");
        harness.press(&mut runtime, KeyCode::Enter);
        harness.press(&mut runtime, KeyCode::Esc);

        assert_eq!(harness.state.mode, AppMode::Table);
        assert!(runtime.deletes.is_empty());
        assert!(harness.view.parts.delete_dialog().current().is_none());
        Ok(())
    }

    #[test]
    fn permission_modal_sends_picked_capabilities() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;
        harness.press(&mut runtime, KeyCode::Tab);

        harness.press(&mut runtime, KeyCode::Enter);
        harness.pick_menu_line("Edit Permissions");
        harness.press(&mut runtime, KeyCode::Enter);
        assert_eq!(harness.state.mode, AppMode::Modal);
        assert!(
            harness
                .view
                .picker
                .granted
                .contains(&Capability::new(Verb::View, Resource::Parts))
        );

        harness.press(&mut runtime, KeyCode::Char(' '));
        harness.press(&mut runtime, KeyCode::Enter);

        assert_eq!(harness.state.mode, AppMode::Table);
        assert_eq!(runtime.modal_actions.len(), 1);
        let action = &runtime.modal_actions[0];
        assert_eq!(action.identifiers, vec!["E1".to_owned()]);
        assert!(action.capabilities.is_empty());
        Ok(())
    }

    #[test]
    fn paging_moves_the_window_and_stops_at_the_end() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;

        harness.press(&mut runtime, KeyCode::Char(']'));
        assert_eq!(harness.view.projection.rows.len(), 1);
        assert_eq!(harness.view.projection.rows[0].id, "P3");
        assert!(harness.view.projection.footer.starts_with("page 2/2"));

        harness.press(&mut runtime, KeyCode::Char(']'));
        assert_eq!(harness.status(), "no more pages");
        harness.press(&mut runtime, KeyCode::Char('['));
        assert_eq!(harness.view.projection.rows.len(), 2);
        Ok(())
    }

    #[test]
    fn polled_changes_patch_visible_rows() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;
        runtime.changes.push(ChangeEvent {
            table: "item".to_owned(),
            kind: ChangeKind::Update,
            revision: 5,
            new: Patch::new("P1").with("name", FieldValue::text("Renamed")),
        });

        assert_eq!(pump_changes(&mut runtime, &mut harness.view)?, 1);
        sync_projection(&harness.state, &mut harness.view);
        assert!(
            harness.view.projection.rows[0]
                .cells
                .iter()
                .any(|cell| cell.contains("Renamed"))
        );
        assert_eq!(harness.view.feed_cursor.since(), 5);
        assert_eq!(pump_changes(&mut runtime, &mut harness.view)?, 0);
        Ok(())
    }

    #[test]
    fn newer_parts_page_does_not_skip_employee_changes() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;
        harness.state.active_module = ModuleKind::Employees;
        reload_active(&harness.state, &mut runtime, &mut harness.view)?;

        runtime.changes.push(ChangeEvent {
            table: "employee".to_owned(),
            kind: ChangeKind::Update,
            revision: 3,
            new: Patch::new("E1").with("lastName", FieldValue::text("Rivers")),
        });
        runtime.revision = 7;
        harness.state.active_module = ModuleKind::Parts;
        reload_active(&harness.state, &mut runtime, &mut harness.view)?;
        assert_eq!(harness.view.feed_cursor.parts, 7);
        assert_eq!(harness.view.feed_cursor.since(), 1);

        assert_eq!(pump_changes(&mut runtime, &mut harness.view)?, 1);
        assert_eq!(
            harness.view.employees.row("E1").map(|employee| employee.last_name.as_str()),
            Some("Rivers")
        );
        assert_eq!(harness.view.feed_cursor.since(), 7);
        Ok(())
    }

    #[test]
    fn part_form_shows_errors_then_redirects_to_details() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;

        let quit = follow_link(
            &mut harness.state,
            &mut runtime,
            &mut harness.view,
            &harness.tx,
            &paths::edit_part("P1"),
        );
        assert!(!quit);
        assert_eq!(harness.state.mode, AppMode::PartForm);

        for _ in 0.."Bracket".len() {
            harness.press(&mut runtime, KeyCode::Backspace);
        }
        harness.press(&mut runtime, KeyCode::Enter);
        assert_eq!(harness.state.mode, AppMode::PartForm);
        let errors = harness.view.form.as_ref().map(|form| form.errors.clone());
        assert!(errors.is_some_and(|errors| errors.contains_key("name")));

        harness.type_text(&mut runtime, "Bracket v2");
        harness.press(&mut runtime, KeyCode::Enter);
        assert_eq!(harness.state.mode, AppMode::Details);
        assert_eq!(harness.status(), "saved P1");
        assert_eq!(runtime.parts[0].name, "Bracket v2");
        assert!(
            runtime.saved[1]
                .iter()
                .any(|(key, value)| key == "active" && value == "true")
        );

        harness.press(&mut runtime, KeyCode::Char('e'));
        assert_eq!(harness.state.mode, AppMode::PartForm);
        harness.press(&mut runtime, KeyCode::Enter);
        assert_eq!(harness.state.mode, AppMode::Details);
        assert_eq!(harness.status(), "Updated part");
        assert_eq!(
            runtime.save_origins,
            vec![
                FormOrigin::EditPage,
                FormOrigin::EditPage,
                FormOrigin::DetailsPane
            ]
        );

        harness.press(&mut runtime, KeyCode::Esc);
        assert_eq!(harness.state.mode, AppMode::Table);
        Ok(())
    }

    #[test]
    fn form_choices_cycle_with_arrows() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;
        follow_link(
            &mut harness.state,
            &mut runtime,
            &mut harness.view,
            &harness.tx,
            &paths::edit_part("P2"),
        );

        harness.press(&mut runtime, KeyCode::Tab);
        harness.press(&mut runtime, KeyCode::Tab);
        harness.press(&mut runtime, KeyCode::Right);
        let value = harness
            .view
            .form
            .as_ref()
            .and_then(|form| form.fields.get(2))
            .map(|field| field.value.clone());
        assert_eq!(value.as_deref(), Some("Buy and Make"));
        Ok(())
    }

    #[test]
    fn selection_needs_update_permission() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        runtime.permissions = Some(
            Permissions::all(Role::Employee)
                .without(Capability::new(Verb::Update, Resource::Users)),
        );
        let mut harness = Harness::new(&mut runtime)?;
        harness.press(&mut runtime, KeyCode::Tab);

        harness.press(&mut runtime, KeyCode::Char(' '));
        assert_eq!(harness.status(), "selecting rows needs update permission");
        assert!(harness.view.employees.selection().is_empty());
        Ok(())
    }

    #[test]
    fn logout_quits_the_loop() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;
        assert!(harness.press(&mut runtime, KeyCode::Char('L')));
        assert!(runtime.logged_out);
        Ok(())
    }

    #[test]
    fn hiding_columns_keeps_at_least_one() -> Result<()> {
        let mut runtime = TestRuntime::seeded();
        let mut harness = Harness::new(&mut runtime)?;
        let before = harness.view.projection.column_ids.len();

        harness.press(&mut runtime, KeyCode::Char('l'));
        harness.press(&mut runtime, KeyCode::Char('c'));
        assert_eq!(harness.view.projection.column_ids.len(), before - 1);

        harness.press(&mut runtime, KeyCode::Char('C'));
        assert!(harness.view.projection.column_ids.len() > before);
        Ok(())
    }

    #[test]
    fn overlay_text_marks_disabled_and_prompts_for_name() {
        let menu = MenuUiState::from_entries(
            "actions",
            &[
                MenuEntry::Item(MenuItem::new("Edit", MenuCommand::Navigate("/x".to_owned()))),
                MenuEntry::Item(
                    MenuItem::new("Delete", MenuCommand::Navigate("/y".to_owned()))
                        .destructive()
                        .enabled_if(false),
                ),
            ],
        );
        let text = render_menu_overlay_text(&menu);
        assert!(text.contains("> Edit"));
        assert!(text.contains("Delete ! (disabled)"));

        let confirm = ConfirmDelete::new("P1", "P1.1", "/x/items/P1/delete");
        let text = render_confirm_overlay_text(&confirm, "P1");
        assert!(text.contains("type \"P1.1\" to confirm"));
        assert!(text.contains("> P1"));
    }

    #[test]
    fn help_and_truncation() {
        assert!(help_overlay_text().contains("space select"));
        assert_eq!(truncate_label("abcdef", 4), "abc…");
        assert_eq!(truncate_label("abc", 4), "abc");
    }
}
