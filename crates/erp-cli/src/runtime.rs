// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::routes;
use anyhow::{Result, anyhow};
use erp_app::{
    ActionResult, BulkUpdateRequest, Capability, ChangeEvent, CompanyId, CustomColumn,
    DEFAULT_PAGE_SIZE, DeleteRequest, Employee, EmployeeId, EmployeeStatus, ItemId, ListQuery,
    Lookups, ModalAction, Page, Part, PartDetailsView, PartEditView, PartFormInput, Permissions,
    Toast, UpdateResponse, UserId, paths,
};
use erp_db::{Session, Store};
use erp_tui::FormOrigin;
use std::collections::BTreeSet;
use tracing::warn;

pub struct DbRuntime<'a> {
    store: &'a Store,
    session: Session,
    page_size: usize,
}

impl<'a> DbRuntime<'a> {
    pub fn new(store: &'a Store, session: Session) -> Self {
        Self {
            store,
            session,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl erp_tui::AppRuntime for DbRuntime<'_> {
    fn permissions(&mut self) -> Result<Permissions> {
        self.store.session_permissions(&self.session)
    }

    fn load_lookups(&mut self) -> Result<Lookups> {
        self.store.lookups()
    }

    fn load_custom_columns(&mut self, table: &str) -> Result<Vec<CustomColumn>> {
        self.store.custom_columns(table)
    }

    fn load_parts(&mut self, query: &ListQuery) -> Result<Page<Part>> {
        self.store.list_parts(query)
    }

    fn load_employees(&mut self, query: &ListQuery) -> Result<Page<Employee>> {
        self.store.list_employees(query)
    }

    fn bulk_update(&mut self, request: &BulkUpdateRequest) -> Result<UpdateResponse> {
        self.store.bulk_update_items(request)
    }

    fn delete(&mut self, request: &DeleteRequest) -> Result<()> {
        self.store.delete_item(&ItemId::new(request.id.as_str()))
    }

    fn submit_modal(&mut self, action: &ModalAction) -> Result<UpdateResponse> {
        self.store.modal_action(action)
    }

    fn load_user_permissions(&mut self, employee_id: &EmployeeId) -> Result<BTreeSet<Capability>> {
        Ok(self.store.user_permissions(employee_id)?.granted)
    }

    fn load_part_edit(&mut self, item_id: &ItemId) -> Result<PartEditView> {
        Ok(routes::part_edit_loader(
            self.store,
            &self.session,
            Some(item_id.as_str()),
        )?)
    }

    fn save_part(
        &mut self,
        item_id: &ItemId,
        fields: &[(String, String)],
        origin: FormOrigin,
    ) -> Result<ActionResult> {
        let action = match origin {
            FormOrigin::EditPage => routes::part_edit_action,
            FormOrigin::DetailsPane => routes::part_details_action,
        };
        Ok(action(self.store, &self.session, Some(item_id.as_str()), fields)?)
    }

    fn load_part_details(&mut self, item_id: &ItemId) -> Result<PartDetailsView> {
        Ok(routes::part_details_view(
            self.store,
            &self.session,
            Some(item_id.as_str()),
        )?)
    }

    fn poll_changes(&mut self, since: u64) -> Result<Vec<ChangeEvent>> {
        self.store.changes_since(since)
    }

    fn logout(&mut self) -> Result<()> {
        routes::logout(self.store, Some(&self.session.token))?;
        Ok(())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

/// Drives the UI against the hosted API. The service key acts for the
/// configured employee.
pub struct RemoteRuntime {
    client: erp_api::Client,
    employee_id: Option<EmployeeId>,
    company_id: CompanyId,
    page_size: usize,
}

impl RemoteRuntime {
    pub fn new(
        client: erp_api::Client,
        employee_id: Option<EmployeeId>,
        company_id: CompanyId,
        page_size: usize,
    ) -> Self {
        Self {
            client,
            employee_id,
            company_id,
            page_size,
        }
    }

    fn acting_user(&self) -> Result<UserId> {
        self.employee_id
            .as_ref()
            .map(|id| UserId::new(id.as_str()))
            .ok_or_else(|| anyhow!("set [session].employee_id to save parts in remote mode"))
    }
}

impl erp_tui::AppRuntime for RemoteRuntime {
    fn permissions(&mut self) -> Result<Permissions> {
        self.client.session_permissions()
    }

    fn load_lookups(&mut self) -> Result<Lookups> {
        self.client.lookups()
    }

    fn load_custom_columns(&mut self, table: &str) -> Result<Vec<CustomColumn>> {
        self.client.custom_columns(table)
    }

    fn load_parts(&mut self, query: &ListQuery) -> Result<Page<Part>> {
        self.client.list_parts(query)
    }

    fn load_employees(&mut self, query: &ListQuery) -> Result<Page<Employee>> {
        self.client.list_employees(query)
    }

    fn bulk_update(&mut self, request: &BulkUpdateRequest) -> Result<UpdateResponse> {
        self.client.bulk_update_items(request)
    }

    fn delete(&mut self, request: &DeleteRequest) -> Result<()> {
        self.client.delete_item(&ItemId::new(request.id.as_str()))
    }

    fn submit_modal(&mut self, action: &ModalAction) -> Result<UpdateResponse> {
        self.client.modal_action(action)
    }

    fn load_user_permissions(&mut self, employee_id: &EmployeeId) -> Result<BTreeSet<Capability>> {
        Ok(self.client.user_permissions(employee_id)?.granted)
    }

    fn load_part_edit(&mut self, item_id: &ItemId) -> Result<PartEditView> {
        self.client.part_edit_view(item_id)
    }

    fn save_part(
        &mut self,
        item_id: &ItemId,
        fields: &[(String, String)],
        origin: FormOrigin,
    ) -> Result<ActionResult> {
        let input = match PartFormInput::from_form(fields) {
            Ok(input) => input,
            Err(errors) => return Ok(ActionResult::Invalid(errors)),
        };
        let updated_by = self.acting_user()?;
        let to = paths::part(item_id.as_str());
        Ok(match self.client.upsert_part(item_id, &input, &updated_by) {
            Ok(_) if origin == FormOrigin::EditPage => ActionResult::redirect(to),
            Ok(_) => ActionResult::redirect_with(to, Toast::info("Updated part")),
            Err(error) => {
                warn!(item = %item_id, error = %format!("{error:#}"), "remote part update failed");
                ActionResult::redirect_with(to, Toast::error("Failed to update part"))
            }
        })
    }

    fn load_part_details(&mut self, item_id: &ItemId) -> Result<PartDetailsView> {
        self.client.part_details_view(item_id)
    }

    fn poll_changes(&mut self, since: u64) -> Result<Vec<ChangeEvent>> {
        self.client.changes_since(since)
    }

    fn logout(&mut self) -> Result<()> {
        if let Some(employee_id) = &self.employee_id
            && let Err(error) = self.client.update_employee_status(
                employee_id,
                &self.company_id,
                EmployeeStatus::Unavailable.code(),
            )
        {
            warn!(employee = %employee_id, error = %format!("{error:#}"), "could not mark employee unavailable");
        }
        Ok(())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}
