// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Request handlers for the part edit and details pages and for logout.
//! Each handler resolves the caller's session first and refuses to run
//! without the capabilities the page needs.

use erp_app::paths;
use erp_app::{
    ActionResult, CadModelView, Capability, EmployeeId, EmployeeStatus, ItemId, PartDetailsView,
    PartEditView, PartFormInput, PermissionOracle, Permissions, Resource, Role, SessionId, Toast,
    UserId, Verb,
};
use erp_db::{Session, Store};
use thiserror::Error;
use tracing::{debug, info, warn};

const ITEM_ID_PARAM: &str = "itemId";

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("could not find {0}")]
    MissingParam(&'static str),
    #[error("could not find {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// The signed-in caller after a successful permission check.
#[derive(Debug, Clone)]
pub struct Authorized {
    pub employee_id: EmployeeId,
    pub permissions: Permissions,
}

pub fn require_permissions(
    store: &Store,
    session: &Session,
    required: &[Capability],
) -> Result<Authorized, RouteError> {
    let employee_id = session
        .employee_id
        .clone()
        .ok_or_else(|| RouteError::Forbidden("sign in first".to_owned()))?;
    let permissions = store.session_permissions(session)?;
    let missing: Vec<String> = required
        .iter()
        .filter(|capability| !permissions.allows(**capability))
        .map(ToString::to_string)
        .collect();
    if !missing.is_empty() {
        warn!(employee = %employee_id, missing = %missing.join(","), "permission denied");
        return Err(RouteError::Forbidden(format!("requires {}", missing.join(", "))));
    }
    Ok(Authorized {
        employee_id,
        permissions,
    })
}

fn item_param(item_id: Option<&str>) -> Result<ItemId, RouteError> {
    item_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ItemId::new)
        .ok_or(RouteError::MissingParam(ITEM_ID_PARAM))
}

fn ensure_part(store: &Store, item_id: &ItemId) -> Result<(), RouteError> {
    match store.find_part(item_id)? {
        Some(_) => Ok(()),
        None => Err(RouteError::NotFound(format!("part {item_id}"))),
    }
}

/// Loads a part for editing, merged with its barcode serial and the file
/// names of its barcode and CAD model uploads.
pub fn part_edit_loader(
    store: &Store,
    session: &Session,
    item_id: Option<&str>,
) -> Result<PartEditView, RouteError> {
    require_permissions(store, session, &[Capability::new(Verb::View, Resource::Parts)])?;
    let item_id = item_param(item_id)?;
    let part = store
        .find_part(&item_id)?
        .ok_or_else(|| RouteError::NotFound(format!("part {item_id}")))?;

    let uploads = store.get_item_uploads(&item_id)?;
    let barcode = match &uploads.barcode_upload_id {
        Some(upload_id) => store.get_barcode_upload(upload_id)?,
        None => None,
    };
    let model = match &uploads.model_upload_id {
        Some(upload_id) => store.get_model_upload(upload_id)?,
        None => None,
    };
    debug!(
        item = %item_id,
        barcode = ?uploads.barcode_upload_id,
        model = ?uploads.model_upload_id,
        "loaded part for editing"
    );

    Ok(PartEditView {
        part,
        serial_number: barcode.as_ref().map(|upload| upload.serial_number.clone()),
        barcode_upload_id: uploads.barcode_upload_id,
        barcode_file_name: barcode.map(|upload| upload.name),
        model_upload_id: uploads.model_upload_id,
        model_file_name: model.map(|upload| upload.name),
    })
}

fn save_part(
    store: &Store,
    session: &Session,
    item_id: Option<&str>,
    fields: &[(String, String)],
    success_flash: Option<&str>,
) -> Result<ActionResult, RouteError> {
    let caller =
        require_permissions(store, session, &[Capability::new(Verb::Update, Resource::Parts)])?;
    let item_id = item_param(item_id)?;
    let input = match PartFormInput::from_form(fields) {
        Ok(input) => input,
        Err(errors) => return Ok(ActionResult::Invalid(errors)),
    };

    let to = paths::part(item_id.as_str());
    let updated_by = UserId::new(caller.employee_id.as_str());
    match store.upsert_part(&item_id, &input, &updated_by) {
        Ok(_) => {
            info!(item = %item_id, by = %updated_by, "saved part form");
            Ok(match success_flash {
                Some(message) => ActionResult::redirect_with(to, Toast::info(message)),
                None => ActionResult::redirect(to),
            })
        }
        Err(error) => {
            warn!(item = %item_id, error = %format!("{error:#}"), "part update failed");
            Ok(ActionResult::redirect_with(
                to,
                Toast::error("Failed to update part"),
            ))
        }
    }
}

/// Posts the edit form. Success redirects to the part without a message.
pub fn part_edit_action(
    store: &Store,
    session: &Session,
    item_id: Option<&str>,
    fields: &[(String, String)],
) -> Result<ActionResult, RouteError> {
    save_part(store, session, item_id, fields, None)
}

/// Posts the form embedded in the details page. Success carries an
/// "Updated part" flash.
pub fn part_details_action(
    store: &Store,
    session: &Session,
    item_id: Option<&str>,
    fields: &[(String, String)],
) -> Result<ActionResult, RouteError> {
    save_part(store, session, item_id, fields, Some("Updated part"))
}

/// Notes are always shown. Documents and the CAD model are for employees
/// only, and the model is read-only without update:parts.
pub fn part_details_view(
    store: &Store,
    session: &Session,
    item_id: Option<&str>,
) -> Result<PartDetailsView, RouteError> {
    let caller =
        require_permissions(store, session, &[Capability::new(Verb::View, Resource::Parts)])?;
    let item_id = item_param(item_id)?;
    ensure_part(store, &item_id)?;
    let summary = store.part_summary(&item_id)?;

    if !caller.permissions.is(Role::Employee) {
        return Ok(PartDetailsView {
            summary,
            documents: None,
            cad_model: None,
        });
    }

    let documents = store.list_item_files(&item_id)?;
    let cad_model = CadModelView {
        upload_id: summary.model_upload_id.clone(),
        path: summary.model_path.clone(),
        read_only: !caller.permissions.can(Verb::Update, Resource::Parts),
    };
    Ok(PartDetailsView {
        summary,
        documents: Some(documents),
        cad_model: Some(cad_model),
    })
}

/// Marks the signed-in employee unavailable, then ends the session. A
/// failed status update does not block the logout.
pub fn logout(store: &Store, token: Option<&SessionId>) -> Result<ActionResult, RouteError> {
    let Some(token) = token else {
        return Ok(ActionResult::redirect(paths::root()));
    };
    if let Some(session) = store.get_session(token)?
        && let (Some(employee_id), Some(company_id)) = (&session.employee_id, &session.company_id)
        && let Err(error) = store.update_employee_status(
            employee_id,
            company_id,
            EmployeeStatus::Unavailable.code(),
        )
    {
        warn!(employee = %employee_id, error = %format!("{error:#}"), "could not mark employee unavailable");
    }
    let removed = store.destroy_session(token)?;
    info!(removed, "logged out");
    Ok(ActionResult::redirect(paths::root()))
}
