// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use erp_app::{
    ActionOutcome, Capability, ChangeEvent, ChangeFeed, ChangeKind, Employee, EmployeeId,
    EmployeesTable, FieldValue, ItemId, ListController, ListQuery, MenuEntry, MethodType,
    ModalKind, Page, Part, PartRevision, PartsTable, Patch, PatchOutcome, Permissions,
    ReplenishmentSystem, Resource, Role, ToastLevel, TrackingType, UpdateResponse, UserId, Verb,
    find_item,
};
use std::rc::Rc;
use time::macros::datetime;

fn part(id: &str) -> Part {
    Part {
        id: ItemId::new(id),
        readable_id_with_revision: format!("{id}.A"),
        name: format!("Part {id}"),
        description: String::new(),
        thumbnail_path: None,
        item_tracking_type: TrackingType::Inventory,
        default_method_type: MethodType::Make,
        replenishment_system: ReplenishmentSystem::Make,
        tags: vec!["metal".to_owned()],
        active: true,
        revisions: vec![PartRevision {
            id: ItemId::new(id),
            revision: 1,
        }],
        created_by: UserId::new("u1"),
        created_at: datetime!(2026-02-01 09:00 UTC),
        updated_by: None,
        updated_at: None,
        custom_fields: Default::default(),
    }
}

fn employee(id: &str, active: bool) -> Employee {
    Employee {
        id: EmployeeId::new(id),
        first_name: "Sam".to_owned(),
        last_name: id.to_owned(),
        email: format!("{id}@example.com"),
        employee_type_id: None,
        active,
        employee_status_id: Some("1".to_owned()),
    }
}

fn page<R>(rows: Vec<R>, revision: u64) -> Page<R> {
    let count = rows.len();
    Page {
        rows,
        count,
        revision,
    }
}

fn update(table: &str, revision: u64, patch: Patch) -> ChangeEvent {
    ChangeEvent {
        table: table.to_owned(),
        kind: ChangeKind::Update,
        revision,
        new: patch,
    }
}

fn parts_controller(permissions: Permissions) -> Result<ListController<PartsTable>> {
    let mut controller = ListController::new(Rc::new(permissions), ListQuery::default());
    controller.adopt_page(page(vec![part("P1"), part("P2"), part("P3")], 10))?;
    Ok(controller)
}

#[test]
fn bulk_error_shows_one_toast_and_leaves_rows_and_selection() -> Result<()> {
    let mut controller = parts_controller(Permissions::all(Role::Employee))?;
    controller.toggle_selected("P1");
    controller.toggle_selected("P2");
    let before = controller.rows().to_vec();

    let menu = controller.bulk_menu();
    let buy = menu
        .iter()
        .find_map(|entry| match entry {
            MenuEntry::Submenu { label, items } if label == "Replenishment" => {
                items.iter().find(|item| item.label == "Buy")
            }
            _ => None,
        })
        .cloned()
        .expect("Buy item");

    let ActionOutcome::BulkSubmitted(request) = controller.activate(&buy) else {
        panic!("bulk update should be submitted");
    };
    assert_eq!(request.identifiers, vec!["P1".to_owned(), "P2".to_owned()]);
    assert_eq!(request.field, "replenishmentSystem");
    assert_eq!(request.value, "Buy");

    assert_eq!(controller.activate(&buy), ActionOutcome::Blocked);
    assert!(controller.bulk_menu().iter().all(|entry| match entry {
        MenuEntry::Submenu { items, .. } => items.iter().all(|item| !item.enabled),
        _ => true,
    }));
    let guard_toasts = controller.take_toasts();
    assert_eq!(guard_toasts.len(), 1);

    controller.finish_bulk(Ok(UpdateResponse::failed("conflict")));
    let toasts = controller.take_toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].level, ToastLevel::Error);
    assert!(toasts[0].message.contains("conflict"));

    assert_eq!(controller.rows(), before.as_slice());
    assert!(controller.is_selected("P1") && controller.is_selected("P2"));
    assert_eq!(controller.selection().len(), 2);
    Ok(())
}

#[test]
fn disabled_delete_neither_navigates_nor_confirms() -> Result<()> {
    let permissions =
        Permissions::all(Role::Employee).without(Capability::new(Verb::Delete, Resource::Parts));
    let mut controller = parts_controller(permissions)?;
    let menu = controller.context_menu("P1").expect("row P1 is on the page");
    let delete = find_item(&menu, "Delete Part").expect("delete present").clone();
    assert!(!delete.enabled);

    assert_eq!(controller.activate(&delete), ActionOutcome::Blocked);
    assert!(!controller.delete_dialog().is_open());
    assert_eq!(controller.delete_dialog().selected_row(), None);
    Ok(())
}

#[test]
fn cancelled_delete_leaves_row_and_clears_selected_row() -> Result<()> {
    let mut controller = parts_controller(Permissions::all(Role::Employee))?;
    let menu = controller.context_menu("P2").expect("row P2");
    let delete = find_item(&menu, "Delete Part").expect("delete").clone();
    assert_eq!(controller.activate(&delete), ActionOutcome::ConfirmOpened);
    assert_eq!(controller.delete_dialog().selected_row(), Some("P2"));
    let confirm = controller.delete_dialog().current().expect("open dialog");
    assert_eq!(confirm.name, "P2.A");
    assert_eq!(
        confirm.text,
        "Are you sure you want to delete P2.A? This cannot be undone."
    );
    assert!(confirm.accepts("P2.A"));
    assert!(!confirm.accepts("Part P2"));

    controller.cancel_delete();
    assert!(!controller.delete_dialog().is_open());
    assert_eq!(controller.delete_dialog().selected_row(), None);
    assert!(controller.row("P2").is_some());

    controller.activate(&delete);
    let request = controller.confirm_delete().expect("delete request");
    assert_eq!(request.action, "/x/items/delete/P2");
    controller.finish_delete(Ok(()));
    assert_eq!(controller.take_toasts().len(), 1);
    Ok(())
}

#[test]
fn patch_for_missing_row_changes_nothing() -> Result<()> {
    let mut controller = parts_controller(Permissions::all(Role::Employee))?;
    let before = controller.rows().to_vec();
    let outcome = controller.apply_event(update(
        "item",
        11,
        Patch::new("P9").with("name", FieldValue::text("Ghost")),
    ))?;
    assert_eq!(outcome, PatchOutcome::MissingRow);
    assert_eq!(controller.rows(), before.as_slice());
    assert_eq!(controller.count(), 3);
    Ok(())
}

#[test]
fn rejected_patch_keeps_row_and_revision() -> Result<()> {
    let mut controller = parts_controller(Permissions::all(Role::Employee))?;
    let before = controller.rows().to_vec();
    let mixed = Patch::new("P1")
        .with("defaultMethodType", FieldValue::text("Pick"))
        .with("replenishmentSystem", FieldValue::text("Teleport"));
    assert!(controller.apply_event(update("item", 11, mixed)).is_err());
    assert_eq!(controller.rows(), before.as_slice());
    assert_eq!(controller.revision(), 10);

    // A valid change at the same revision still lands.
    let valid = Patch::new("P1").with("defaultMethodType", FieldValue::text("Pick"));
    assert_eq!(
        controller.apply_event(update("item", 11, valid))?,
        PatchOutcome::Applied
    );
    assert_eq!(controller.revision(), 11);
    Ok(())
}

#[test]
fn same_patch_twice_matches_once() -> Result<()> {
    let mut once = parts_controller(Permissions::all(Role::Employee))?;
    let mut twice = parts_controller(Permissions::all(Role::Employee))?;
    let event = update(
        "item",
        11,
        Patch::new("P1").with("defaultMethodType", FieldValue::text("Pick")),
    );

    assert_eq!(once.apply_event(event.clone())?, PatchOutcome::Applied);
    twice.apply_event(event.clone())?;
    assert_ne!(twice.apply_event(event)?, PatchOutcome::Applied);
    assert_eq!(once.rows(), twice.rows());
    assert_eq!(
        once.row("P1").map(|part| part.default_method_type),
        Some(MethodType::Pick)
    );
    Ok(())
}

#[test]
fn reload_buffers_patches_and_page_supersedes_older_ones() -> Result<()> {
    let mut controller = parts_controller(Permissions::all(Role::Employee))?;
    controller.begin_reload();
    let stale = update("item", 11, Patch::new("P1").with("name", FieldValue::text("Old")));
    let fresh = update("item", 13, Patch::new("P1").with("name", FieldValue::text("Newest")));
    assert_eq!(controller.apply_event(stale)?, PatchOutcome::Buffered);
    assert_eq!(controller.apply_event(fresh)?, PatchOutcome::Buffered);

    let mut reloaded = part("P1");
    reloaded.name = "From page".to_owned();
    let outcomes = controller.adopt_page(page(vec![reloaded], 12))?;
    assert_eq!(outcomes, vec![PatchOutcome::Superseded, PatchOutcome::Applied]);
    assert_eq!(controller.row("P1").map(|part| part.name.as_str()), Some("Newest"));
    Ok(())
}

#[test]
fn aborted_reload_keeps_rows_and_replays_held_patches() -> Result<()> {
    let mut controller = parts_controller(Permissions::all(Role::Employee))?;
    assert!(controller.abort_reload().is_empty());

    controller.begin_reload();
    let patch = update("item", 11, Patch::new("P2").with("name", FieldValue::text("Held")));
    assert_eq!(controller.apply_event(patch)?, PatchOutcome::Buffered);

    assert_eq!(controller.abort_reload(), vec![PatchOutcome::Applied]);
    assert!(!controller.is_loading());
    assert_eq!(controller.rows().len(), 3);
    assert_eq!(controller.row("P2").map(|part| part.name.as_str()), Some("Held"));
    Ok(())
}

#[test]
fn realtime_activation_flips_employee_actions() -> Result<()> {
    let feed = ChangeFeed::new();
    let mut controller: ListController<EmployeesTable> =
        ListController::new(Rc::new(Permissions::all(Role::Employee)), ListQuery::default());
    controller.subscribe(&feed);
    controller.adopt_page(page(vec![employee("E1", false), employee("E2", true)], 3))?;

    let menu = controller.context_menu("E1").expect("E1");
    assert!(find_item(&menu, "Resend Account Invite").is_some());
    assert!(find_item(&menu, "Deactivate Account").is_none());

    feed.publish(&update(
        "employee",
        4,
        Patch::new("E1")
            .with("active", FieldValue::Bool(true))
            .with("employeeStatusId", FieldValue::text("2")),
    ));
    assert_eq!(controller.pump(), vec![PatchOutcome::Applied]);

    let menu = controller.context_menu("E1").expect("E1");
    assert!(find_item(&menu, "Deactivate Account").is_some());
    assert!(find_item(&menu, "Resend Account Invite").is_none());
    assert_eq!(controller.count(), 2);
    Ok(())
}

#[test]
fn teardown_unsubscribes_and_ignores_late_results() -> Result<()> {
    let feed = ChangeFeed::new();
    let mut controller: ListController<EmployeesTable> =
        ListController::new(Rc::new(Permissions::all(Role::Employee)), ListQuery::default());
    controller.subscribe(&feed);
    controller.adopt_page(page(vec![employee("E1", true)], 1))?;

    controller.toggle_selected("E1");
    let menu = controller.bulk_menu();
    let deactivate = find_item(&menu, "Deactivate Users").expect("deactivate").clone();
    assert_eq!(
        controller.activate(&deactivate),
        ActionOutcome::ModalOpened(ModalKind::DeactivateUsers)
    );
    controller.submit_modal()?;

    controller.teardown();
    assert_eq!(feed.subscriber_count("employee"), 0);
    assert!(!controller.modal().is_open());

    controller.finish_modal(Ok(UpdateResponse::ok()));
    controller.finish_bulk(Ok(UpdateResponse::failed("late")));
    assert!(controller.take_toasts().is_empty());

    let outcomes = controller.adopt_page(page(vec![employee("E9", true)], 9))?;
    assert!(outcomes.is_empty());
    assert!(controller.row("E9").is_none());
    assert_eq!(
        controller.apply_event(update("employee", 10, Patch::new("E1")))?,
        PatchOutcome::Ignored
    );
    Ok(())
}

#[test]
fn failed_modal_submit_reopens_with_targets() -> Result<()> {
    let mut controller: ListController<EmployeesTable> =
        ListController::new(Rc::new(Permissions::all(Role::Employee)), ListQuery::default());
    controller.adopt_page(page(vec![employee("E1", false)], 1))?;
    let menu = controller.context_menu("E1").expect("E1");
    let revoke = find_item(&menu, "Revoke Invite").expect("revoke").clone();
    controller.activate(&revoke);

    let action = controller.submit_modal()?;
    assert_eq!(action.identifiers, vec!["E1".to_owned()]);
    controller.finish_modal(Err(anyhow::anyhow!("backend unavailable")));
    assert_eq!(controller.modal().phase(), "open");
    assert_eq!(controller.modal().targets(), ["E1".to_owned()].as_slice());
    assert_eq!(controller.take_toasts()[0].level, ToastLevel::Error);

    controller.cancel_modal()?;
    assert!(controller.modal().targets().is_empty());
    Ok(())
}

#[test]
fn columns_default_visibility_pinning_and_cache() -> Result<()> {
    let mut controller = parts_controller(Permissions::all(Role::Employee))?;
    let view = controller.visible_columns()?;
    let ids: Vec<&str> = view.iter().map(|column| column.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["id", "itemTrackingType", "defaultMethodType", "replenishmentSystem", "tags"]
    );

    controller.toggle_column("createdAt");
    controller.toggle_pin("tags");
    let view = controller.visible_columns()?;
    let ids: Vec<&str> = view.iter().map(|column| column.id.as_str()).collect();
    assert_eq!(ids[..2], ["id", "tags"]);
    assert!(ids.contains(&"createdAt"));
    assert_eq!(controller.column_builds(), 1);
    Ok(())
}

#[test]
fn selection_is_recomputed_on_new_page_and_gated_by_permission() -> Result<()> {
    let mut controller = parts_controller(Permissions::all(Role::Employee))?;
    controller.select_all();
    assert_eq!(controller.selection().len(), 3);
    controller.adopt_page(page(vec![part("P2"), part("P4")], 20))?;
    assert_eq!(controller.selection().iter().collect::<Vec<_>>(), vec!["P2"]);

    let permissions =
        Permissions::all(Role::Employee).without(Capability::new(Verb::Update, Resource::Users));
    let mut employees: ListController<EmployeesTable> =
        ListController::new(Rc::new(permissions), ListQuery::default());
    employees.adopt_page(page(vec![employee("E1", true)], 1))?;
    assert!(!employees.toggle_selected("E1"));
    assert!(employees.selection().is_empty());
    Ok(())
}

#[test]
fn pagination_tracks_count_and_limit() -> Result<()> {
    let mut controller: ListController<PartsTable> =
        ListController::new(Rc::new(Permissions::all(Role::Employee)), ListQuery::with_limit(2));
    controller.adopt_page(Page {
        rows: vec![part("P1"), part("P2")],
        count: 5,
        revision: 1,
    })?;
    assert_eq!(controller.page_count(), 3);
    assert!(!controller.prev_page());
    assert!(controller.next_page());
    assert!(controller.next_page());
    assert!(!controller.next_page());
    assert_eq!(controller.query().offset, 4);
    Ok(())
}
