// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::bulk::NoBulkField;
use crate::columns::{Cell, ColumnDescriptor, ColumnSet, Icon};
use crate::controller::{PrimaryAction, TableSpec};
use crate::error::ListError;
use crate::filters::{FilterOption, FilterSpec, ReferenceSource, boolean_options};
use crate::menu::{MenuCommand, MenuEntry, MenuIcon, MenuItem};
use crate::modal::ModalKind;
use crate::model::{CustomColumn, Employee, EmployeeStatus, Lookups};
use crate::paths;
use crate::permissions::{PermissionOracle, Resource, Verb};
use crate::row::FieldValue;

pub struct EmployeesTable;

fn user_cell(employee: &Employee, _: &Lookups) -> Cell {
    Cell::Avatar {
        name: employee.full_name(),
        to: employee
            .active
            .then(|| paths::employee_account(employee.id.as_str())),
    }
}

fn status_cell(employee: &Employee, _: &Lookups) -> Cell {
    let status = employee.status();
    Cell::Enumerable {
        label: status.label().to_owned(),
        color: Some(status.color()),
    }
}

fn ids_where(rows: &[Employee], active: bool) -> Vec<String> {
    rows.iter()
        .filter(|row| row.active == active)
        .map(|row| row.id.as_str().to_owned())
        .collect()
}

impl TableSpec for EmployeesTable {
    type Row = Employee;
    type Field = NoBulkField;

    const TITLE: &'static str = "Employees";
    const TABLE: &'static str = "employee";

    fn columns(_lookups: &Lookups, custom: &[CustomColumn]) -> Result<ColumnSet<Employee>, ListError> {
        let mut columns = vec![
            ColumnDescriptor::computed(
                "user",
                "User",
                |employee: &Employee| FieldValue::Text(employee.full_name()),
                user_cell,
            )
            .with_icon(Icon::User),
            ColumnDescriptor::key("firstName", "First Name", |employee: &Employee, _| {
                Cell::text(&employee.first_name)
            })
            .with_icon(Icon::User),
            ColumnDescriptor::key("lastName", "Last Name", |employee: &Employee, _| {
                Cell::text(&employee.last_name)
            })
            .with_icon(Icon::User),
            ColumnDescriptor::key("email", "Email", |employee: &Employee, _| {
                Cell::text(&employee.email)
            })
            .with_icon(Icon::Email),
            ColumnDescriptor::key("employeeTypeId", "Employee Type", |employee: &Employee, lookups| {
                Cell::Enumerable {
                    label: lookups
                        .employee_type_name(employee.employee_type_id.as_ref())
                        .to_owned(),
                    color: None,
                }
            })
            .with_icon(Icon::Identifier)
            .with_filter(FilterSpec::Dynamic(ReferenceSource::EmployeeTypes)),
            ColumnDescriptor::key("active", "Active", |employee: &Employee, _| {
                Cell::Checkbox(employee.active)
            })
            .with_icon(Icon::Check)
            .with_filter(FilterSpec::Static(boolean_options())),
            ColumnDescriptor::key("employeeStatusId", "Employee Status", status_cell)
                .with_icon(Icon::Status)
                .with_filter(FilterSpec::Static(
                    EmployeeStatus::ALL
                        .iter()
                        .map(|status| FilterOption::new(status.code(), status.label()))
                        .collect(),
                )),
        ];
        columns.extend(custom.iter().map(ColumnDescriptor::custom));
        ColumnSet::new(columns)
    }

    fn default_hidden() -> &'static [&'static str] {
        &["firstName", "lastName"]
    }

    fn default_pinned() -> &'static [&'static str] {
        &["user"]
    }

    fn primary_action(permissions: &dyn PermissionOracle) -> Option<PrimaryAction> {
        permissions
            .can(Verb::Create, Resource::Users)
            .then(|| PrimaryAction {
                label: "New Account",
                to: paths::new_employee(),
            })
    }

    fn selectable(permissions: &dyn PermissionOracle) -> bool {
        permissions.can(Verb::Update, Resource::Users)
    }

    fn bulk_actions(selected: &[Employee], permissions: &dyn PermissionOracle) -> Vec<MenuEntry> {
        let all_inactive = selected.iter().all(|row| !row.active);
        let all_active = selected.iter().all(|row| row.active);
        vec![
            MenuEntry::Item(
                MenuItem::new(
                    "Edit Permissions",
                    MenuCommand::OpenModal {
                        kind: ModalKind::EditPermissions,
                        targets: ids_where(selected, true),
                    },
                )
                .icon(MenuIcon::Permissions)
                .enabled_if(permissions.can(Verb::Update, Resource::Users) && !all_inactive),
            ),
            MenuEntry::Item(
                MenuItem::new(
                    "Resend Invite",
                    MenuCommand::OpenModal {
                        kind: ModalKind::ResendInvite,
                        targets: ids_where(selected, false),
                    },
                )
                .icon(MenuIcon::Invite)
                .enabled_if(permissions.can(Verb::Create, Resource::Users) && !all_active),
            ),
            MenuEntry::Item(
                MenuItem::new(
                    "Deactivate Users",
                    MenuCommand::OpenModal {
                        kind: ModalKind::DeactivateUsers,
                        targets: ids_where(selected, true),
                    },
                )
                .icon(MenuIcon::Deactivate)
                .destructive()
                .enabled_if(permissions.can(Verb::Delete, Resource::Users) && !all_inactive),
            ),
        ]
    }

    fn context_menu(
        employee: &Employee,
        permissions: &dyn PermissionOracle,
        query: &str,
    ) -> Vec<MenuEntry> {
        let id = employee.id.as_str().to_owned();
        let can_delete = permissions.can(Verb::Delete, Resource::Users);
        if employee.active {
            vec![
                MenuEntry::Item(
                    MenuItem::new(
                        "Edit Permissions",
                        MenuCommand::Navigate(paths::with_query(
                            &paths::employee_account(&id),
                            query,
                        )),
                    )
                    .icon(MenuIcon::Edit),
                ),
                MenuEntry::Item(
                    MenuItem::new(
                        "Deactivate Account",
                        MenuCommand::OpenModal {
                            kind: ModalKind::DeactivateUsers,
                            targets: vec![id],
                        },
                    )
                    .icon(MenuIcon::Deactivate)
                    .destructive()
                    .enabled_if(can_delete),
                ),
            ]
        } else {
            vec![
                MenuEntry::Item(
                    MenuItem::new(
                        "Resend Account Invite",
                        MenuCommand::OpenModal {
                            kind: ModalKind::ResendInvite,
                            targets: vec![id.clone()],
                        },
                    )
                    .icon(MenuIcon::Invite),
                ),
                MenuEntry::Item(
                    MenuItem::new(
                        "Revoke Invite",
                        MenuCommand::OpenModal {
                            kind: ModalKind::RevokeInvite,
                            targets: vec![id],
                        },
                    )
                    .icon(MenuIcon::Deactivate)
                    .destructive()
                    .enabled_if(can_delete),
                ),
            ]
        }
    }

    fn display_name(employee: &Employee) -> String {
        employee.full_name()
    }
}

#[cfg(test)]
mod tests {
    use super::EmployeesTable;
    use crate::controller::TableSpec;
    use crate::menu::{MenuCommand, find_item};
    use crate::{
        Capability, Cell, Employee, EmployeeId, EmployeeTypeId, Lookups, Permissions, Resource,
        Role, StatusColor, Verb,
    };

    fn employee(id: &str, active: bool) -> Employee {
        Employee {
            id: EmployeeId::new(id),
            first_name: "Avery".to_owned(),
            last_name: "Walker".to_owned(),
            email: format!("{id}@example.com"),
            employee_type_id: Some(EmployeeTypeId::new("missing")),
            active,
            employee_status_id: Some("2".to_owned()),
        }
    }

    #[test]
    fn inactive_row_offers_invite_actions() {
        let permissions = Permissions::all(Role::Employee);
        let entries = EmployeesTable::context_menu(&employee("E1", false), &permissions, "");
        assert!(find_item(&entries, "Resend Account Invite").is_some());
        assert!(find_item(&entries, "Revoke Invite").is_some());
        assert!(find_item(&entries, "Deactivate Account").is_none());
    }

    #[test]
    fn edit_permissions_keeps_query_string() {
        let permissions = Permissions::all(Role::Employee);
        let entries = EmployeesTable::context_menu(&employee("E1", true), &permissions, "limit=5");
        let edit = find_item(&entries, "Edit Permissions").expect("edit item");
        assert_eq!(
            edit.command,
            MenuCommand::Navigate("/x/users/employees/E1?limit=5".to_owned())
        );
    }

    #[test]
    fn deactivate_is_disabled_without_delete_users() {
        let permissions = Permissions::all(Role::Employee)
            .without(Capability::new(Verb::Delete, Resource::Users));
        let entries = EmployeesTable::context_menu(&employee("E1", true), &permissions, "");
        assert!(find_item(&entries, "Deactivate Account").is_some_and(|item| !item.enabled));
    }

    #[test]
    fn bulk_actions_target_matching_rows() {
        let permissions = Permissions::all(Role::Employee);
        let selected = vec![employee("E1", true), employee("E2", false)];
        let entries = EmployeesTable::bulk_actions(&selected, &permissions);

        let resend = find_item(&entries, "Resend Invite").expect("resend");
        assert!(resend.enabled);
        assert!(matches!(
            &resend.command,
            MenuCommand::OpenModal { targets, .. } if targets == &vec!["E2".to_owned()]
        ));

        let only_inactive = vec![employee("E2", false)];
        let entries = EmployeesTable::bulk_actions(&only_inactive, &permissions);
        assert!(find_item(&entries, "Deactivate Users").is_some_and(|item| !item.enabled));
        assert!(find_item(&entries, "Edit Permissions").is_some_and(|item| !item.enabled));
    }

    #[test]
    fn unknown_employee_type_renders_empty_label() -> anyhow::Result<()> {
        let columns = EmployeesTable::columns(&Lookups::default(), &[])?;
        let row = employee("E1", true);
        let kind = columns.get("employeeTypeId").expect("type column");
        assert_eq!(kind.cell(&row, &Lookups::default()).display(), "");

        let status = columns.get("employeeStatusId").expect("status column");
        assert_eq!(
            status.cell(&row, &Lookups::default()),
            Cell::Enumerable {
                label: "In Transit".to_owned(),
                color: Some(StatusColor::Yellow),
            }
        );
        Ok(())
    }

    #[test]
    fn inactive_user_cell_has_no_link() -> anyhow::Result<()> {
        let columns = EmployeesTable::columns(&Lookups::default(), &[])?;
        let user = columns.get("user").expect("user column");
        assert!(user.cell(&employee("E1", false), &Lookups::default()).link_target().is_none());
        assert_eq!(
            user.cell(&employee("E1", true), &Lookups::default()).link_target(),
            Some("/x/users/employees/E1")
        );
        Ok(())
    }

    #[test]
    fn selection_requires_update_users() {
        let permissions = Permissions::all(Role::Employee)
            .without(Capability::new(Verb::Update, Resource::Users));
        assert!(!EmployeesTable::selectable(&permissions));
    }
}
