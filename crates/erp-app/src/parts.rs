// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::bulk::{BulkField, PartBulkField};
use crate::columns::{Cell, ColumnDescriptor, ColumnSet, Icon};
use crate::confirm::ConfirmDelete;
use crate::controller::{PrimaryAction, TableSpec};
use crate::error::ListError;
use crate::filters::{FilterOption, FilterSpec, ReferenceSource, boolean_options};
use crate::menu::{MenuCommand, MenuEntry, MenuIcon, MenuItem};
use crate::model::{CustomColumn, Lookups, MethodType, Part, ReplenishmentSystem, TrackingType};
use crate::paths;
use crate::permissions::{PermissionOracle, Resource, Verb};

pub struct PartsTable;

fn static_options(values: &[&'static str]) -> FilterSpec {
    FilterSpec::Static(
        values
            .iter()
            .map(|value| FilterOption::new(*value, *value))
            .collect(),
    )
}

fn identifier_cell(part: &Part, _: &Lookups) -> Cell {
    Cell::Link {
        label: part.readable_id_with_revision.clone(),
        sub_label: Some(part.name.clone()),
        thumbnail: part.thumbnail_path.clone(),
        to: paths::part_details(part.id.as_str()),
    }
}

impl TableSpec for PartsTable {
    type Row = Part;
    type Field = PartBulkField;

    const TITLE: &'static str = "Parts";
    const TABLE: &'static str = "item";

    fn columns(_lookups: &Lookups, custom: &[CustomColumn]) -> Result<ColumnSet<Part>, ListError> {
        let mut columns = vec![
            ColumnDescriptor::key("id", "Part ID", identifier_cell).with_icon(Icon::Identifier),
            ColumnDescriptor::key("description", "Description", |part: &Part, _| {
                Cell::text(&part.description)
            })
            .with_icon(Icon::Text),
            ColumnDescriptor::key("itemTrackingType", "Tracking", |part: &Part, _| {
                Cell::Badge(part.item_tracking_type.as_str().to_owned())
            })
            .with_icon(Icon::Tracking)
            .with_filter(static_options(&TrackingType::ALL.map(TrackingType::as_str))),
            ColumnDescriptor::key("defaultMethodType", "Default Method", |part: &Part, _| {
                Cell::Badge(part.default_method_type.as_str().to_owned())
            })
            .with_icon(Icon::Method)
            .with_filter(static_options(&MethodType::ALL.map(MethodType::as_str))),
            ColumnDescriptor::key("replenishmentSystem", "Replenishment", |part: &Part, _| {
                Cell::Enumerable {
                    label: part.replenishment_system.as_str().to_owned(),
                    color: None,
                }
            })
            .with_icon(Icon::Replenishment)
            .with_filter(static_options(
                &ReplenishmentSystem::ALL.map(ReplenishmentSystem::as_str),
            )),
            ColumnDescriptor::key("tags", "Tags", |part: &Part, _| Cell::Tags(part.tags.clone()))
                .with_icon(Icon::Tag)
                .with_filter(FilterSpec::ArrayValued(ReferenceSource::Tags)),
            ColumnDescriptor::key("active", "Active", |part: &Part, _| Cell::Checkbox(part.active))
                .with_icon(Icon::Check)
                .with_plural("Active Statuses")
                .with_filter(FilterSpec::Static(boolean_options())),
            ColumnDescriptor::key("createdBy", "Created By", |part: &Part, lookups| {
                Cell::avatar(lookups.person_name(Some(&part.created_by)))
            })
            .with_icon(Icon::User)
            .with_filter(FilterSpec::Dynamic(ReferenceSource::People)),
            ColumnDescriptor::key("createdAt", "Created At", |part: &Part, _| {
                Cell::Date(part.created_at)
            })
            .with_icon(Icon::Date),
            ColumnDescriptor::key("updatedBy", "Updated By", |part: &Part, lookups| {
                match part.updated_by.as_ref() {
                    Some(id) => Cell::avatar(lookups.person_name(Some(id))),
                    None => Cell::Empty,
                }
            })
            .with_icon(Icon::User)
            .with_filter(FilterSpec::Dynamic(ReferenceSource::People)),
            ColumnDescriptor::key("updatedAt", "Updated At", |part: &Part, _| {
                part.updated_at.map_or(Cell::Empty, Cell::Date)
            })
            .with_icon(Icon::Date),
        ];
        columns.extend(custom.iter().map(ColumnDescriptor::custom));
        ColumnSet::new(columns)
    }

    fn default_hidden() -> &'static [&'static str] {
        &[
            "description",
            "active",
            "createdBy",
            "createdAt",
            "updatedBy",
            "updatedAt",
        ]
    }

    fn default_pinned() -> &'static [&'static str] {
        &["id"]
    }

    fn primary_action(permissions: &dyn PermissionOracle) -> Option<PrimaryAction> {
        permissions
            .can(Verb::Create, Resource::Parts)
            .then(|| PrimaryAction {
                label: "New Part",
                to: paths::new_part(),
            })
    }

    fn bulk_actions(_selected: &[Part], permissions: &dyn PermissionOracle) -> Vec<MenuEntry> {
        let can_update = permissions.can(Verb::Update, Resource::Parts);
        PartBulkField::all()
            .iter()
            .map(|field| MenuEntry::Submenu {
                label: field.label().to_owned(),
                items: field
                    .domain()
                    .into_iter()
                    .map(|value| {
                        MenuItem::new(
                            value,
                            MenuCommand::BulkUpdate {
                                field: field.as_str(),
                                value,
                            },
                        )
                        .enabled_if(can_update)
                    })
                    .collect(),
            })
            .collect()
    }

    fn context_menu(part: &Part, permissions: &dyn PermissionOracle, _query: &str) -> Vec<MenuEntry> {
        let mut entries = vec![MenuEntry::Item(
            MenuItem::new(
                "Edit Part",
                MenuCommand::Navigate(paths::edit_part(part.id.as_str())),
            )
            .icon(MenuIcon::Edit),
        )];
        if part.revisions.len() > 1 {
            entries.push(MenuEntry::Submenu {
                label: "Versions".to_owned(),
                items: part
                    .revisions
                    .iter()
                    .map(|revision| {
                        MenuItem::new(
                            format!("Revision {}", revision.revision),
                            MenuCommand::Navigate(paths::part(revision.id.as_str())),
                        )
                        .icon(MenuIcon::Version)
                    })
                    .collect(),
            });
        }
        entries.push(MenuEntry::Item(
            MenuItem::new(
                "Delete Part",
                MenuCommand::ConfirmDelete(ConfirmDelete::new(
                    part.id.as_str(),
                    Self::display_name(part),
                    paths::delete_item(part.id.as_str()),
                )),
            )
            .icon(MenuIcon::Delete)
            .destructive()
            .enabled_if(permissions.can(Verb::Delete, Resource::Parts)),
        ));
        entries
    }

    /// Deletes are confirmed against the readable id, since names repeat
    /// across revisions.
    fn display_name(part: &Part) -> String {
        part.readable_id_with_revision.clone()
    }
}
