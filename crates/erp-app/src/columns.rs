// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::HashSet;
use std::rc::Rc;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::error::ListError;
use crate::filters::{FilterSpec, ResolvedFilter, resolve};
use crate::model::{CustomColumn, CustomColumnKind, Lookups, StatusColor};
use crate::row::{EntityRow, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icon {
    Identifier,
    Text,
    Tracking,
    Method,
    Replenishment,
    Tag,
    Check,
    User,
    Date,
    Email,
    Status,
    Custom,
}

impl Icon {
    /// Single-glyph marker shown in column headers.
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Identifier => "#",
            Self::Text => "T",
            Self::Tracking => "@",
            Self::Method => "~",
            Self::Replenishment => "+",
            Self::Tag => "%",
            Self::Check => "v",
            Self::User => "&",
            Self::Date => "d",
            Self::Email => "m",
            Self::Status => "*",
            Self::Custom => "?",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Text(String),
    Link {
        label: String,
        sub_label: Option<String>,
        thumbnail: Option<String>,
        to: String,
    },
    Badge(String),
    Enumerable {
        label: String,
        color: Option<StatusColor>,
    },
    Tags(Vec<String>),
    Checkbox(bool),
    Avatar {
        name: String,
        to: Option<String>,
    },
    Date(OffsetDateTime),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn avatar(name: impl Into<String>) -> Self {
        Self::Avatar {
            name: name.into(),
            to: None,
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(value) | Self::Badge(value) => value.clone(),
            Self::Link {
                label, sub_label, ..
            } => match sub_label {
                Some(sub) if !sub.is_empty() => format!("{label} {sub}"),
                _ => label.clone(),
            },
            Self::Enumerable { label, .. } => label.clone(),
            Self::Tags(tags) => tags.join(", "),
            Self::Checkbox(true) => "[x]".to_owned(),
            Self::Checkbox(false) => "[ ]".to_owned(),
            Self::Avatar { name, .. } => name.clone(),
            Self::Date(at) => at
                .format(format_description!("[month repr:short] [day padding:none], [year]"))
                .unwrap_or_default(),
        }
    }

    pub fn link_target(&self) -> Option<&str> {
        match self {
            Self::Link { to, .. } => Some(to),
            Self::Avatar { to, .. } => to.as_deref(),
            _ => None,
        }
    }
}

pub enum Accessor<R> {
    Key(&'static str),
    /// Reads `custom_fields[id]`; a missing entry renders empty.
    Custom(String),
    Computed(fn(&R) -> FieldValue),
}

impl<R> Clone for Accessor<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Key(key) => Self::Key(*key),
            Self::Custom(id) => Self::Custom(id.clone()),
            Self::Computed(read) => Self::Computed(*read),
        }
    }
}

impl<R> std::fmt::Debug for Accessor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Custom(id) => f.debug_tuple("Custom").field(id).finish(),
            Self::Computed(_) => f.write_str("Computed"),
        }
    }
}

pub enum CellRenderer<R> {
    Row(fn(&R, &Lookups) -> Cell),
    Custom(CustomColumnKind),
}

impl<R> Clone for CellRenderer<R> {
    fn clone(&self) -> Self {
        match self {
            Self::Row(render) => Self::Row(*render),
            Self::Custom(kind) => Self::Custom(kind.clone()),
        }
    }
}

impl<R> std::fmt::Debug for CellRenderer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Row(_) => f.write_str("Row"),
            Self::Custom(kind) => f.debug_tuple("Custom").field(kind).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDescriptor<R> {
    pub id: String,
    pub accessor: Accessor<R>,
    pub header: String,
    pub render: CellRenderer<R>,
    pub icon: Option<Icon>,
    pub plural_header: Option<String>,
    pub filter: Option<FilterSpec>,
}

impl<R: EntityRow> ColumnDescriptor<R> {
    pub fn key(key: &'static str, header: &str, render: fn(&R, &Lookups) -> Cell) -> Self {
        Self {
            id: key.to_owned(),
            accessor: Accessor::Key(key),
            header: header.to_owned(),
            render: CellRenderer::Row(render),
            icon: None,
            plural_header: None,
            filter: None,
        }
    }

    pub fn computed(
        id: &str,
        header: &str,
        read: fn(&R) -> FieldValue,
        render: fn(&R, &Lookups) -> Cell,
    ) -> Self {
        Self {
            id: id.to_owned(),
            accessor: Accessor::Computed(read),
            header: header.to_owned(),
            render: CellRenderer::Row(render),
            icon: None,
            plural_header: None,
            filter: None,
        }
    }

    pub fn custom(column: &CustomColumn) -> Self {
        let filter = match &column.kind {
            CustomColumnKind::List(options) => Some(FilterSpec::Static(
                options
                    .iter()
                    .map(|option| crate::filters::FilterOption::new(option, option))
                    .collect(),
            )),
            CustomColumnKind::Boolean => Some(FilterSpec::Static(crate::filters::boolean_options())),
            _ => None,
        };
        Self {
            id: column.id.clone(),
            accessor: Accessor::Custom(column.id.clone()),
            header: column.header.clone(),
            render: CellRenderer::Custom(column.kind.clone()),
            icon: Some(Icon::Custom),
            plural_header: None,
            filter,
        }
    }

    pub fn with_icon(mut self, icon: Icon) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn with_plural(mut self, plural: &str) -> Self {
        self.plural_header = Some(plural.to_owned());
        self
    }

    pub fn with_filter(mut self, filter: FilterSpec) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Header used when grouping filters, e.g. "Active Statuses".
    pub fn group_label(&self) -> &str {
        self.plural_header.as_deref().unwrap_or(&self.header)
    }

    pub fn value(&self, row: &R) -> Option<FieldValue> {
        match &self.accessor {
            Accessor::Key(key) => row.field(key),
            Accessor::Custom(id) => Some(row.custom_field(id).cloned().unwrap_or(FieldValue::Null)),
            Accessor::Computed(read) => Some(read(row)),
        }
    }

    pub fn cell(&self, row: &R, lookups: &Lookups) -> Cell {
        match &self.render {
            CellRenderer::Row(render) => render(row, lookups),
            CellRenderer::Custom(kind) => {
                let value = self.value(row).unwrap_or(FieldValue::Null);
                custom_cell(kind, &value)
            }
        }
    }

    pub fn resolved_filter(&self, lookups: &Lookups) -> Option<ResolvedFilter> {
        self.filter.as_ref().map(|spec| resolve(spec, lookups))
    }
}

fn custom_cell(kind: &CustomColumnKind, value: &FieldValue) -> Cell {
    match (kind, value) {
        (_, FieldValue::Null) => Cell::Empty,
        (CustomColumnKind::Boolean, FieldValue::Bool(flag)) => Cell::Checkbox(*flag),
        (CustomColumnKind::Boolean, FieldValue::Text(raw)) => Cell::Checkbox(raw == "true"),
        (CustomColumnKind::Date, FieldValue::Timestamp(at)) => Cell::Date(*at),
        (CustomColumnKind::List(_), FieldValue::Text(raw)) => Cell::Enumerable {
            label: raw.clone(),
            color: None,
        },
        (_, FieldValue::List(items)) => Cell::Tags(items.clone()),
        (_, other) => Cell::Text(other.as_query_literal()),
    }
}

/// Ordered column descriptors for one entity.
#[derive(Debug, Clone)]
pub struct ColumnSet<R> {
    columns: Vec<ColumnDescriptor<R>>,
}

impl<R: EntityRow> ColumnSet<R> {
    /// Rejects descriptors whose static filter lists a value twice.
    pub fn new(columns: Vec<ColumnDescriptor<R>>) -> Result<Self, ListError> {
        for column in &columns {
            if let Some(FilterSpec::Static(options)) = &column.filter {
                let mut seen = HashSet::new();
                for option in options {
                    if !seen.insert(option.value.as_str()) {
                        return Err(ListError::DuplicateFilterValue {
                            column: column.id.clone(),
                            value: option.value.clone(),
                        });
                    }
                }
            }
        }
        Ok(Self { columns })
    }

    /// Every key accessor must name a field present on every row.
    pub fn validate_rows(&self, rows: &[R]) -> Result<(), ListError> {
        for column in &self.columns {
            let Accessor::Key(key) = column.accessor else {
                continue;
            };
            if let Some(row) = rows.iter().find(|row| row.field(key).is_none()) {
                return Err(ListError::UnknownAccessor {
                    column: column.id.clone(),
                    field: key.to_owned(),
                    row: row.row_id(),
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&ColumnDescriptor<R>> {
        self.columns.iter().find(|column| column.id == id)
    }

    pub fn at(&self, index: usize) -> Option<&ColumnDescriptor<R>> {
        self.columns.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnDescriptor<R>> {
        self.columns.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Rebuilds a column set only when its inputs change.
#[derive(Debug)]
pub struct ColumnCache<R> {
    cached: Option<CachedColumns<R>>,
    builds: usize,
}

#[derive(Debug)]
struct CachedColumns<R> {
    lookups: Lookups,
    custom: Vec<CustomColumn>,
    columns: Rc<ColumnSet<R>>,
}

impl<R> Default for ColumnCache<R> {
    fn default() -> Self {
        Self {
            cached: None,
            builds: 0,
        }
    }
}

impl<R: EntityRow> ColumnCache<R> {
    pub fn get_or_build(
        &mut self,
        lookups: &Lookups,
        custom: &[CustomColumn],
        build: impl FnOnce(&Lookups, &[CustomColumn]) -> Result<ColumnSet<R>, ListError>,
    ) -> Result<Rc<ColumnSet<R>>, ListError> {
        if let Some(cached) = &self.cached {
            if cached.lookups == *lookups && cached.custom == custom {
                return Ok(Rc::clone(&cached.columns));
            }
        }
        let columns = Rc::new(build(lookups, custom)?);
        self.builds += 1;
        self.cached = Some(CachedColumns {
            lookups: lookups.clone(),
            custom: custom.to_vec(),
            columns: Rc::clone(&columns),
        });
        Ok(columns)
    }

    pub fn current(&self) -> Option<Rc<ColumnSet<R>>> {
        self.cached.as_ref().map(|cached| Rc::clone(&cached.columns))
    }

    pub fn builds(&self) -> usize {
        self.builds
    }
}

#[cfg(test)]
mod tests {
    use super::{Cell, ColumnCache, ColumnDescriptor, ColumnSet};
    use crate::filters::{FilterOption, FilterSpec};
    use crate::{
        CustomColumn, CustomColumnKind, Employee, EmployeeId, FieldValue, ListError, Lookups, Tag,
    };
    use std::rc::Rc;

    fn employee(id: &str) -> Employee {
        Employee {
            id: EmployeeId::new(id),
            first_name: "Avery".to_owned(),
            last_name: "Walker".to_owned(),
            email: "avery@example.com".to_owned(),
            employee_type_id: None,
            active: true,
            employee_status_id: None,
        }
    }

    fn build(_: &Lookups, custom: &[CustomColumn]) -> Result<ColumnSet<Employee>, ListError> {
        let mut columns = vec![ColumnDescriptor::key("email", "Email", |row: &Employee, _| {
            Cell::text(&row.email)
        })];
        columns.extend(custom.iter().map(ColumnDescriptor::custom));
        ColumnSet::new(columns)
    }

    #[test]
    fn duplicate_static_filter_value_is_rejected() {
        let column = ColumnDescriptor::key("email", "Email", |row: &Employee, _| {
            Cell::text(&row.email)
        })
        .with_filter(FilterSpec::Static(vec![
            FilterOption::new("a", "A"),
            FilterOption::new("a", "Again"),
        ]));
        let error = ColumnSet::new(vec![column]).expect_err("duplicate must fail");
        assert!(matches!(error, ListError::DuplicateFilterValue { .. }));
    }

    #[test]
    fn unknown_key_accessor_is_reported() -> anyhow::Result<()> {
        let set = ColumnSet::new(vec![ColumnDescriptor::key(
            "nickname",
            "Nickname",
            |_: &Employee, _| Cell::Empty,
        )])?;
        let error = set
            .validate_rows(&[employee("e1")])
            .expect_err("missing field must fail");
        assert!(matches!(error, ListError::UnknownAccessor { ref field, .. } if field == "nickname"));
        Ok(())
    }

    #[test]
    fn cache_returns_same_set_until_inputs_change() -> anyhow::Result<()> {
        let mut cache = ColumnCache::default();
        let lookups = Lookups::default();
        let first = cache.get_or_build(&lookups, &[], build)?;
        let second = cache.get_or_build(&lookups, &[], build)?;
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.builds(), 1);

        let changed = Lookups {
            tags: vec![Tag {
                name: "metal".to_owned(),
            }],
            ..Lookups::default()
        };
        let third = cache.get_or_build(&changed, &[], build)?;
        assert!(!Rc::ptr_eq(&first, &third));

        let custom = vec![CustomColumn {
            id: "badge".to_owned(),
            header: "Badge".to_owned(),
            kind: CustomColumnKind::Text,
        }];
        let fourth = cache.get_or_build(&changed, &custom, build)?;
        assert_eq!(fourth.ids(), vec!["email", "badge"]);
        assert_eq!(cache.builds(), 3);
        Ok(())
    }

    #[test]
    fn missing_custom_value_renders_empty() -> anyhow::Result<()> {
        let custom = CustomColumn {
            id: "shift".to_owned(),
            header: "Shift".to_owned(),
            kind: CustomColumnKind::List(vec!["day".to_owned(), "night".to_owned()]),
        };
        let column = ColumnDescriptor::<Employee>::custom(&custom);
        let row = employee("e1");
        assert_eq!(column.cell(&row, &Lookups::default()), Cell::Empty);
        assert_eq!(column.value(&row), Some(FieldValue::Null));
        Ok(())
    }
}
