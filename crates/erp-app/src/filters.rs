// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::model::Lookups;
use crate::row::EntityRow;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 500;

/// `value` is the literal sent back in query parameters; `label` is display only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

impl FilterOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Side-loaded reference set a dynamic filter draws its options from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSource {
    Tags,
    People,
    EmployeeTypes,
}

impl ReferenceSource {
    pub fn options(self, lookups: &Lookups) -> Vec<FilterOption> {
        match self {
            Self::Tags => lookups
                .tags
                .iter()
                .map(|tag| FilterOption::new(&tag.name, &tag.name))
                .collect(),
            Self::People => lookups
                .people
                .iter()
                .map(|person| FilterOption::new(person.id.as_str(), &person.name))
                .collect(),
            Self::EmployeeTypes => lookups
                .employee_types
                .iter()
                .map(|kind| FilterOption::new(kind.id.as_str(), &kind.name))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    Static(Vec<FilterOption>),
    Dynamic(ReferenceSource),
    /// The row value is a list; a filter matches when any element is selected.
    ArrayValued(ReferenceSource),
}

impl FilterSpec {
    pub const fn semantics(&self) -> FilterSemantics {
        match self {
            Self::Static(_) | Self::Dynamic(_) => FilterSemantics::Equals,
            Self::ArrayValued(_) => FilterSemantics::ContainsAny,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterSemantics {
    Equals,
    ContainsAny,
}

impl FilterSemantics {
    pub const fn operator(self) -> &'static str {
        match self {
            Self::Equals => "in",
            Self::ContainsAny => "contains",
        }
    }

    pub fn parse_operator(value: &str) -> Option<Self> {
        match value {
            "in" | "eq" => Some(Self::Equals),
            "contains" => Some(Self::ContainsAny),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFilter {
    pub options: Vec<FilterOption>,
    pub semantics: FilterSemantics,
}

pub fn resolve(spec: &FilterSpec, lookups: &Lookups) -> ResolvedFilter {
    let raw = match spec {
        FilterSpec::Static(options) => options.clone(),
        FilterSpec::Dynamic(source) | FilterSpec::ArrayValued(source) => source.options(lookups),
    };
    let mut seen = HashSet::new();
    let options = raw
        .into_iter()
        .filter(|option| seen.insert(option.value.clone()))
        .collect();
    ResolvedFilter {
        options,
        semantics: spec.semantics(),
    }
}

/// Options for boolean-backed columns. Values are string literals because
/// they end up in query parameters.
pub fn boolean_options() -> Vec<FilterOption> {
    vec![
        FilterOption::new("true", "Active"),
        FilterOption::new("false", "Inactive"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub const fn flip(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    pub values: Vec<String>,
    pub semantics: FilterSemantics,
}

/// Filters, sort and window handed to a loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    pub filters: Vec<ColumnFilter>,
    pub sort: Option<Sort>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl ListQuery {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Replaces any filter already set on `column`. An empty value list removes it.
    pub fn set_filter(&mut self, column: &str, values: Vec<String>, semantics: FilterSemantics) {
        self.filters.retain(|filter| filter.column != column);
        if !values.is_empty() {
            self.filters.push(ColumnFilter {
                column: column.to_owned(),
                values,
                semantics,
            });
        }
        self.offset = 0;
    }

    pub fn filter_for(&self, column: &str) -> Option<&ColumnFilter> {
        self.filters.iter().find(|filter| filter.column == column)
    }

    pub fn page_index(&self) -> usize {
        self.offset.checked_div(self.limit).unwrap_or(0)
    }

    pub fn set_page(&mut self, index: usize) {
        self.offset = index.saturating_mul(self.limit);
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for filter in &self.filters {
            pairs.push((
                "filter".to_owned(),
                format!(
                    "{}:{}:{}",
                    filter.column,
                    filter.semantics.operator(),
                    filter
                        .values
                        .iter()
                        .map(|value| escape_filter_value(value))
                        .collect::<Vec<_>>()
                        .join(",")
                ),
            ));
        }
        if let Some(sort) = &self.sort {
            pairs.push((
                "sort".to_owned(),
                format!("{}:{}", sort.column, sort.direction.as_str()),
            ));
        }
        pairs.push(("limit".to_owned(), self.limit.to_string()));
        pairs.push(("offset".to_owned(), self.offset.to_string()));
        pairs
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.to_query_pairs() {
            serializer.append_pair(&key, &value);
        }
        serializer.finish()
    }

    pub fn from_query(query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut parsed = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "filter" => {
                    let mut parts = value.splitn(3, ':');
                    let (Some(column), Some(operator), Some(values)) =
                        (parts.next(), parts.next(), parts.next())
                    else {
                        bail!("filter {value:?} must look like `column:in:a,b`");
                    };
                    let semantics = FilterSemantics::parse_operator(operator)
                        .ok_or_else(|| anyhow!("unknown filter operator {operator:?}"))?;
                    let values = values
                        .split(',')
                        .filter(|value| !value.is_empty())
                        .map(unescape_filter_value)
                        .collect();
                    parsed.set_filter(column, values, semantics);
                }
                "sort" => {
                    let (column, direction) = value.split_once(':').unwrap_or((value.as_ref(), "asc"));
                    let direction = SortDirection::parse(direction)
                        .ok_or_else(|| anyhow!("unknown sort direction {direction:?}"))?;
                    parsed.sort = Some(Sort {
                        column: column.to_owned(),
                        direction,
                    });
                }
                "limit" => {
                    let limit: usize = value
                        .parse()
                        .with_context(|| format!("invalid limit {value:?}"))?;
                    if limit == 0 || limit > MAX_PAGE_SIZE {
                        bail!("limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}");
                    }
                    parsed.limit = limit;
                }
                "offset" => {
                    parsed.offset = value
                        .parse()
                        .with_context(|| format!("invalid offset {value:?}"))?;
                }
                _ => {}
            }
        }
        Ok(parsed)
    }

    /// Whether `row` passes every filter. Columns the row lacks never match.
    pub fn matches<R: EntityRow>(&self, row: &R) -> bool {
        self.filters.iter().all(|filter| {
            let value = row
                .field(&filter.column)
                .or_else(|| row.custom_field(&filter.column).cloned());
            let Some(value) = value else {
                return false;
            };
            value
                .query_literals()
                .iter()
                .any(|literal| filter.values.contains(literal))
        })
    }

    pub fn sort_rows<R: EntityRow>(&self, rows: &mut [R]) {
        let Some(sort) = &self.sort else {
            return;
        };
        rows.sort_by(|left, right| {
            let left = left
                .field(&sort.column)
                .map(|value| value.as_query_literal())
                .unwrap_or_default();
            let right = right
                .field(&sort.column)
                .map(|value| value.as_query_literal())
                .unwrap_or_default();
            let ordering = compare_labels(&left, &right);
            match sort.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }

    /// Filter, sort and window an in-memory collection. Returns the page and
    /// the number of rows that matched before windowing.
    pub fn apply<R: EntityRow>(&self, rows: impl IntoIterator<Item = R>) -> (Vec<R>, usize) {
        let mut matched: Vec<R> = rows.into_iter().filter(|row| self.matches(row)).collect();
        self.sort_rows(&mut matched);
        let count = matched.len();
        let page = matched
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect();
        (page, count)
    }
}

fn compare_labels(left: &str, right: &str) -> Ordering {
    left.to_lowercase().cmp(&right.to_lowercase())
}

/// Commas separate filter values, so a literal comma travels as `%2C`.
fn escape_filter_value(value: &str) -> String {
    value.replace('%', "%25").replace(',', "%2C")
}

fn unescape_filter_value(value: &str) -> String {
    value.replace("%2C", ",").replace("%25", "%")
}
