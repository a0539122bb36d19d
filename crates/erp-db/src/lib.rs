// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use erp_app::{
    BarcodeUpload, BulkField, BulkUpdateRequest, Capability, ChangeEvent, ChangeKind, CompanyId,
    CustomColumn, CustomColumnKind, Employee, EmployeeId, EmployeeStatus, EmployeeType,
    EmployeeTypeId, EmployeesTable, FieldValue, FileId, ItemFile, ItemId, ListQuery, Lookups,
    MethodType, ModalAction, ModalKind, ModelUpload, Page, Part, PartBulkField, PartFormInput,
    PartRevision, PartSummary, PartsTable, Patch, Permissions, Person, ReplenishmentSystem, Role,
    SessionId, TableSpec, Tag, TrackingType, UpdateEndpoint, UpdateResponse, UploadId, UserId,
};
use erp_testkit::ErpFaker;
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use tracing::{debug, info, warn};

pub const APP_NAME: &str = "erp";
pub const MAX_DOCUMENT_SIZE: i64 = 50 << 20;
pub const DEFAULT_COMPANY: &str = "company-1";

const DEFAULT_EMPLOYEE_TYPES: [&str; 5] =
    ["Admin", "Engineering", "Operations", "Purchasing", "Sales"];

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    ("employee_types", &["id", "name"]),
    (
        "employees",
        &[
            "id",
            "company_id",
            "first_name",
            "last_name",
            "email",
            "employee_type_id",
            "active",
            "employee_status_id",
            "role",
            "invited_at",
            "created_at",
            "updated_at",
        ],
    ),
    ("user_permissions", &["employee_id", "capability"]),
    ("tags", &["name"]),
    (
        "barcode_uploads",
        &["id", "image_path", "name", "size", "serial_number"],
    ),
    ("model_uploads", &["id", "model_path", "name", "size"]),
    (
        "items",
        &[
            "id",
            "company_id",
            "readable_id",
            "revision",
            "name",
            "description",
            "notes",
            "thumbnail_path",
            "item_tracking_type",
            "default_method_type",
            "replenishment_system",
            "active",
            "barcode_upload_id",
            "model_upload_id",
            "custom_fields",
            "created_by",
            "created_at",
            "updated_by",
            "updated_at",
        ],
    ),
    ("item_tags", &["item_id", "tag"]),
    (
        "item_files",
        &[
            "id",
            "item_id",
            "name",
            "mime_type",
            "size_bytes",
            "sha256",
            "data",
            "created_at",
        ],
    ),
    (
        "custom_columns",
        &["id", "table_name", "header", "kind", "position"],
    ),
    ("sessions", &["token", "employee_id", "company_id", "created_at"]),
    (
        "change_log",
        &["revision", "table_name", "event", "row_id", "payload", "created_at"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_items_readable_id",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_items_readable_id ON items (readable_id, revision);",
    },
    RequiredIndex {
        name: "idx_employees_company_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_employees_company_id ON employees (company_id);",
    },
    RequiredIndex {
        name: "idx_employee_types_name",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_employee_types_name ON employee_types (name);",
    },
    RequiredIndex {
        name: "idx_item_tags_tag",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_item_tags_tag ON item_tags (tag);",
    },
    RequiredIndex {
        name: "idx_item_files_item_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_item_files_item_id ON item_files (item_id);",
    },
    RequiredIndex {
        name: "idx_change_log_table_name",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_change_log_table_name ON change_log (table_name, revision);",
    },
];

const PART_COLUMNS: &str = "
    id, readable_id, revision, name, description, thumbnail_path,
    item_tracking_type, default_method_type, replenishment_system, active,
    custom_fields, created_by, created_at, updated_by, updated_at
";

const EMPLOYEE_COLUMNS: &str = "
    id, first_name, last_name, email, employee_type_id, active, employee_status_id
";

/// Upload references stored on an item row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUploads {
    pub barcode_upload_id: Option<UploadId>,
    pub model_upload_id: Option<UploadId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItemFile {
    pub item_id: ItemId,
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: SessionId,
    pub employee_id: Option<EmployeeId>,
    pub company_id: Option<CompanyId>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug)]
struct PartRecord {
    id: String,
    readable_id: String,
    revision: i64,
    name: String,
    description: String,
    thumbnail_path: Option<String>,
    item_tracking_type: String,
    default_method_type: String,
    replenishment_system: String,
    active: bool,
    custom_fields: String,
    created_by: String,
    created_at: String,
    updated_by: Option<String>,
    updated_at: Option<String>,
}

impl PartRecord {
    fn into_part(self, tags: Vec<String>, revisions: Vec<PartRevision>) -> Result<Part> {
        let item_tracking_type = TrackingType::parse(&self.item_tracking_type)
            .ok_or_else(|| anyhow!("unknown tracking type {:?} on item {}", self.item_tracking_type, self.id))?;
        let default_method_type = MethodType::parse(&self.default_method_type)
            .ok_or_else(|| anyhow!("unknown method type {:?} on item {}", self.default_method_type, self.id))?;
        let replenishment_system = ReplenishmentSystem::parse(&self.replenishment_system)
            .ok_or_else(|| {
                anyhow!(
                    "unknown replenishment system {:?} on item {}",
                    self.replenishment_system,
                    self.id
                )
            })?;
        let custom_fields: BTreeMap<String, FieldValue> = serde_json::from_str(&self.custom_fields)
            .with_context(|| format!("decode custom fields of item {}", self.id))?;

        Ok(Part {
            readable_id_with_revision: format!("{}.{}", self.readable_id, self.revision),
            name: self.name,
            description: self.description,
            thumbnail_path: self.thumbnail_path,
            item_tracking_type,
            default_method_type,
            replenishment_system,
            tags,
            active: self.active,
            revisions,
            created_by: UserId::new(self.created_by),
            created_at: parse_datetime(&self.created_at)?,
            updated_by: self.updated_by.map(UserId::new),
            updated_at: parse_opt_datetime(self.updated_at)?,
            custom_fields,
            id: ItemId::new(self.id),
        })
    }
}

fn read_part_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PartRecord> {
    Ok(PartRecord {
        id: row.get(0)?,
        readable_id: row.get(1)?,
        revision: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        thumbnail_path: row.get(5)?,
        item_tracking_type: row.get(6)?,
        default_method_type: row.get(7)?,
        replenishment_system: row.get(8)?,
        active: row.get(9)?,
        custom_fields: row.get(10)?,
        created_by: row.get(11)?,
        created_at: row.get(12)?,
        updated_by: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn read_employee(row: &rusqlite::Row<'_>) -> rusqlite::Result<Employee> {
    let employee_type_id: Option<String> = row.get(4)?;
    Ok(Employee {
        id: EmployeeId::new(row.get::<_, String>(0)?),
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        employee_type_id: employee_type_id.map(EmployeeTypeId::new),
        active: row.get(5)?,
        employee_status_id: row.get(6)?,
    })
}

pub struct Store {
    conn: Connection,
    max_document_size: i64,
    id_counter: Cell<u64>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        debug!(path = %path.display(), "opened store");
        Ok(Self::with_connection(conn))
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn,
            max_document_size: MAX_DOCUMENT_SIZE,
            id_counter: Cell::new(0),
        }
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
            info!("created database schema");
        }

        ensure_required_indexes(&self.conn)?;

        self.seed_defaults()?;
        Ok(())
    }

    pub fn seed_defaults(&self) -> Result<()> {
        for name in DEFAULT_EMPLOYEE_TYPES {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO employee_types (id, name) VALUES (?, ?)",
                    params![erp_testkit::employee_type_id(name).as_str(), name],
                )
                .with_context(|| format!("insert default employee type {name}"))?;
        }
        for tag in erp_testkit::tags() {
            self.conn
                .execute("INSERT OR IGNORE INTO tags (name) VALUES (?)", params![tag])
                .with_context(|| format!("insert default tag {tag}"))?;
        }
        Ok(())
    }

    pub fn set_max_document_size(&mut self, value: i64) -> Result<()> {
        if value <= 0 {
            bail!("max document size must be positive, got {value}");
        }
        self.max_document_size = value;
        Ok(())
    }

    pub fn max_document_size(&self) -> i64 {
        self.max_document_size
    }

    /// Head of the change log; zero when nothing has been recorded.
    pub fn revision(&self) -> Result<u64> {
        let head: i64 = self
            .conn
            .query_row("SELECT COALESCE(MAX(revision), 0) FROM change_log", [], |row| {
                row.get(0)
            })
            .context("read change log head")?;
        u64::try_from(head).context("change log revision is negative")
    }

    pub fn changes_since(&self, revision: u64) -> Result<Vec<ChangeEvent>> {
        let after = i64::try_from(revision).context("revision overflow")?;
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT revision, table_name, event, payload
                FROM change_log
                WHERE revision > ?
                ORDER BY revision ASC
                ",
            )
            .context("prepare change log query")?;
        let rows = stmt
            .query_map(params![after], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("query change log")?;

        let mut events = Vec::new();
        for row in rows {
            let (revision, table, event, payload) = row.context("read change log row")?;
            let kind = ChangeKind::parse(&event)
                .ok_or_else(|| anyhow!("unknown change kind {event:?} at revision {revision}"))?;
            let new: Patch = serde_json::from_str(&payload)
                .with_context(|| format!("decode change payload at revision {revision}"))?;
            events.push(ChangeEvent {
                table,
                kind,
                revision: u64::try_from(revision).context("change log revision is negative")?,
                new,
            });
        }
        Ok(events)
    }

    pub fn lookups(&self) -> Result<Lookups> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM employee_types ORDER BY name ASC")
            .context("prepare employee types query")?;
        let employee_types = stmt
            .query_map([], |row| {
                Ok(EmployeeType {
                    id: EmployeeTypeId::new(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                })
            })
            .context("query employee types")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect employee types")?;

        let people = self
            .all_employees()?
            .into_iter()
            .map(|employee| Person {
                name: employee.full_name(),
                id: UserId::new(employee.id.into_inner()),
            })
            .collect();

        let mut stmt = self
            .conn
            .prepare("SELECT name FROM tags ORDER BY name ASC")
            .context("prepare tags query")?;
        let tags = stmt
            .query_map([], |row| Ok(Tag { name: row.get(0)? }))
            .context("query tags")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect tags")?;

        Ok(Lookups {
            employee_types,
            people,
            tags,
        })
    }

    pub fn custom_columns(&self, table: &str) -> Result<Vec<CustomColumn>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, header, kind
                FROM custom_columns
                WHERE table_name = ?
                ORDER BY position ASC, id ASC
                ",
            )
            .context("prepare custom columns query")?;
        let rows = stmt
            .query_map(params![table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .context("query custom columns")?;

        let mut columns = Vec::new();
        for row in rows {
            let (id, header, kind) = row.context("read custom column")?;
            let kind: CustomColumnKind = serde_json::from_str(&kind)
                .with_context(|| format!("decode kind of custom column {id}"))?;
            columns.push(CustomColumn { id, header, kind });
        }
        Ok(columns)
    }

    pub fn add_custom_column(&self, table: &str, column: &CustomColumn) -> Result<()> {
        let kind = serde_json::to_string(&column.kind).context("encode custom column kind")?;
        self.conn
            .execute(
                "
                INSERT INTO custom_columns (id, table_name, header, kind, position)
                VALUES (?, ?, ?, ?, (SELECT COUNT(*) FROM custom_columns WHERE table_name = ?))
                ",
                params![column.id, table, column.header, kind, table],
            )
            .with_context(|| format!("insert custom column {} on {table}", column.id))?;
        Ok(())
    }

    // Parts

    pub fn list_parts(&self, query: &ListQuery) -> Result<Page<Part>> {
        let revision = self.revision()?;
        let parts = self.all_parts()?;
        let (rows, count) = query.apply(parts);
        debug!(rows = rows.len(), count, revision, "loaded parts page");
        Ok(Page {
            rows,
            count,
            revision,
        })
    }

    pub fn get_part(&self, item_id: &ItemId) -> Result<Part> {
        self.find_part(item_id)?
            .ok_or_else(|| anyhow!("part {item_id} not found -- choose an existing part and retry"))
    }

    pub fn find_part(&self, item_id: &ItemId) -> Result<Option<Part>> {
        let Some(record) = self
            .conn
            .query_row(
                &format!("SELECT {PART_COLUMNS} FROM items WHERE id = ?"),
                params![item_id.as_str()],
                read_part_record,
            )
            .optional()
            .with_context(|| format!("load part {item_id}"))?
        else {
            return Ok(None);
        };
        let tags = self.item_tags()?.remove(item_id.as_str()).unwrap_or_default();
        let revisions = self.revisions_for(&record.readable_id)?;
        record.into_part(tags, revisions).map(Some)
    }

    fn all_parts(&self) -> Result<Vec<Part>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {PART_COLUMNS} FROM items ORDER BY readable_id ASC, revision ASC"
            ))
            .context("prepare parts query")?;
        let records = stmt
            .query_map([], read_part_record)
            .context("query parts")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect parts")?;

        let mut tags = self.item_tags()?;
        let mut revisions: BTreeMap<String, Vec<PartRevision>> = BTreeMap::new();
        for record in &records {
            revisions
                .entry(record.readable_id.clone())
                .or_default()
                .push(PartRevision {
                    id: ItemId::new(record.id.clone()),
                    revision: u32::try_from(record.revision)
                        .with_context(|| format!("revision of item {}", record.id))?,
                });
        }

        records
            .into_iter()
            .map(|record| {
                let item_tags = tags.remove(&record.id).unwrap_or_default();
                let siblings = revisions.get(&record.readable_id).cloned().unwrap_or_default();
                record.into_part(item_tags, siblings)
            })
            .collect()
    }

    fn item_tags(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT item_id, tag FROM item_tags ORDER BY item_id ASC, tag ASC")
            .context("prepare item tags query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("query item tags")?;
        let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let (item_id, tag) = row.context("read item tag")?;
            tags.entry(item_id).or_default().push(tag);
        }
        Ok(tags)
    }

    fn revisions_for(&self, readable_id: &str) -> Result<Vec<PartRevision>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, revision FROM items WHERE readable_id = ? ORDER BY revision ASC")
            .context("prepare revisions query")?;
        let rows = stmt
            .query_map(params![readable_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .context("query revisions")?;
        let mut revisions = Vec::new();
        for row in rows {
            let (id, revision) = row.context("read revision")?;
            revisions.push(PartRevision {
                revision: u32::try_from(revision)
                    .with_context(|| format!("revision of item {id}"))?,
                id: ItemId::new(id),
            });
        }
        Ok(revisions)
    }

    /// Inserts a fully formed part. `readable_id_with_revision` is split at
    /// its last `.` into the readable id and numeric revision.
    pub fn insert_part(&self, part: &Part, company_id: &CompanyId) -> Result<()> {
        let (readable_id, revision) = split_readable_id(&part.readable_id_with_revision);
        let custom_fields =
            serde_json::to_string(&part.custom_fields).context("encode custom fields")?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin part insert")?;
        tx.execute(
            "
            INSERT INTO items (
              id, company_id, readable_id, revision, name, description, thumbnail_path,
              item_tracking_type, default_method_type, replenishment_system, active,
              custom_fields, created_by, created_at, updated_by, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                part.id.as_str(),
                company_id.as_str(),
                readable_id,
                revision,
                part.name,
                part.description,
                part.thumbnail_path,
                part.item_tracking_type.as_str(),
                part.default_method_type.as_str(),
                part.replenishment_system.as_str(),
                part.active,
                custom_fields,
                part.created_by.as_str(),
                format_datetime(part.created_at)?,
                part.updated_by.as_ref().map(UserId::as_str),
                part.updated_at.map(format_datetime).transpose()?,
            ],
        )
        .with_context(|| format!("insert part {}", part.id))?;
        for tag in &part.tags {
            tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?)", params![tag])
                .with_context(|| format!("insert tag {tag}"))?;
            tx.execute(
                "INSERT OR IGNORE INTO item_tags (item_id, tag) VALUES (?, ?)",
                params![part.id.as_str(), tag],
            )
            .with_context(|| format!("tag part {} with {tag}", part.id))?;
        }
        record_change(
            &tx,
            PartsTable::TABLE,
            ChangeKind::Insert,
            &part_patch(part),
        )?;
        tx.commit().context("commit part insert")?;
        Ok(())
    }

    /// Copies `item_id` into the next revision under the same readable id.
    pub fn add_revision(&self, item_id: &ItemId, created_by: &UserId) -> Result<ItemId> {
        let source = self.get_part(item_id)?;
        let readable_id = split_readable_id(&source.readable_id_with_revision)
            .0
            .to_owned();
        let next = source
            .revisions
            .iter()
            .map(|revision| revision.revision)
            .max()
            .unwrap_or(1)
            + 1;
        let company_id: String = self
            .conn
            .query_row(
                "SELECT company_id FROM items WHERE id = ?",
                params![item_id.as_str()],
                |row| row.get(0),
            )
            .with_context(|| format!("load company of part {item_id}"))?;

        let new_id = ItemId::new(self.next_id("item")?);
        let part = Part {
            id: new_id.clone(),
            readable_id_with_revision: format!("{readable_id}.{next}"),
            created_by: created_by.clone(),
            created_at: OffsetDateTime::now_utc(),
            updated_by: None,
            updated_at: None,
            revisions: Vec::new(),
            ..source
        };
        self.insert_part(&part, &CompanyId::new(company_id))?;
        info!(source = %item_id, revision = next, id = %new_id, "added part revision");
        Ok(new_id)
    }

    /// Applies an edit form to an existing part, or creates the part when
    /// `item_id` is unknown.
    pub fn upsert_part(
        &self,
        item_id: &ItemId,
        input: &PartFormInput,
        updated_by: &UserId,
    ) -> Result<Part> {
        input.validate()?;
        let exists = self.part_exists(item_id)?;
        if !exists {
            let part = Part {
                id: item_id.clone(),
                readable_id_with_revision: format!("{}.1", item_id.as_str()),
                name: input.name.trim().to_owned(),
                description: input.description.clone(),
                thumbnail_path: None,
                item_tracking_type: input.item_tracking_type,
                default_method_type: input.default_method_type,
                replenishment_system: input.replenishment_system,
                tags: Vec::new(),
                active: input.active,
                revisions: Vec::new(),
                created_by: updated_by.clone(),
                created_at: OffsetDateTime::now_utc(),
                updated_by: None,
                updated_at: None,
                custom_fields: input.custom_fields.clone(),
            };
            self.insert_part(&part, &CompanyId::new(DEFAULT_COMPANY))?;
            info!(id = %item_id, "created part");
            return self.get_part(item_id);
        }

        let mut custom_fields = self.get_part(item_id)?.custom_fields;
        custom_fields.extend(input.custom_fields.clone());
        let encoded = serde_json::to_string(&custom_fields).context("encode custom fields")?;
        let now = OffsetDateTime::now_utc();

        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin part update")?;
        tx.execute(
            "
            UPDATE items
            SET
              name = ?,
              description = ?,
              replenishment_system = ?,
              default_method_type = ?,
              item_tracking_type = ?,
              active = ?,
              custom_fields = ?,
              updated_by = ?,
              updated_at = ?
            WHERE id = ?
            ",
            params![
                input.name.trim(),
                input.description,
                input.replenishment_system.as_str(),
                input.default_method_type.as_str(),
                input.item_tracking_type.as_str(),
                input.active,
                encoded,
                updated_by.as_str(),
                format_datetime(now)?,
                item_id.as_str(),
            ],
        )
        .with_context(|| format!("update part {item_id}"))?;

        let mut patch = Patch::new(item_id.as_str())
            .with("name", FieldValue::text(input.name.trim()))
            .with("description", FieldValue::text(&input.description))
            .with(
                "replenishmentSystem",
                FieldValue::text(input.replenishment_system.as_str()),
            )
            .with(
                "defaultMethodType",
                FieldValue::text(input.default_method_type.as_str()),
            )
            .with(
                "itemTrackingType",
                FieldValue::text(input.item_tracking_type.as_str()),
            )
            .with("active", FieldValue::Bool(input.active))
            .with("updatedBy", FieldValue::text(updated_by.as_str()))
            .with("updatedAt", FieldValue::Timestamp(now));
        for (id, value) in &input.custom_fields {
            patch = patch.with(&format!("customFields.{id}"), value.clone());
        }
        record_change(&tx, PartsTable::TABLE, ChangeKind::Update, &patch)?;
        tx.commit().context("commit part update")?;
        info!(id = %item_id, by = %updated_by, "updated part");
        self.get_part(item_id)
    }

    fn part_exists(&self, item_id: &ItemId) -> Result<bool> {
        let exists: i64 = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM items WHERE id = ?)",
                params![item_id.as_str()],
                |row| row.get(0),
            )
            .with_context(|| format!("check part {item_id}"))?;
        Ok(exists == 1)
    }

    pub fn set_part_notes(&self, item_id: &ItemId, notes: &str) -> Result<()> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE items SET notes = ? WHERE id = ?",
                params![notes, item_id.as_str()],
            )
            .with_context(|| format!("update notes of part {item_id}"))?;
        if rows_affected == 0 {
            bail!("part {item_id} not found -- choose an existing part and retry");
        }
        Ok(())
    }

    /// Applies one field value to many items atomically. Rejections come back
    /// as an error payload, never as `Err`.
    pub fn bulk_update_items(&self, request: &BulkUpdateRequest) -> Result<UpdateResponse> {
        if request.identifiers.is_empty() {
            return Ok(UpdateResponse::failed("no items selected"));
        }
        let Some(field) = PartBulkField::parse(&request.field) else {
            return Ok(UpdateResponse::failed(format!(
                "{} cannot be updated in bulk",
                request.field
            )));
        };
        if !field.domain().contains(&request.value.as_str()) {
            return Ok(UpdateResponse::failed(format!(
                "{:?} is not a valid {}",
                request.value,
                field.label()
            )));
        }
        let column = match field {
            PartBulkField::ReplenishmentSystem => "replenishment_system",
            PartBulkField::DefaultMethodType => "default_method_type",
            PartBulkField::ItemTrackingType => "item_tracking_type",
        };

        let now = OffsetDateTime::now_utc();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin bulk update")?;
        for id in &request.identifiers {
            let rows_affected = tx
                .execute(
                    &format!("UPDATE items SET {column} = ?, updated_at = ? WHERE id = ?"),
                    params![request.value, format_datetime(now)?, id],
                )
                .with_context(|| format!("bulk update item {id}"))?;
            if rows_affected == 0 {
                warn!(%id, field = %request.field, "bulk update hit a missing item");
                return Ok(UpdateResponse::failed(format!("item {id} no longer exists")));
            }
            let patch = Patch::new(id.as_str())
                .with(&request.field, FieldValue::text(&request.value))
                .with("updatedAt", FieldValue::Timestamp(now));
            record_change(&tx, PartsTable::TABLE, ChangeKind::Update, &patch)?;
        }
        tx.commit().context("commit bulk update")?;
        info!(
            field = %request.field,
            value = %request.value,
            rows = request.identifiers.len(),
            "bulk updated items"
        );
        Ok(UpdateResponse::ok())
    }

    pub fn delete_item(&self, item_id: &ItemId) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin item delete")?;
        let rows_affected = tx
            .execute("DELETE FROM items WHERE id = ?", params![item_id.as_str()])
            .with_context(|| format!("delete item {item_id}"))?;
        if rows_affected == 0 {
            bail!("item {item_id} not found or already deleted");
        }
        record_change(
            &tx,
            PartsTable::TABLE,
            ChangeKind::Delete,
            &Patch::new(item_id.as_str()),
        )?;
        tx.commit().context("commit item delete")?;
        info!(id = %item_id, "deleted item");
        Ok(())
    }

    // Uploads and files

    pub fn attach_barcode_upload(&self, item_id: &ItemId, upload: &BarcodeUpload) -> Result<()> {
        self.conn
            .execute(
                "
                INSERT INTO barcode_uploads (id, image_path, name, size, serial_number)
                VALUES (?, ?, ?, ?, ?)
                ",
                params![
                    upload.id.as_str(),
                    upload.image_path,
                    upload.name,
                    upload.size,
                    upload.serial_number,
                ],
            )
            .with_context(|| format!("insert barcode upload {}", upload.id))?;
        self.set_upload_column(item_id, "barcode_upload_id", &upload.id)
    }

    pub fn attach_model_upload(&self, item_id: &ItemId, upload: &ModelUpload) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO model_uploads (id, model_path, name, size) VALUES (?, ?, ?, ?)",
                params![upload.id.as_str(), upload.model_path, upload.name, upload.size],
            )
            .with_context(|| format!("insert model upload {}", upload.id))?;
        self.set_upload_column(item_id, "model_upload_id", &upload.id)
    }

    fn set_upload_column(&self, item_id: &ItemId, column: &str, upload_id: &UploadId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute(
                &format!("UPDATE items SET {column} = ? WHERE id = ?"),
                params![upload_id.as_str(), item_id.as_str()],
            )
            .with_context(|| format!("link {column} on item {item_id}"))?;
        if rows_affected == 0 {
            bail!("item {item_id} not found -- choose an existing part and retry");
        }
        Ok(())
    }

    pub fn get_item_uploads(&self, item_id: &ItemId) -> Result<ItemUploads> {
        self.conn
            .query_row(
                "SELECT barcode_upload_id, model_upload_id FROM items WHERE id = ?",
                params![item_id.as_str()],
                |row| {
                    Ok(ItemUploads {
                        barcode_upload_id: row.get::<_, Option<String>>(0)?.map(UploadId::new),
                        model_upload_id: row.get::<_, Option<String>>(1)?.map(UploadId::new),
                    })
                },
            )
            .optional()
            .with_context(|| format!("load uploads of item {item_id}"))?
            .ok_or_else(|| anyhow!("item {item_id} not found"))
    }

    pub fn get_barcode_upload(&self, upload_id: &UploadId) -> Result<Option<BarcodeUpload>> {
        self.conn
            .query_row(
                "SELECT id, image_path, name, size, serial_number FROM barcode_uploads WHERE id = ?",
                params![upload_id.as_str()],
                |row| {
                    Ok(BarcodeUpload {
                        id: UploadId::new(row.get::<_, String>(0)?),
                        image_path: row.get(1)?,
                        name: row.get(2)?,
                        size: row.get(3)?,
                        serial_number: row.get(4)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("load barcode upload {upload_id}"))
    }

    pub fn get_model_upload(&self, upload_id: &UploadId) -> Result<Option<ModelUpload>> {
        self.conn
            .query_row(
                "SELECT id, model_path, name, size FROM model_uploads WHERE id = ?",
                params![upload_id.as_str()],
                |row| {
                    Ok(ModelUpload {
                        id: UploadId::new(row.get::<_, String>(0)?),
                        model_path: row.get(1)?,
                        name: row.get(2)?,
                        size: row.get(3)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("load model upload {upload_id}"))
    }

    pub fn insert_item_file(&self, file: &NewItemFile) -> Result<FileId> {
        let size = i64::try_from(file.data.len()).context("file size overflow")?;
        if size > self.max_document_size {
            bail!(
                "file is {} bytes but max allowed is {}; shrink the file and retry",
                size,
                self.max_document_size
            );
        }
        if !self.part_exists(&file.item_id)? {
            bail!("item {} not found -- attach files to an existing part", file.item_id);
        }

        let id = FileId::new(self.next_id("file")?);
        self.conn
            .execute(
                "
                INSERT INTO item_files (id, item_id, name, mime_type, size_bytes, sha256, data, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    id.as_str(),
                    file.item_id.as_str(),
                    file.name,
                    file.mime_type,
                    size,
                    checksum_sha256(&file.data),
                    file.data,
                    now_rfc3339()?,
                ],
            )
            .with_context(|| format!("insert file {} on item {}", file.name, file.item_id))?;
        debug!(id = %id, item = %file.item_id, size, "stored item file");
        Ok(id)
    }

    pub fn list_item_files(&self, item_id: &ItemId) -> Result<Vec<ItemFile>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, item_id, name, mime_type, size_bytes, sha256, created_at
                FROM item_files
                WHERE item_id = ?
                ORDER BY created_at DESC, id DESC
                ",
            )
            .context("prepare item files query")?;
        let rows = stmt
            .query_map(params![item_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .context("query item files")?;

        let mut files = Vec::new();
        for row in rows {
            let (id, item_id, name, mime_type, size_bytes, checksum_sha256, created_at) =
                row.context("read item file")?;
            files.push(ItemFile {
                id: FileId::new(id),
                item_id: ItemId::new(item_id),
                name,
                mime_type,
                size_bytes,
                checksum_sha256,
                created_at: parse_datetime(&created_at)?,
            });
        }
        Ok(files)
    }

    pub fn part_summary(&self, item_id: &ItemId) -> Result<PartSummary> {
        self.conn
            .query_row(
                "
                SELECT i.id, i.name, i.readable_id, i.revision, i.notes, i.model_upload_id, m.model_path
                FROM items i
                LEFT JOIN model_uploads m ON m.id = i.model_upload_id
                WHERE i.id = ?
                ",
                params![item_id.as_str()],
                |row| {
                    let readable_id: String = row.get(2)?;
                    let revision: i64 = row.get(3)?;
                    Ok(PartSummary {
                        id: ItemId::new(row.get::<_, String>(0)?),
                        name: row.get(1)?,
                        readable_id_with_revision: format!("{readable_id}.{revision}"),
                        notes: row.get(4)?,
                        model_upload_id: row.get::<_, Option<String>>(5)?.map(UploadId::new),
                        model_path: row.get(6)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("load summary of part {item_id}"))?
            .ok_or_else(|| anyhow!("part {item_id} not found -- choose an existing part and retry"))
    }

    // Employees

    pub fn list_employees(&self, query: &ListQuery) -> Result<Page<Employee>> {
        let revision = self.revision()?;
        let employees = self.all_employees()?;
        let (rows, count) = query.apply(employees);
        debug!(rows = rows.len(), count, revision, "loaded employees page");
        Ok(Page {
            rows,
            count,
            revision,
        })
    }

    fn all_employees(&self) -> Result<Vec<Employee>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY last_name ASC, first_name ASC, id ASC"
            ))
            .context("prepare employees query")?;
        let rows = stmt
            .query_map([], read_employee)
            .context("query employees")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect employees")
    }

    pub fn get_employee(&self, employee_id: &EmployeeId) -> Result<Employee> {
        self.conn
            .query_row(
                &format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"),
                params![employee_id.as_str()],
                read_employee,
            )
            .optional()
            .with_context(|| format!("load employee {employee_id}"))?
            .ok_or_else(|| anyhow!("employee {employee_id} not found"))
    }

    pub fn insert_employee(
        &self,
        employee: &Employee,
        company_id: &CompanyId,
        role: Role,
    ) -> Result<()> {
        let now = now_rfc3339()?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin employee insert")?;
        tx.execute(
            "
            INSERT INTO employees (
              id, company_id, first_name, last_name, email, employee_type_id,
              active, employee_status_id, role, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                employee.id.as_str(),
                company_id.as_str(),
                employee.first_name,
                employee.last_name,
                employee.email,
                employee.employee_type_id.as_ref().map(EmployeeTypeId::as_str),
                employee.active,
                employee.employee_status_id,
                role.as_str(),
                now,
                now,
            ],
        )
        .with_context(|| format!("insert employee {}", employee.id))?;
        record_change(
            &tx,
            EmployeesTable::TABLE,
            ChangeKind::Insert,
            &employee_patch(employee),
        )?;
        tx.commit().context("commit employee insert")?;
        Ok(())
    }

    /// Sets the status code of an employee within a company.
    pub fn update_employee_status(
        &self,
        employee_id: &EmployeeId,
        company_id: &CompanyId,
        status: &str,
    ) -> Result<()> {
        if EmployeeStatus::parse_code(status).is_none() {
            bail!("employee status {status:?} is not one of 1, 2, 3");
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin status update")?;
        let rows_affected = tx
            .execute(
                "
                UPDATE employees
                SET employee_status_id = ?, updated_at = ?
                WHERE id = ? AND company_id = ?
                ",
                params![status, now_rfc3339()?, employee_id.as_str(), company_id.as_str()],
            )
            .with_context(|| format!("update status of employee {employee_id}"))?;
        if rows_affected == 0 {
            bail!("employee {employee_id} not found in company {company_id}");
        }
        record_change(
            &tx,
            EmployeesTable::TABLE,
            ChangeKind::Update,
            &Patch::new(employee_id.as_str()).with("employeeStatusId", FieldValue::text(status)),
        )?;
        tx.commit().context("commit status update")?;
        debug!(id = %employee_id, status, "updated employee status");
        Ok(())
    }

    /// Deactivates active accounts and marks them unavailable. Returns the
    /// number of accounts changed.
    pub fn deactivate_users(&self, ids: &[EmployeeId]) -> Result<usize> {
        let unavailable = EmployeeStatus::Unavailable.code();
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin deactivation")?;
        let mut changed = 0;
        for id in ids {
            let rows_affected = tx
                .execute(
                    "
                    UPDATE employees
                    SET active = 0, employee_status_id = ?, updated_at = ?
                    WHERE id = ? AND active = 1
                    ",
                    params![unavailable, now_rfc3339()?, id.as_str()],
                )
                .with_context(|| format!("deactivate employee {id}"))?;
            if rows_affected > 0 {
                record_change(
                    &tx,
                    EmployeesTable::TABLE,
                    ChangeKind::Update,
                    &Patch::new(id.as_str())
                        .with("active", FieldValue::Bool(false))
                        .with("employeeStatusId", FieldValue::text(unavailable)),
                )?;
                changed += 1;
            }
        }
        tx.commit().context("commit deactivation")?;
        Ok(changed)
    }

    /// Stamps a fresh invite on inactive accounts.
    pub fn resend_invites(&self, ids: &[EmployeeId]) -> Result<usize> {
        let now = now_rfc3339()?;
        let mut changed = 0;
        for id in ids {
            changed += self
                .conn
                .execute(
                    "UPDATE employees SET invited_at = ?, updated_at = ? WHERE id = ? AND active = 0",
                    params![now, now, id.as_str()],
                )
                .with_context(|| format!("resend invite to {id}"))?;
        }
        Ok(changed)
    }

    /// Removes pending (inactive) accounts.
    pub fn revoke_invites(&self, ids: &[EmployeeId]) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin invite revocation")?;
        let mut changed = 0;
        for id in ids {
            let rows_affected = tx
                .execute(
                    "DELETE FROM employees WHERE id = ? AND active = 0",
                    params![id.as_str()],
                )
                .with_context(|| format!("revoke invite of {id}"))?;
            if rows_affected > 0 {
                record_change(
                    &tx,
                    EmployeesTable::TABLE,
                    ChangeKind::Delete,
                    &Patch::new(id.as_str()),
                )?;
                changed += 1;
            }
        }
        tx.commit().context("commit invite revocation")?;
        Ok(changed)
    }

    /// Replaces the granted capabilities of each employee.
    pub fn set_user_permissions(
        &self,
        ids: &[EmployeeId],
        capabilities: &BTreeSet<Capability>,
    ) -> Result<usize> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin permission update")?;
        let mut changed = 0;
        for id in ids {
            let exists: i64 = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM employees WHERE id = ?)",
                    params![id.as_str()],
                    |row| row.get(0),
                )
                .with_context(|| format!("check employee {id}"))?;
            if exists == 0 {
                continue;
            }
            tx.execute(
                "DELETE FROM user_permissions WHERE employee_id = ?",
                params![id.as_str()],
            )
            .with_context(|| format!("clear permissions of {id}"))?;
            for capability in capabilities {
                tx.execute(
                    "INSERT INTO user_permissions (employee_id, capability) VALUES (?, ?)",
                    params![id.as_str(), capability.to_string()],
                )
                .with_context(|| format!("grant {capability} to {id}"))?;
            }
            changed += 1;
        }
        tx.commit().context("commit permission update")?;
        Ok(changed)
    }

    pub fn user_permissions(&self, employee_id: &EmployeeId) -> Result<Permissions> {
        let role_raw: String = self
            .conn
            .query_row(
                "SELECT role FROM employees WHERE id = ?",
                params![employee_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("load role of {employee_id}"))?
            .ok_or_else(|| anyhow!("employee {employee_id} not found"))?;
        let role = Role::parse(&role_raw)
            .ok_or_else(|| anyhow!("unknown role {role_raw:?} on employee {employee_id}"))?;

        let mut stmt = self
            .conn
            .prepare("SELECT capability FROM user_permissions WHERE employee_id = ? ORDER BY capability")
            .context("prepare permissions query")?;
        let granted = stmt
            .query_map(params![employee_id.as_str()], |row| row.get::<_, String>(0))
            .context("query permissions")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect permissions")?;
        Permissions::parse_list(role, granted.iter().map(String::as_str))
            .with_context(|| format!("decode permissions of {employee_id}"))
    }

    /// Runs a confirmed employee dialog. Nothing matching the targets is
    /// reported as an error payload.
    pub fn modal_action(&self, action: &ModalAction) -> Result<UpdateResponse> {
        if action.identifiers.is_empty() {
            return Ok(UpdateResponse::failed("no users selected"));
        }
        let ids: Vec<EmployeeId> = action
            .identifiers
            .iter()
            .map(|id| EmployeeId::new(id.as_str()))
            .collect();
        let changed = match action.kind {
            ModalKind::EditPermissions => self.set_user_permissions(&ids, &action.capabilities)?,
            ModalKind::DeactivateUsers => self.deactivate_users(&ids)?,
            ModalKind::ResendInvite => self.resend_invites(&ids)?,
            ModalKind::RevokeInvite => self.revoke_invites(&ids)?,
        };
        info!(kind = action.kind.as_str(), targets = ids.len(), changed, "ran employee action");
        if changed == 0 {
            return Ok(UpdateResponse::failed(format!(
                "{} did not apply to any selected user",
                action.kind.title()
            )));
        }
        Ok(UpdateResponse::ok())
    }

    // Sessions

    pub fn create_session(
        &self,
        employee_id: Option<&EmployeeId>,
        company_id: Option<&CompanyId>,
    ) -> Result<Session> {
        let token = SessionId::new(self.next_id("session")?);
        let created_at = OffsetDateTime::now_utc();
        self.conn
            .execute(
                "INSERT INTO sessions (token, employee_id, company_id, created_at) VALUES (?, ?, ?, ?)",
                params![
                    token.as_str(),
                    employee_id.map(EmployeeId::as_str),
                    company_id.map(CompanyId::as_str),
                    format_datetime(created_at)?,
                ],
            )
            .context("insert session")?;
        Ok(Session {
            token,
            employee_id: employee_id.cloned(),
            company_id: company_id.cloned(),
            created_at,
        })
    }

    pub fn get_session(&self, token: &SessionId) -> Result<Option<Session>> {
        let row = self
            .conn
            .query_row(
                "SELECT token, employee_id, company_id, created_at FROM sessions WHERE token = ?",
                params![token.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .context("load session")?;
        row.map(|(token, employee_id, company_id, created_at)| {
            Ok(Session {
                token: SessionId::new(token),
                employee_id: employee_id.map(EmployeeId::new),
                company_id: company_id.map(CompanyId::new),
                created_at: parse_datetime(&created_at)?,
            })
        })
        .transpose()
    }

    /// Returns whether a session was removed.
    pub fn destroy_session(&self, token: &SessionId) -> Result<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?", params![token.as_str()])
            .context("delete session")?;
        Ok(rows_affected > 0)
    }

    pub fn session_permissions(&self, session: &Session) -> Result<Permissions> {
        let employee_id = session
            .employee_id
            .as_ref()
            .ok_or_else(|| anyhow!("session {} has no signed-in user", session.token))?;
        self.user_permissions(employee_id)
    }

    /// Fills an empty store with deterministic parts and employees.
    pub fn seed_demo_data(&self) -> Result<()> {
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
            .context("count items")?;
        if existing > 0 {
            debug!(existing, "store already has items, skipping demo seed");
            return Ok(());
        }

        let company = CompanyId::new(DEFAULT_COMPANY);
        let mut faker = ErpFaker::new(2026);

        let mut employees = Vec::new();
        for index in 0..12 {
            let mut employee = faker.employee();
            if index == 0 {
                employee.active = true;
                employee.employee_status_id = Some(EmployeeStatus::Available.code().to_owned());
            }
            self.insert_employee(&employee, &company, Role::Employee)?;
            employees.push(employee);
        }
        if let Some(admin) = employees.first() {
            self.set_user_permissions(
                std::slice::from_ref(&admin.id),
                &Capability::all().collect(),
            )?;
        }

        let creators: Vec<UserId> = employees
            .iter()
            .filter(|employee| employee.active)
            .map(|employee| UserId::new(employee.id.as_str()))
            .collect();
        for index in 0..40 {
            let creator = &creators[index % creators.len().max(1)];
            let part = faker.part(creator);
            self.insert_part(&part, &company)?;
            self.set_part_notes(&part.id, &format!("Demo notes for {}.", part.name))?;
            if index % 7 == 0 {
                self.add_revision(&part.id, creator)?;
            }
            if index % 5 == 0 {
                self.attach_barcode_upload(
                    &part.id,
                    &BarcodeUpload {
                        id: UploadId::new(format!("barcode-{index}")),
                        image_path: format!("barcodes/{}.png", part.id),
                        name: format!("{}.png", part.readable_id_with_revision),
                        size: 2048 + index as i64,
                        serial_number: format!("SN-{:06}", 100_000 + index * 37),
                    },
                )?;
            }
            if index % 6 == 0 {
                self.attach_model_upload(
                    &part.id,
                    &ModelUpload {
                        id: UploadId::new(format!("model-{index}")),
                        model_path: format!("models/{}.step", part.id),
                        name: format!("{}.step", part.readable_id_with_revision),
                        size: 65_536 + index as i64,
                    },
                )?;
            }
        }
        self.add_custom_column(
            PartsTable::TABLE,
            &CustomColumn {
                id: "finish".to_owned(),
                header: "Finish".to_owned(),
                kind: CustomColumnKind::Text,
            },
        )?;
        info!(employees = employees.len(), parts = 40, "seeded demo data");
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> Result<String> {
        let count = self.id_counter.get() + 1;
        self.id_counter.set(count);
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        let digest = checksum_sha256(format!("{prefix}:{nanos}:{count}").as_bytes());
        let short = digest
            .get(..16)
            .ok_or_else(|| anyhow!("digest shorter than expected"))?;
        Ok(format!("{prefix}-{short}"))
    }
}

impl UpdateEndpoint for Store {
    fn bulk_update(&self, request: &BulkUpdateRequest) -> Result<UpdateResponse> {
        self.bulk_update_items(request)
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("ERP_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set ERP_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("erp.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://") {
        let scheme = &path[..index];
        if index > 0 && scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn record_change(conn: &Connection, table: &str, kind: ChangeKind, patch: &Patch) -> Result<()> {
    let payload = serde_json::to_string(patch).context("encode change payload")?;
    conn.execute(
        "
        INSERT INTO change_log (table_name, event, row_id, payload, created_at)
        VALUES (?, ?, ?, ?, ?)
        ",
        params![table, kind.as_str(), patch.id, payload, now_rfc3339()?],
    )
    .with_context(|| format!("record {} on {table} {}", kind.as_str(), patch.id))?;
    Ok(())
}

fn part_patch(part: &Part) -> Patch {
    let mut patch = Patch::new(part.id.as_str())
        .with("name", FieldValue::text(&part.name))
        .with("description", FieldValue::text(&part.description))
        .with(
            "itemTrackingType",
            FieldValue::text(part.item_tracking_type.as_str()),
        )
        .with(
            "defaultMethodType",
            FieldValue::text(part.default_method_type.as_str()),
        )
        .with(
            "replenishmentSystem",
            FieldValue::text(part.replenishment_system.as_str()),
        )
        .with("tags", FieldValue::List(part.tags.clone()))
        .with("active", FieldValue::Bool(part.active));
    for (id, value) in &part.custom_fields {
        patch = patch.with(&format!("customFields.{id}"), value.clone());
    }
    patch
}

fn employee_patch(employee: &Employee) -> Patch {
    Patch::new(employee.id.as_str())
        .with("firstName", FieldValue::text(&employee.first_name))
        .with("lastName", FieldValue::text(&employee.last_name))
        .with("email", FieldValue::text(&employee.email))
        .with(
            "employeeTypeId",
            FieldValue::opt_text(employee.employee_type_id.as_ref().map(EmployeeTypeId::as_str)),
        )
        .with("active", FieldValue::Bool(employee.active))
        .with(
            "employeeStatusId",
            FieldValue::opt_text(employee.employee_status_id.as_deref()),
        )
}

fn split_readable_id(value: &str) -> (&str, i64) {
    match value.rsplit_once('.') {
        Some((readable, revision)) => match revision.parse::<i64>() {
            Ok(revision) if revision > 0 => (readable, revision),
            _ => (value, 1),
        },
        None => (value, 1),
    }
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        let columns = table_columns(conn, table)?;
        if columns.is_empty() {
            bail!(
                "database is missing required table `{table}`; use an erp-compatible database or migrate first"
            );
        }

        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();
        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }
    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    format_datetime(OffsetDateTime::now_utc())
}

fn format_datetime(value: OffsetDateTime) -> Result<String> {
    value.format(&Rfc3339).context("format timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }
    if let Ok(value) = time::PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }
    bail!("unsupported datetime format {raw:?}")
}

fn parse_opt_datetime(raw: Option<String>) -> Result<Option<OffsetDateTime>> {
    raw.as_deref().map(parse_datetime).transpose()
}

fn checksum_sha256(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
