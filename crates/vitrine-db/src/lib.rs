// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use vitrine_app::{
    Artwork, ArtworkId, ArtworkStatus, FacetOption, FacetVocabulary, ListingRequest, Page,
    PartialUpdate, StoreType, TableBackend, store_type_options,
};

const SCHEMA: &str = "
CREATE TABLE artworks (
  id          INTEGER PRIMARY KEY,
  title       TEXT NOT NULL,
  artist      TEXT NOT NULL DEFAULT '',
  nationality TEXT NOT NULL DEFAULT '',
  store_type  TEXT NOT NULL DEFAULT 'inStock',
  status      TEXT NOT NULL DEFAULT 'active',
  year        INTEGER,
  price_cents INTEGER,
  location    TEXT NOT NULL DEFAULT '',
  acquired_on TEXT,
  notes       TEXT NOT NULL DEFAULT '',
  created_at  TEXT NOT NULL,
  updated_at  TEXT NOT NULL
);
";

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "title",
    "artist",
    "nationality",
    "store_type",
    "status",
    "year",
    "price_cents",
    "location",
    "acquired_on",
    "notes",
    "created_at",
    "updated_at",
];

struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_artworks_status_updated",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_artworks_status_updated ON artworks (status, updated_at DESC, id DESC)",
    },
    RequiredIndex {
        name: "idx_artworks_store_type",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_artworks_store_type ON artworks (store_type)",
    },
];

const SELECT_COLUMNS: &str = "
    id, title, artist, nationality, store_type, status, year,
    price_cents, location, acquired_on, notes, updated_at
";

const NATIONALITY_LABELS: &[(&str, &str)] = &[
    ("CN", "中國"),
    ("DE", "德國"),
    ("FR", "法國"),
    ("GB", "英國"),
    ("IT", "義大利"),
    ("JP", "日本"),
    ("KR", "韓國"),
    ("NL", "荷蘭"),
    ("TW", "台灣"),
    ("US", "美國"),
];

/// Label shown for a nationality code; unknown codes show as-is.
pub fn nationality_label(code: &str) -> &str {
    NATIONALITY_LABELS
        .iter()
        .find(|(known, _)| *known == code)
        .map_or(code, |(_, label)| label)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    RequiredText,
    StoreType,
    Status,
    Integer,
    Date,
}

/// Wire field name to column, for the fields a listing may filter on or a
/// partial update may write.
struct ArtworkColumn {
    field: &'static str,
    column: &'static str,
    kind: ColumnKind,
}

const ARTWORK_COLUMNS: &[ArtworkColumn] = &[
    ArtworkColumn {
        field: "title",
        column: "title",
        kind: ColumnKind::RequiredText,
    },
    ArtworkColumn {
        field: "artist",
        column: "artist",
        kind: ColumnKind::Text,
    },
    ArtworkColumn {
        field: "nationality",
        column: "nationality",
        kind: ColumnKind::Text,
    },
    ArtworkColumn {
        field: "storeType",
        column: "store_type",
        kind: ColumnKind::StoreType,
    },
    ArtworkColumn {
        field: "status",
        column: "status",
        kind: ColumnKind::Status,
    },
    ArtworkColumn {
        field: "year",
        column: "year",
        kind: ColumnKind::Integer,
    },
    ArtworkColumn {
        field: "priceCents",
        column: "price_cents",
        kind: ColumnKind::Integer,
    },
    ArtworkColumn {
        field: "location",
        column: "location",
        kind: ColumnKind::Text,
    },
    ArtworkColumn {
        field: "acquiredOn",
        column: "acquired_on",
        kind: ColumnKind::Date,
    },
    ArtworkColumn {
        field: "notes",
        column: "notes",
        kind: ColumnKind::Text,
    },
];

const KEYWORD_COLUMNS: [&str; 4] = ["title", "artist", "location", "notes"];

fn artwork_column(field: &str) -> Result<&'static ArtworkColumn> {
    ARTWORK_COLUMNS
        .iter()
        .find(|column| column.field == field)
        .ok_or_else(|| {
            let known: Vec<&str> = ARTWORK_COLUMNS.iter().map(|column| column.field).collect();
            anyhow!(
                "unknown artwork field {field:?}; expected one of {}",
                known.join(", ")
            )
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewArtwork {
    pub title: String,
    pub artist: String,
    pub nationality: String,
    pub store_type: StoreType,
    pub status: ArtworkStatus,
    pub year: Option<i32>,
    pub price_cents: Option<i64>,
    pub location: String,
    pub acquired_on: Option<Date>,
    pub notes: String,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if table_exists(&self.conn, "artworks")? {
            validate_schema(&self.conn)?;
        } else {
            self.conn.execute_batch(SCHEMA).context("create schema")?;
        }
        ensure_required_indexes(&self.conn)
    }

    pub fn insert_artwork(&self, artwork: &NewArtwork) -> Result<ArtworkId> {
        if artwork.title.trim().is_empty() {
            bail!("artwork title is required");
        }
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO artworks (
                  title, artist, nationality, store_type, status, year,
                  price_cents, location, acquired_on, notes, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    artwork.title.trim(),
                    artwork.artist,
                    artwork.nationality,
                    artwork.store_type.as_str(),
                    artwork.status.as_str(),
                    artwork.year,
                    artwork.price_cents,
                    artwork.location,
                    artwork.acquired_on.map(format_date),
                    artwork.notes,
                    now,
                    now,
                ],
            )
            .with_context(|| format!("insert artwork {:?}", artwork.title))?;
        Ok(ArtworkId::new(self.conn.last_insert_rowid()))
    }

    pub fn get_artwork(&self, artwork_id: ArtworkId) -> Result<Artwork> {
        self.find_artwork(artwork_id)?
            .ok_or_else(|| anyhow!("artwork {artwork_id} not found"))
    }

    fn find_artwork(&self, artwork_id: ArtworkId) -> Result<Option<Artwork>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM artworks WHERE id = ?");
        self.conn
            .query_row(&sql, params![artwork_id.get()], artwork_from_row)
            .optional()
            .with_context(|| format!("load artwork {artwork_id}"))
    }

    /// One page of artworks: fixed predicate and filter groups are ANDed,
    /// values within a group ORed; the keyword matches any text column.
    pub fn list_artworks(&self, request: &ListingRequest) -> Result<Page<Artwork>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<SqlValue> = Vec::new();

        if let Some(fixed) = &request.fixed_predicate {
            push_in_clause(&mut clauses, &mut args, &fixed.field, &fixed.values)?;
        }
        for criterion in &request.filters {
            push_in_clause(&mut clauses, &mut args, &criterion.field, &criterion.values)?;
        }
        if let Some(keyword) = request.keyword.as_deref().map(str::trim)
            && !keyword.is_empty()
        {
            let pattern = format!("%{}%", escape_like(keyword));
            let matches: Vec<String> = KEYWORD_COLUMNS
                .iter()
                .map(|column| format!("{column} LIKE ? ESCAPE '\\'"))
                .collect();
            clauses.push(format!("({})", matches.join(" OR ")));
            args.extend(KEYWORD_COLUMNS.iter().map(|_| SqlValue::Text(pattern.clone())));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM artworks {where_sql}"),
                params_from_iter(args.iter()),
                |row| row.get(0),
            )
            .context("count artworks")?;

        let limit = i64::try_from(request.limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(request.offset).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM artworks {where_sql}
             ORDER BY updated_at DESC, id DESC
             LIMIT ? OFFSET ?"
        );
        let mut stmt = self.conn.prepare(&sql).context("prepare artworks query")?;
        let page_args = args
            .into_iter()
            .chain([SqlValue::Integer(limit), SqlValue::Integer(offset)]);
        let items = stmt
            .query_map(params_from_iter(page_args), artwork_from_row)
            .context("query artworks")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect artworks")?;

        tracing::debug!(
            total,
            returned = items.len(),
            offset = request.offset,
            "listed artworks"
        );
        Ok(Page {
            items,
            total_count: usize::try_from(total).unwrap_or(0),
            offset: request.offset,
            take: request.limit,
        })
    }

    pub fn facet_vocabulary(&self) -> Result<FacetVocabulary> {
        let mut vocabulary = FacetVocabulary::new();
        vocabulary.insert("storeType".to_owned(), store_type_options());
        vocabulary.insert(
            "status".to_owned(),
            ArtworkStatus::ALL
                .iter()
                .map(|status| FacetOption::new(status.as_str(), status.label()))
                .collect(),
        );
        vocabulary.insert(
            "nationality".to_owned(),
            self.distinct_values("nationality")?
                .into_iter()
                .map(|code| {
                    let label = nationality_label(&code).to_owned();
                    FacetOption::new(code, label)
                })
                .collect(),
        );
        vocabulary.insert(
            "artist".to_owned(),
            self.distinct_values("artist")?
                .into_iter()
                .map(|name| FacetOption::new(name.clone(), name))
                .collect(),
        );
        Ok(vocabulary)
    }

    fn distinct_values(&self, column: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {column} FROM artworks
             WHERE status != 'deleted' AND {column} != ''
             ORDER BY {column}"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("prepare distinct {column} query"))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .with_context(|| format!("query distinct {column}"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("collect distinct {column}"))
    }

    /// Writes one field and returns the stored row.
    pub fn update_artwork_field(
        &self,
        artwork_id: ArtworkId,
        field_path: &str,
        value: &Value,
    ) -> Result<Artwork> {
        let column = artwork_column(field_path)?;
        let sql_value = to_sql_value(column, value)?;
        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE artworks SET {} = ?, updated_at = ? WHERE id = ?",
                    column.column
                ),
                params![sql_value, now_rfc3339()?, artwork_id.get()],
            )
            .with_context(|| format!("update artwork {artwork_id} {field_path}"))?;
        if changed == 0 {
            bail!("artwork {artwork_id} not found");
        }
        self.get_artwork(artwork_id)
    }

    /// Marks artworks deleted; returns how many rows changed.
    pub fn delete_artworks(&self, id_list: &[i64]) -> Result<usize> {
        let mut properties = Map::new();
        properties.insert(
            "status".to_owned(),
            Value::from(ArtworkStatus::Deleted.as_str()),
        );
        self.patch_artworks(id_list, &properties)
    }

    /// Applies the same field values to every listed artwork in one transaction.
    pub fn patch_artworks(&self, id_list: &[i64], properties: &Map<String, Value>) -> Result<usize> {
        if id_list.is_empty() {
            return Ok(0);
        }
        if properties.is_empty() {
            bail!("bulk patch needs at least one property");
        }

        let mut assignments = Vec::with_capacity(properties.len() + 1);
        let mut args = Vec::with_capacity(properties.len() + id_list.len() + 1);
        for (field, value) in properties {
            let column = artwork_column(field)?;
            assignments.push(format!("{} = ?", column.column));
            args.push(to_sql_value(column, value)?);
        }
        assignments.push("updated_at = ?".to_owned());
        args.push(SqlValue::Text(now_rfc3339()?));
        args.extend(id_list.iter().map(|id| SqlValue::Integer(*id)));

        let sql = format!(
            "UPDATE artworks SET {} WHERE id IN ({})",
            assignments.join(", "),
            placeholders(id_list.len())
        );
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin bulk update")?;
        let changed = tx
            .execute(&sql, params_from_iter(args.iter()))
            .context("bulk update artworks")?;
        tx.commit().context("commit bulk update")?;
        tracing::info!(changed, requested = id_list.len(), "artworks patched");
        Ok(changed)
    }

    pub fn artwork_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM artworks", [], |row| row.get(0))
            .context("count artworks")?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl TableBackend<Artwork> for Store {
    fn list(&mut self, request: &ListingRequest) -> Result<Page<Artwork>> {
        self.list_artworks(request)
    }

    fn facet_vocabulary(&mut self) -> Result<FacetVocabulary> {
        Store::facet_vocabulary(self)
    }

    fn update(&mut self, update: &PartialUpdate) -> Result<Option<Artwork>> {
        if update.field_path.contains('.') {
            bail!("artwork fields are flat; cannot update {:?}", update.field_path);
        }
        self.update_artwork_field(ArtworkId::new(update.id), &update.field_path, &update.value)
            .map(Some)
    }

    fn bulk_delete(&mut self, id_list: &[i64]) -> Result<()> {
        self.delete_artworks(id_list).map(|_| ())
    }

    fn bulk_patch(&mut self, id_list: &[i64], properties: &Map<String, Value>) -> Result<()> {
        self.patch_artworks(id_list, properties).map(|_| ())
    }
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
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

fn push_in_clause(
    clauses: &mut Vec<String>,
    args: &mut Vec<SqlValue>,
    field: &str,
    values: &[String],
) -> Result<()> {
    let column = artwork_column(field)?;
    if matches!(column.kind, ColumnKind::Integer | ColumnKind::Date) {
        bail!("artwork field {field:?} cannot be used as a filter");
    }
    if values.is_empty() {
        return Ok(());
    }
    clauses.push(format!(
        "{} IN ({})",
        column.column,
        placeholders(values.len())
    ));
    args.extend(values.iter().map(|value| SqlValue::Text(value.clone())));
    Ok(())
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn to_sql_value(column: &ArtworkColumn, value: &Value) -> Result<SqlValue> {
    let field = column.field;
    match (column.kind, value) {
        (ColumnKind::RequiredText, Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                bail!("{field} must not be empty");
            }
            Ok(SqlValue::Text(trimmed.to_owned()))
        }
        (ColumnKind::Text, Value::String(text)) => Ok(SqlValue::Text(text.trim().to_owned())),
        (ColumnKind::Text, Value::Null) => Ok(SqlValue::Text(String::new())),
        (ColumnKind::StoreType, Value::String(raw)) => StoreType::parse(raw)
            .map(|store_type| SqlValue::Text(store_type.as_str().to_owned()))
            .ok_or_else(|| {
                let known: Vec<&str> = StoreType::ALL.iter().map(|kind| kind.as_str()).collect();
                anyhow!("unknown store type {raw:?}; expected one of {}", known.join(", "))
            }),
        (ColumnKind::Status, Value::String(raw)) => ArtworkStatus::parse(raw)
            .map(|status| SqlValue::Text(status.as_str().to_owned()))
            .ok_or_else(|| anyhow!("unknown status {raw:?}; expected active, archived or deleted")),
        (ColumnKind::Integer | ColumnKind::Date, Value::Null) => Ok(SqlValue::Null),
        (ColumnKind::Integer, Value::Number(number)) => number
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(|| anyhow!("{field} must be a whole number, got {number}")),
        (ColumnKind::Date, Value::String(raw)) => {
            let date = parse_date(raw.trim())
                .with_context(|| format!("{field} must be a YYYY-MM-DD date"))?;
            Ok(SqlValue::Text(format_date(date)))
        }
        (_, other) => bail!("{field} cannot hold {other}"),
    }
}

fn artwork_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Artwork> {
    let store_type_raw: String = row.get(4)?;
    let status_raw: String = row.get(5)?;
    let acquired_on_raw: Option<String> = row.get(9)?;
    let updated_at_raw: String = row.get(11)?;

    Ok(Artwork {
        id: ArtworkId::new(row.get(0)?),
        title: row.get(1)?,
        artist: row.get(2)?,
        nationality: row.get(3)?,
        store_type: StoreType::parse(&store_type_raw)
            .ok_or_else(|| to_sql_error(anyhow!("unknown store type {store_type_raw}")))?,
        status: ArtworkStatus::parse(&status_raw)
            .ok_or_else(|| to_sql_error(anyhow!("unknown artwork status {status_raw}")))?,
        year: row.get(6)?,
        price_cents: row.get(7)?,
        location: row.get(8)?,
        acquired_on: acquired_on_raw
            .as_deref()
            .map(parse_date)
            .transpose()
            .map_err(to_sql_error)?,
        notes: row.get(10)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    let columns = table_columns(conn, "artworks")?;
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !columns.contains(*column))
        .collect();
    if !missing.is_empty() {
        bail!(
            "table `artworks` is missing required columns: {}; migrate the database first",
            missing.join(", ")
        );
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
        .with_context(|| format!("collect column info for {table}"))
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }
    Ok(())
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

/// Fixed-width RFC 3339 so timestamps order correctly as text.
fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
        ))
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }
    bail!("unsupported datetime format {raw:?}")
}

fn parse_date(raw: &str) -> Result<Date> {
    Date::parse(raw, &format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("invalid date {raw:?}"))
}

fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}
