use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, OpenFlags};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use wb_core::{column_kind, stored_columns, ColumnKind, RawValue, StoredRow};

pub const TABLE_NAME: &str = "submissions";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store file not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("unexpected table header [{found}]")]
    HeaderMismatch { found: String },
}

impl StorageError {
    /// True when the file itself is unusable as a table, as opposed to a
    /// transient fault such as another connection holding a lock.
    pub fn is_unreadable(&self) -> bool {
        match self {
            StorageError::Missing(_) | StorageError::HeaderMismatch { .. } => true,
            StorageError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt
            ),
            _ => false,
        }
    }
}

/// Outcome of one append. `recovered` carries the read error that forced
/// the table to be rebuilt from scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReport {
    pub total_rows: usize,
    pub recovered: Option<String>,
}

/// Append-only table of submissions kept in a single SQLite file.
///
/// Every append rewrites the whole file through a staging copy that is
/// renamed over the original. There is no cross-process locking.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates an empty table when the file is absent. Returns whether a
    /// file was written.
    pub fn initialize(&self) -> Result<bool, StorageError> {
        if self.path.exists() {
            return Ok(false);
        }
        self.write_table(&[])?;
        Ok(true)
    }

    pub fn read_header(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.open_read_only()?;
        table_header(&conn)
    }

    /// Every stored row in insertion order.
    pub fn read_all(&self) -> Result<Vec<StoredRow>, StorageError> {
        let conn = self.open_read_only()?;
        let columns = stored_columns();
        let header = table_header(&conn)?;
        if header != columns {
            return Err(StorageError::HeaderMismatch {
                found: header.join(", "),
            });
        }

        let sql = format!(
            "SELECT {} FROM {TABLE_NAME} ORDER BY rowid",
            quoted_columns(&columns)
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells: HashMap<&str, RawValue> = HashMap::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                cells.insert(*column, raw_value(row.get_ref(idx)?));
            }
            out.push(StoredRow::from_values(|column| {
                cells.remove(column).unwrap_or(RawValue::Missing)
            }));
        }
        Ok(out)
    }

    /// Reads the table, adds `row` at the end and rewrites the file.
    ///
    /// An unreadable table is replaced by a fresh one holding only `row`.
    /// Lock contention and write failures are returned and leave the file
    /// untouched.
    pub fn append(&self, row: &StoredRow) -> Result<AppendReport, StorageError> {
        let (mut rows, recovered) = match self.read_all() {
            Ok(rows) => (rows, None),
            Err(StorageError::Missing(_)) => (Vec::new(), None),
            Err(err) if err.is_unreadable() => (Vec::new(), Some(err.to_string())),
            Err(err) => return Err(err),
        };
        rows.push(row.clone());
        self.write_table(&rows)?;
        Ok(AppendReport {
            total_rows: rows.len(),
            recovered,
        })
    }

    fn open_read_only(&self) -> Result<Connection, StorageError> {
        if !self.path.exists() {
            return Err(StorageError::Missing(self.path.clone()));
        }
        Ok(Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?)
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".staging");
        PathBuf::from(name)
    }

    fn write_table(&self, rows: &[StoredRow]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let staging = self.staging_path();
        if staging.exists() {
            fs::remove_file(&staging)?;
        }
        if let Err(err) = write_staging(&staging, rows) {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

fn write_staging(path: &Path, rows: &[StoredRow]) -> Result<(), StorageError> {
    let columns = stored_columns();
    let mut conn = Connection::open(path)?;
    conn.execute_batch(&create_table_sql(&columns))?;

    let tx = conn.transaction()?;
    {
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {TABLE_NAME} ({}) VALUES ({placeholders})",
            quoted_columns(&columns)
        );
        let mut stmt = tx.prepare(&sql)?;
        for row in rows {
            stmt.execute(params_from_iter(row.values().into_iter().map(sql_value)))?;
        }
    }
    tx.commit()?;
    conn.close().map_err(|(_, err)| StorageError::Sqlite(err))?;
    Ok(())
}

fn create_table_sql(columns: &[&str]) -> String {
    let definitions: Vec<String> = columns
        .iter()
        .map(|column| {
            let affinity = match column_kind(column) {
                ColumnKind::Numeric => "REAL",
                ColumnKind::Text => "TEXT",
            };
            format!("\"{column}\" {affinity}")
        })
        .collect();
    format!(
        "CREATE TABLE {TABLE_NAME} ({});",
        definitions.join(", ")
    )
}

fn quoted_columns(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|column| format!("\"{column}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn table_header(conn: &Connection) -> Result<Vec<String>, StorageError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({TABLE_NAME})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn raw_value(value: ValueRef<'_>) -> RawValue {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => RawValue::Missing,
        ValueRef::Integer(number) => RawValue::Number(number as f64),
        ValueRef::Real(number) => RawValue::Number(number),
        ValueRef::Text(bytes) => RawValue::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn sql_value(value: RawValue) -> Value {
    match value {
        RawValue::Missing => Value::Null,
        RawValue::Number(number) => Value::Real(number),
        RawValue::Text(text) => Value::Text(text),
    }
}
