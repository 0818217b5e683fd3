use super::{Cell, RawTable, SurveySource};
use crate::error::SurveyError;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Default busy timeout for survey exports held open by another process.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5_000);

/// SQLite survey export (`.db3`), opened read-only.
pub struct Db3Source {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl Db3Source {
    pub fn open(path: &Path) -> Result<Self, SurveyError> {
        Self::open_with_timeout(path, DEFAULT_READ_TIMEOUT)
    }

    /// Open the export with a bounded busy timeout so a locked file fails
    /// fast instead of blocking.
    pub fn open_with_timeout(path: &Path, timeout: Duration) -> Result<Self, SurveyError> {
        let name = path.display().to_string();
        if !path.is_file() {
            return Err(SurveyError::unavailable(name, "file not found"));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| SurveyError::unavailable(&name, e))?;
        conn.busy_timeout(timeout)
            .map_err(|e| SurveyError::unavailable(&name, e))?;

        // Forces SQLite to read the header; a non-database file fails here.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| SurveyError::unavailable(&name, e))?;

        Ok(Db3Source {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    fn source_name(&self) -> String {
        self.path.display().to_string()
    }
}

impl SurveySource for Db3Source {
    fn read_table(&self, name: &str) -> Result<RawTable, SurveyError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SurveyError::unavailable(self.source_name(), format!("lock poisoned: {e}")))?;

        let actual: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE LIMIT 1",
                [name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| SurveyError::unavailable(self.source_name(), e))?;
        let Some(actual) = actual else {
            return Err(SurveyError::missing_table(name));
        };

        let sql = format!("SELECT * FROM \"{}\"", actual.replace('"', "\"\""));
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| SurveyError::unavailable(self.source_name(), e))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut table = RawTable {
            name: actual,
            columns,
            rows: Vec::new(),
        };

        let mut rows = stmt
            .query([])
            .map_err(|e| SurveyError::unavailable(self.source_name(), e))?;
        while let Some(row) = rows
            .next()
            .map_err(|e| SurveyError::unavailable(self.source_name(), e))?
        {
            let mut cells = Vec::with_capacity(width);
            for idx in 0..width {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| SurveyError::unavailable(self.source_name(), e))?;
                if let ValueRef::Blob(bytes) = value {
                    tracing::warn!(
                        table = %table.name,
                        row = table.rows.len(),
                        column = %table.columns[idx],
                        bytes = bytes.len(),
                        "binary cell read as null"
                    );
                }
                cells.push(cell_from_value(value));
            }
            table.rows.push(cells);
        }

        tracing::debug!(table = %table.name, rows = table.rows.len(), "read SQLite table");
        Ok(table)
    }

    fn backend_name(&self) -> &str {
        "sqlite"
    }
}

fn cell_from_value(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(i) => Cell::Int(i),
        ValueRef::Real(r) => Cell::Real(r),
        ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => Cell::Null,
    }
}
