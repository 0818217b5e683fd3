use std::fmt::Display;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{Data, Reader, Xls, Xlsx};

use super::schema::ALL_TABLES;
use super::{Cell, RawTable, SurveySource};
use crate::error::SurveyError;

/// Workbook export with one sheet per table, first row holding column names.
///
/// Sheets are read eagerly on open; only sheets named after a known table
/// are kept. `.xls` files go through the legacy BIFF parser, everything
/// else through the Office Open XML one.
#[derive(Debug, Clone)]
pub struct XlsxSource {
    name: String,
    backend: &'static str,
    tables: Vec<RawTable>,
}

impl XlsxSource {
    pub fn open(path: &Path) -> Result<Self, SurveyError> {
        let name = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| SurveyError::unavailable(&name, e))?;
        let legacy = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("xls"));
        if legacy {
            Self::from_xls_bytes(name, &bytes)
        } else {
            Self::from_bytes(name, &bytes)
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, SurveyError> {
        let name = name.into();
        let workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes))
            .map_err(|e| SurveyError::unavailable(&name, format!("failed to open xlsx: {e}")))?;
        Self::from_workbook(name, "xlsx", workbook)
    }

    /// Legacy Excel 97-2003 (BIFF) workbook.
    pub fn from_xls_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self, SurveyError> {
        let name = name.into();
        let workbook: Xls<_> = calamine::open_workbook_from_rs(Cursor::new(bytes))
            .map_err(|e| SurveyError::unavailable(&name, format!("failed to open xls: {e}")))?;
        Self::from_workbook(name, "xls", workbook)
    }

    fn from_workbook<RS, R>(
        name: String,
        backend: &'static str,
        mut workbook: R,
    ) -> Result<Self, SurveyError>
    where
        RS: Read + Seek,
        R: Reader<RS>,
        R::Error: Display,
    {
        let sheet_names = workbook.sheet_names();
        let mut tables = Vec::new();
        for spec in ALL_TABLES {
            let Some(sheet) = sheet_names
                .iter()
                .find(|s| s.trim().eq_ignore_ascii_case(spec.name))
            else {
                continue;
            };
            let range = workbook
                .worksheet_range(sheet)
                .map_err(|e| SurveyError::unavailable(&name, format!("sheet '{sheet}': {e}")))?;
            tables.push(sheet_to_table(spec.name, range.rows()));
        }

        Ok(XlsxSource {
            name,
            backend,
            tables,
        })
    }
}

impl SurveySource for XlsxSource {
    fn read_table(&self, name: &str) -> Result<RawTable, SurveyError> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| SurveyError::missing_table(name))
    }

    fn backend_name(&self) -> &str {
        self.backend
    }
}

fn sheet_to_table<'a>(name: &str, mut rows: impl Iterator<Item = &'a [Data]>) -> RawTable {
    let columns: Vec<String> = rows
        .next()
        .map(|header| {
            header
                .iter()
                .map(|c| cell_as_string(c).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default();

    let mut table = RawTable {
        name: name.to_string(),
        columns,
        rows: Vec::new(),
    };

    for data_row in rows {
        let cells: Vec<Cell> = data_row.iter().map(cell_from_data).collect();
        // Skip completely blank rows
        if cells.iter().all(Cell::is_null) {
            continue;
        }
        table.rows.push(cells);
    }

    table
}

fn cell_from_data(cell: &Data) -> Cell {
    match cell {
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Real(*f),
        Data::Bool(b) => Cell::Int(i64::from(*b)),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Empty => Cell::Null,
        other => match cell_as_string(other) {
            Some(s) => Cell::Text(s),
            None => Cell::Null,
        },
    }
}

fn cell_as_string(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Empty | Data::Error(_) => None,
        _ => Some(format!("{cell}")),
    }
}
