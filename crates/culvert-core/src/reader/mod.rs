pub mod db3;
pub mod memory;
pub mod schema;
pub mod xlsx;

use crate::error::SurveyError;
use crate::model::{Grade, RawInspectionRow, RawObservationRow, RawSectionRow, RawStatisticsRow};
use crate::parsing::{f64_to_decimal, parse_number};
use rust_decimal::Decimal;
use schema::{col, TableSpec};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

pub use db3::Db3Source;
pub use memory::MemorySource;
pub use xlsx::XlsxSource;

/// A single untyped cell as delivered by a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

static NULL_CELL: Cell = Cell::Null;

impl Cell {
    /// Text content with blank strings normalized to `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Int(i) => Some(i.to_string()),
            Cell::Real(r) => Some(format_real(*r)),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Real(r) if r.fract() == 0.0 => {
                f64_to_decimal(*r).and_then(|d| i64::try_from(d).ok())
            }
            Cell::Text(s) => s.trim().parse::<i64>().ok().or_else(|| {
                let d = parse_number(s).ok().flatten()?;
                if d.fract().is_zero() {
                    i64::try_from(d).ok()
                } else {
                    None
                }
            }),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Result<Option<Decimal>, SurveyError> {
        match self {
            Cell::Null => Ok(None),
            Cell::Int(i) => Ok(Some(Decimal::from(*i))),
            Cell::Real(r) => Ok(f64_to_decimal(*r)),
            Cell::Text(s) => parse_number(s),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Cell::Null => false,
            Cell::Int(i) => *i != 0,
            Cell::Real(r) => *r != 0.0,
            Cell::Text(s) => matches!(
                s.trim().to_lowercase().as_str(),
                "1" | "-1" | "true" | "t" | "yes" | "y" | "x" | "deleted"
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null) || matches!(self, Cell::Text(s) if s.trim().is_empty())
    }
}

fn format_real(r: f64) -> String {
    if r.fract() == 0.0 && r.is_finite() && r.abs() < 1e15 {
        format!("{}", r as i64)
    } else {
        format!("{r}")
    }
}

/// One result set read from a survey export.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        RawTable {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(name))
    }
}

/// Trait for survey export backends.
pub trait SurveySource: Send + Sync {
    /// Read one named table. Table names are matched case-insensitively.
    fn read_table(&self, name: &str) -> Result<RawTable, SurveyError>;

    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Open a survey export by file extension: `.db3`, `.db`, `.sqlite` as
/// SQLite, `.xlsx` and `.xlsm` as a workbook, `.xls` as a legacy workbook.
pub fn open_source(path: &Path, read_timeout: Duration) -> Result<Box<dyn SurveySource>, SurveyError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "db3" | "db" | "sqlite" | "sqlite3" => {
            Ok(Box::new(Db3Source::open_with_timeout(path, read_timeout)?))
        }
        "xlsx" | "xlsm" | "xls" => Ok(Box::new(XlsxSource::open(path)?)),
        _ => Err(SurveyError::unavailable(
            path.display().to_string(),
            format!("unsupported export format '.{ext}'"),
        )),
    }
}

/// A row the reader could not type and left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWarning {
    pub table: String,
    /// Zero-based data row index within the table.
    pub row: usize,
    pub message: String,
}

/// Typed, de-duplicated rows of all four tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyTables {
    pub sections: Vec<RawSectionRow>,
    pub inspections: Vec<RawInspectionRow>,
    pub observations: Vec<RawObservationRow>,
    pub statistics: Vec<RawStatisticsRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ReadWarning>,
}

/// Read and type all four tables from a source.
///
/// No transformation beyond type coercion and null normalization happens
/// here. Duplicate keys keep their first occurrence.
pub fn read_survey(source: &dyn SurveySource) -> Result<SurveyTables, SurveyError> {
    let mut tables = SurveyTables::default();

    let raw = source.read_table(schema::SECTION.name)?;
    tables.sections = read_sections(&raw, &mut tables.warnings)?;

    let raw = source.read_table(schema::INSPECTION.name)?;
    tables.inspections = read_inspections(&raw, &mut tables.warnings)?;

    let raw = source.read_table(schema::OBSERVATION.name)?;
    tables.observations = read_observations(&raw, &mut tables.warnings)?;

    let raw = source.read_table(schema::STATISTICS.name)?;
    tables.statistics = read_statistics(&raw, &mut tables.warnings)?;

    tracing::debug!(
        backend = source.backend_name(),
        sections = tables.sections.len(),
        inspections = tables.inspections.len(),
        observations = tables.observations.len(),
        statistics = tables.statistics.len(),
        warnings = tables.warnings.len(),
        "survey tables read"
    );

    Ok(tables)
}

/// Column positions of one table, resolved against its table layout.
struct Bound<'t> {
    table: &'t RawTable,
    index: HashMap<&'static str, usize>,
}

impl<'t> Bound<'t> {
    fn new(table: &'t RawTable, spec: &TableSpec) -> Result<Self, SurveyError> {
        let mut index = HashMap::new();
        for &name in spec.required {
            let idx = table
                .column_index(name)
                .ok_or_else(|| SurveyError::missing_column(spec.name, name))?;
            index.insert(name, idx);
        }
        for &name in spec.optional {
            if let Some(idx) = table.column_index(name) {
                index.insert(name, idx);
            }
        }
        Ok(Bound { table, index })
    }

    fn cell<'r>(&self, row: &'r [Cell], column: &'static str) -> &'r Cell {
        self.index
            .get(column)
            .and_then(|&idx| row.get(idx))
            .unwrap_or(&NULL_CELL)
    }

    fn decimal(
        &self,
        row_idx: usize,
        row: &[Cell],
        column: &'static str,
        warnings: &mut Vec<ReadWarning>,
    ) -> Option<Decimal> {
        match self.cell(row, column).as_decimal() {
            Ok(v) => v,
            Err(e) => {
                warnings.push(self.warning(row_idx, format!("{column}: {e}")));
                None
            }
        }
    }

    fn grade(
        &self,
        row_idx: usize,
        row: &[Cell],
        column: &'static str,
        warnings: &mut Vec<ReadWarning>,
    ) -> Option<Grade> {
        let cell = self.cell(row, column);
        if cell.is_null() {
            return None;
        }
        let grade = cell
            .as_i64()
            .and_then(|v| u8::try_from(v).ok())
            .and_then(Grade::new);
        if grade.is_none() {
            warnings.push(self.warning(
                row_idx,
                format!("{column}: {:?} is not a grade between 0 and 5", cell),
            ));
        }
        grade
    }

    fn warning(&self, row: usize, message: String) -> ReadWarning {
        ReadWarning {
            table: self.table.name.clone(),
            row,
            message,
        }
    }
}

fn read_sections(
    raw: &RawTable,
    warnings: &mut Vec<ReadWarning>,
) -> Result<Vec<RawSectionRow>, SurveyError> {
    let t = Bound::new(raw, &schema::SECTION)?;
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for (i, row) in raw.rows.iter().enumerate() {
        let Some(key) = t.cell(row, col::SECTION_KEY).as_text() else {
            warnings.push(t.warning(i, "section row without key skipped".into()));
            continue;
        };
        if !seen.insert(key.clone()) {
            tracing::debug!(section = %key, "duplicate section row ignored");
            continue;
        }

        let sort_cell = t.cell(row, col::SORT_ORDER);
        let sort_key = sort_cell.as_i64();
        if sort_key.is_none() && !sort_cell.is_null() {
            warnings.push(t.warning(i, format!("{}: {:?} is not an integer", col::SORT_ORDER, sort_cell)));
        }

        rows.push(RawSectionRow {
            from_node: t.cell(row, col::FROM_NODE).as_text(),
            to_node: t.cell(row, col::TO_NODE).as_text(),
            sort_key,
            deleted: t.cell(row, col::DELETED).as_bool(),
            diameter_mm: t.decimal(i, row, col::DIAMETER, warnings),
            material: t.cell(row, col::MATERIAL).as_text(),
            total_length: t.decimal(i, row, col::LENGTH, warnings),
            key,
        });
    }

    Ok(rows)
}

fn read_inspections(
    raw: &RawTable,
    warnings: &mut Vec<ReadWarning>,
) -> Result<Vec<RawInspectionRow>, SurveyError> {
    let t = Bound::new(raw, &schema::INSPECTION)?;
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for (i, row) in raw.rows.iter().enumerate() {
        let key = t.cell(row, col::INSPECTION_KEY).as_text();
        let section_key = t.cell(row, col::INSPECTION_SECTION).as_text();
        let (Some(key), Some(section_key)) = (key, section_key) else {
            warnings.push(t.warning(i, "inspection row without key or section link skipped".into()));
            continue;
        };
        if !seen.insert(key.clone()) {
            continue;
        }

        rows.push(RawInspectionRow {
            key,
            section_key,
            direction: t.cell(row, col::DIRECTION).as_text(),
            surveyed_length: t.decimal(i, row, col::INSPECTED_LENGTH, warnings),
        });
    }

    Ok(rows)
}

fn read_observations(
    raw: &RawTable,
    warnings: &mut Vec<ReadWarning>,
) -> Result<Vec<RawObservationRow>, SurveyError> {
    let t = Bound::new(raw, &schema::OBSERVATION)?;
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for (i, row) in raw.rows.iter().enumerate() {
        let key = t.cell(row, col::OBSERVATION_KEY).as_text();
        let inspection_key = t.cell(row, col::OBSERVATION_INSPECTION).as_text();
        let code = t.cell(row, col::OP_CODE).as_text();
        let (Some(key), Some(inspection_key), Some(code)) = (key, inspection_key, code) else {
            warnings.push(t.warning(
                i,
                "observation row without key, inspection link or code skipped".into(),
            ));
            continue;
        };
        if !seen.insert(key.clone()) {
            continue;
        }

        rows.push(RawObservationRow {
            key,
            inspection_key,
            code,
            distance: t.decimal(i, row, col::DISTANCE, warnings),
            note: t.cell(row, col::NOTE).as_text(),
            percentage: t.decimal(i, row, col::PERCENT, warnings),
        });
    }

    Ok(rows)
}

fn read_statistics(
    raw: &RawTable,
    warnings: &mut Vec<ReadWarning>,
) -> Result<Vec<RawStatisticsRow>, SurveyError> {
    let t = Bound::new(raw, &schema::STATISTICS)?;
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for (i, row) in raw.rows.iter().enumerate() {
        let Some(section_key) = t.cell(row, col::STATISTICS_SECTION).as_text() else {
            warnings.push(t.warning(i, "statistics row without section link skipped".into()));
            continue;
        };
        if !seen.insert(section_key.clone()) {
            continue;
        }

        rows.push(RawStatisticsRow {
            service_grade: t.grade(i, row, col::SERVICE_GRADE, warnings),
            structural_grade: t.grade(i, row, col::STRUCTURAL_GRADE, warnings),
            section_key,
        });
    }

    Ok(rows)
}
