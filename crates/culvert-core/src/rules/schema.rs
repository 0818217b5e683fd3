use crate::model::Grade;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A versioned table of operation codes for one coding standard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeTableDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    /// Percentage -> grade bands, ascending by `max`. A value is graded by the
    /// first band whose `max` it does not exceed.
    pub percent_bands: Vec<PercentBand>,
    /// Grade for percentages above every band.
    pub percent_fallback_grade: Grade,
    /// Codes whose presence lets informational codes count toward grading.
    #[serde(default)]
    pub structural_failure_codes: Vec<String>,
    /// Lining and patch repair markers, same effect as failure codes.
    #[serde(default)]
    pub lining_codes: Vec<String>,
    pub codes: Vec<CodeDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PercentBand {
    /// Inclusive upper bound in percent (as string for exact decimal).
    pub max: Decimal,
    pub grade: Grade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeCategory {
    Service,
    Structural,
    Informational,
}

/// A single operation code within a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeDef {
    pub code: String,
    pub category: CodeCategory,
    /// Default severity band when no pattern or percentage applies.
    pub grade: Grade,
    /// Whether a recorded percentage (area loss) sets the grade.
    #[serde(default)]
    pub percent_graded: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Note patterns for codes whose meaning depends on the remark text.
    /// Checked in order; the first match replaces the base entry.
    #[serde(default)]
    pub patterns: Vec<NotePatternDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePatternDef {
    pub pattern: String,
    pub category: CodeCategory,
    pub grade: Grade,
    #[serde(default)]
    pub percent_graded: bool,
}
