use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One physical pipe run as it appears in the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSectionRow {
    pub key: String,
    pub from_node: Option<String>,
    pub to_node: Option<String>,
    pub sort_key: Option<i64>,
    pub deleted: bool,
    /// Nominal bore in millimetres.
    pub diameter_mm: Option<Decimal>,
    pub material: Option<String>,
    pub total_length: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInspectionRow {
    pub key: String,
    pub section_key: String,
    /// Direction flag exactly as recorded by the surveyor.
    pub direction: Option<String>,
    pub surveyed_length: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawObservationRow {
    pub key: String,
    pub inspection_key: String,
    pub code: String,
    pub distance: Option<Decimal>,
    pub note: Option<String>,
    pub percentage: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStatisticsRow {
    pub section_key: String,
    pub service_grade: Option<Grade>,
    pub structural_grade: Option<Grade>,
}

/// Severity grade, 0 (no defect) to 5.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Grade(u8);

impl Grade {
    pub const NONE: Grade = Grade(0);

    pub fn new(value: u8) -> Option<Grade> {
        (value <= 5).then_some(Grade(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_defect(self) -> bool {
        self.0 > 0
    }
}

impl TryFrom<u8> for Grade {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Grade::new(value).ok_or_else(|| format!("grade {value} is outside 0-5"))
    }
}

impl From<Grade> for u8 {
    fn from(grade: Grade) -> u8 {
        grade.0
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectType {
    Service,
    Structural,
    ObservationOnly,
}

impl fmt::Display for DefectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefectType::Service => write!(f, "service"),
            DefectType::Structural => write!(f, "structural"),
            DefectType::ObservationOnly => write!(f, "observation only"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    /// Camera travelled with the flow.
    Downstream,
    /// Camera travelled against the flow.
    Upstream,
    Unknown,
}

impl FlowDirection {
    pub fn from_flag(flag: Option<&str>) -> FlowDirection {
        let Some(flag) = flag else {
            return FlowDirection::Unknown;
        };
        match flag.trim().to_lowercase().as_str() {
            "u" | "up" | "upstream" | "against" | "against flow" | "2" => FlowDirection::Upstream,
            "d" | "down" | "downstream" | "with" | "with flow" | "1" => {
                FlowDirection::Downstream
            }
            _ => FlowDirection::Unknown,
        }
    }
}

impl fmt::Display for FlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowDirection::Downstream => write!(f, "downstream"),
            FlowDirection::Upstream => write!(f, "upstream"),
            FlowDirection::Unknown => write!(f, "unknown"),
        }
    }
}

/// User-facing item number, e.g. `13` or `13a`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemNo {
    pub base: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<char>,
}

impl ItemNo {
    pub fn new(base: u32) -> ItemNo {
        ItemNo { base, suffix: None }
    }

    pub fn with_suffix(base: u32, suffix: char) -> ItemNo {
        ItemNo {
            base,
            suffix: Some(suffix),
        }
    }
}

impl fmt::Display for ItemNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suffix {
            Some(s) => write!(f, "{}{}", self.base, s),
            None => write!(f, "{}", self.base),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeSource {
    Statistics,
    Classifier,
    None,
}

/// Recoverable conditions attached to a record instead of failing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionFlag {
    DirectionUnknown,
    UnclassifiedObservation { code: String },
}

/// The normalized unit of work produced for every live section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub item: ItemNo,
    pub section_key: String,
    pub start_node: String,
    pub finish_node: String,
    pub direction: FlowDirection,
    pub diameter_mm: Option<Decimal>,
    pub material: Option<String>,
    pub surveyed_length: Option<Decimal>,
    pub total_length: Option<Decimal>,
    pub observations: Vec<RawObservationRow>,
    pub defect_type: DefectType,
    pub grade: Grade,
    pub grade_source: GradeSource,
    /// Codes that contributed to this record's grade.
    pub defect_codes: Vec<String>,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_ref: Option<String>,
    pub adoptable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<SectionFlag>,
}

impl SectionRecord {
    /// Length used for costing: surveyed if recorded, otherwise the asset length.
    pub fn costing_length(&self) -> Option<Decimal> {
        self.surveyed_length.or(self.total_length)
    }

    pub fn is_split_part(&self) -> bool {
        self.item.suffix.is_some()
    }
}
