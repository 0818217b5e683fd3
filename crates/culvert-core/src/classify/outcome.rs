use crate::model::{DefectType, Grade};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    /// A defect in one of the two graded categories.
    Defect(DefectType),
    /// Survey bookkeeping (start, size change, photo, ...).
    Informational,
    /// Code missing from the code table.
    Unclassified,
}

/// Classification of a single observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub kind: ObservationKind,
    /// Band grade from the code table (or the matching note pattern).
    pub candidate: Grade,
    /// Whether a percentage on this observation sets the grade.
    pub percent_graded: bool,
    /// Highest area-loss percentage found on the row or in its note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<Decimal>,
    /// Human-readable explanation of which table entry applied.
    pub reason: String,
}

/// How one observation contributed to its section's grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contribution {
    Graded,
    /// Informational code counted because a failure or lining marker is present.
    Promoted,
    /// Informational code left out of grading.
    Excluded,
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationOutcome {
    pub observation_key: String,
    pub code: String,
    pub classification: Classification,
    pub contribution: Contribution,
}

/// Graded result for one defect category of a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFinding {
    pub grade: Grade,
    /// Codes that contributed, sorted and de-duplicated.
    pub codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_percent: Option<Decimal>,
}

/// Classifier result for all observations of a section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFindings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<CategoryFinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structural: Option<CategoryFinding>,
    /// Codes not found in the code table.
    pub unclassified: Vec<String>,
    pub outcomes: Vec<ObservationOutcome>,
}

impl SectionFindings {
    pub fn finding(&self, defect_type: DefectType) -> Option<&CategoryFinding> {
        match defect_type {
            DefectType::Service => self.service.as_ref(),
            DefectType::Structural => self.structural.as_ref(),
            DefectType::ObservationOnly => None,
        }
    }

    pub fn service_grade(&self) -> Option<Grade> {
        self.service.as_ref().map(|f| f.grade)
    }

    pub fn structural_grade(&self) -> Option<Grade> {
        self.structural.as_ref().map(|f| f.grade)
    }
}
