use crate::error::SurveyError;
use crate::model::{DefectType, Grade};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const REPAIR_CATALOG_JSON: &str = include_str!("../../../rules/repair-catalog.json");

pub const NO_ACTION: &str = "No action required";

static CATALOG: LazyLock<RepairCatalog> = LazyLock::new(|| {
    let catalog: RepairCatalog =
        serde_json::from_str(REPAIR_CATALOG_JSON).expect("embedded repair-catalog.json is valid");
    validate_catalog(&catalog).expect("embedded repair-catalog.json passes validation");
    catalog
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairCatalog {
    pub name: String,
    pub version: String,
    pub entries: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub category: DefectType,
    pub min_grade: Grade,
    /// Higher ranks win when several entries apply.
    pub severity_rank: u32,
    /// Entry only applies when one of these codes contributed. Empty = any.
    #[serde(default)]
    pub trigger_codes: Vec<String>,
    pub title: String,
    pub text: String,
}

impl CatalogEntry {
    fn applies(&self, defect_type: DefectType, grade: Grade, codes: &[String]) -> bool {
        self.category == defect_type
            && grade >= self.min_grade
            && (self.trigger_codes.is_empty()
                || self
                    .trigger_codes
                    .iter()
                    .any(|t| codes.iter().any(|c| c.eq_ignore_ascii_case(t))))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_ref: Option<String>,
}

pub fn catalog() -> &'static RepairCatalog {
    &CATALOG
}

/// Recommend a maintenance action for one graded record.
///
/// The applicable entry with the highest severity rank is used; ties go to
/// the entry declared first.
pub fn recommend(defect_type: DefectType, grade: Grade, codes: &[String]) -> Recommendation {
    recommend_from(catalog(), defect_type, grade, codes)
}

pub fn recommend_from(
    catalog: &RepairCatalog,
    defect_type: DefectType,
    grade: Grade,
    codes: &[String],
) -> Recommendation {
    if !grade.is_defect() || defect_type == DefectType::ObservationOnly {
        return Recommendation {
            text: NO_ACTION.to_string(),
            catalog_ref: None,
        };
    }

    let mut best: Option<&CatalogEntry> = None;
    for entry in catalog
        .entries
        .iter()
        .filter(|e| e.applies(defect_type, grade, codes))
    {
        if best.map_or(true, |b| entry.severity_rank > b.severity_rank) {
            best = Some(entry);
        }
    }

    match best {
        Some(entry) => Recommendation {
            text: format!("{}: {}", entry.title, entry.text),
            catalog_ref: Some(entry.id.clone()),
        },
        None => Recommendation {
            text: format!("Monitor {defect_type} condition and re-inspect"),
            catalog_ref: None,
        },
    }
}

pub fn validate_catalog(catalog: &RepairCatalog) -> Result<(), SurveyError> {
    let mut ids = std::collections::HashSet::new();
    for entry in &catalog.entries {
        if !ids.insert(entry.id.as_str()) {
            return Err(SurveyError::CodeTableInvalid(format!(
                "repair catalog entry '{}' is defined more than once",
                entry.id
            )));
        }
        if entry.category == DefectType::ObservationOnly {
            return Err(SurveyError::CodeTableInvalid(format!(
                "repair catalog entry '{}' must be service or structural",
                entry.id
            )));
        }
    }
    Ok(())
}
