use crate::classify::{Contribution, SectionFindings};
use crate::model::{GradeSource, SectionRecord};
use crate::pricing::{CostResult, CostStatus};
use crate::reader::ReadWarning;
use crate::resolve::Resolution;
use crate::topology::Topology;
use serde::{Deserialize, Serialize};

pub const AUDIT_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Important,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStepType {
    Topology,
    Item,
    Classify,
    Resolve,
    Recommend,
    Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    pub step_type: AuditStepType,
    pub message: String,
}

impl AuditStep {
    fn new(step_type: AuditStepType, message: impl Into<String>) -> Self {
        AuditStep {
            step_type,
            message: message.into(),
        }
    }
}

/// How one output record was derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub section_key: String,
    pub item: String,
    pub steps: Vec<AuditStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditWarning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_key: Option<String>,
    pub message: String,
    pub severity: AuditSeverity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditBundle {
    pub audit_schema_version: String,
    /// Code table name and version used for classification.
    pub code_table: String,
    pub entries: Vec<AuditEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<AuditWarning>,
}

impl AuditBundle {
    pub fn new(code_table: impl Into<String>) -> Self {
        Self {
            audit_schema_version: AUDIT_SCHEMA_VERSION.to_string(),
            code_table: code_table.into(),
            entries: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn warn(
        &mut self,
        section_key: Option<&str>,
        severity: AuditSeverity,
        message: impl Into<String>,
    ) {
        self.warnings.push(AuditWarning {
            section_key: section_key.map(String::from),
            message: message.into(),
            severity,
        });
    }

    pub fn add_read_warnings(&mut self, warnings: &[ReadWarning]) {
        for w in warnings {
            self.warn(
                None,
                AuditSeverity::Important,
                format!("{} row {}: {}", w.table, w.row, w.message),
            );
        }
    }

    /// Replace the pricing step of every entry with the given results.
    /// Entries and results are matched by item number.
    pub fn set_pricing(&mut self, results: &[CostResult]) {
        for entry in &mut self.entries {
            entry.steps.retain(|s| s.step_type != AuditStepType::Price);
            if let Some(result) = results.iter().find(|r| r.item.to_string() == entry.item) {
                entry.steps.push(price_step(result));
            }
        }
    }

}

/// Per-section facts shared by every record built from the section.
pub struct SectionContext<'a> {
    pub topology: &'a Topology,
    pub findings: &'a SectionFindings,
    pub resolution: &'a Resolution,
    pub item_note: &'a str,
}

pub fn build_entry(record: &SectionRecord, ctx: &SectionContext<'_>) -> AuditEntry {
    let mut steps = vec![
        AuditStep::new(AuditStepType::Topology, topology_message(ctx.topology)),
        AuditStep::new(
            AuditStepType::Item,
            format!("Item {} ({})", record.item, ctx.item_note),
        ),
    ];

    for outcome in &ctx.findings.outcomes {
        let verb = match outcome.contribution {
            Contribution::Graded => "graded",
            Contribution::Promoted => "promoted to structural",
            Contribution::Excluded => "excluded",
            Contribution::Unclassified => "unclassified",
        };
        steps.push(AuditStep::new(
            AuditStepType::Classify,
            format!(
                "Observation {} {}: {}",
                outcome.observation_key, verb, outcome.classification.reason
            ),
        ));
    }

    steps.push(AuditStep::new(
        AuditStepType::Resolve,
        resolution_message(record, ctx.resolution),
    ));
    steps.push(AuditStep::new(
        AuditStepType::Recommend,
        match &record.catalog_ref {
            Some(id) => format!("{} [{}]", record.recommendation, id),
            None => record.recommendation.clone(),
        },
    ));

    AuditEntry {
        entry_id: format!("rec_{}_{}", record.section_key, record.item),
        section_key: record.section_key.clone(),
        item: record.item.to_string(),
        steps,
    }
}

fn topology_message(topology: &Topology) -> String {
    format!(
        "Direction {}: start '{}', finish '{}'",
        topology.direction, topology.start, topology.finish
    )
}

fn resolution_message(record: &SectionRecord, resolution: &Resolution) -> String {
    let source = match record.grade_source {
        GradeSource::Statistics => "from statistics",
        GradeSource::Classifier => "from classifier",
        GradeSource::None => "ungraded",
    };
    let split = if matches!(resolution, Resolution::Split { .. }) {
        " (split section)"
    } else {
        ""
    };
    format!(
        "{} grade {} {}{}",
        record.defect_type, record.grade, source, split
    )
}

fn price_step(result: &CostResult) -> AuditStep {
    let message = match (result.status, result.cost) {
        (CostStatus::Priced, Some(cost)) => format!(
            "Rule '{}' matched {} -> cost {} (config v{})",
            result.rule,
            result
                .comparison_value
                .map(|v| v.to_string())
                .unwrap_or_default(),
            cost,
            result.config_version
        ),
        (CostStatus::MissingValue, _) => format!(
            "No comparison value; cost not computed (config v{})",
            result.config_version
        ),
        (CostStatus::Overflow, _) => format!(
            "Rule '{}' matched but cost overflowed (config v{})",
            result.rule, result.config_version
        ),
        _ => format!(
            "Value {} is in no enabled range; unmatched (config v{})",
            result
                .comparison_value
                .map(|v| v.to_string())
                .unwrap_or_default(),
            result.config_version
        ),
    };
    AuditStep::new(AuditStepType::Price, message)
}
