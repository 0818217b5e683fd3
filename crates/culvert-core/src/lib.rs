pub mod audit;
pub mod classify;
pub mod error;
pub mod model;
pub mod parsing;
pub mod pricing;
pub mod reader;
pub mod recommend;
pub mod resolve;
pub mod rules;
pub mod sequence;
pub mod store;
pub mod topology;

use audit::{AuditBundle, AuditSeverity, SectionContext};
use classify::{classify_section, SectionFindings};
use error::SurveyError;
use model::{
    DefectType, Grade, GradeSource, ItemNo, RawInspectionRow, RawObservationRow, RawSectionRow,
    RawStatisticsRow, SectionFlag, SectionRecord,
};
use pricing::{evaluate_upload, PricingConfiguration, PricingReport};
use reader::{read_survey, SurveySource, SurveyTables};
use resolve::{resolve_grades, AuthoritativeGrades, CandidateGrades, Resolution, ResolvedGrade};
use rules::CodeTable;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use store::{CommitOutcome, ResultStore};
use topology::Topology;

pub use reader::db3::DEFAULT_READ_TIMEOUT;

/// Processing options shared by every upload.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions<'a> {
    pub code_table: &'a CodeTable,
    /// Busy timeout for SQLite exports opened from a path.
    pub read_timeout: Duration,
}

impl Default for ProcessOptions<'static> {
    fn default() -> Self {
        Self {
            code_table: rules::builtin::default_table(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Result of processing one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub records: Vec<SectionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingReport>,
    pub audit: AuditBundle,
}

impl ProcessOutput {
    /// Recompute costs for the stored records under another configuration.
    pub fn repriced(&self, config: &PricingConfiguration) -> ProcessOutput {
        let report = evaluate_upload(&self.records, config);
        let mut audit = self.audit.clone();
        audit.set_pricing(&report.results);
        ProcessOutput {
            records: self.records.clone(),
            pricing: Some(report),
            audit,
        }
    }
}

/// Main API entry point: read an export and run the whole pipeline.
pub fn process_upload(
    source: &dyn SurveySource,
    pricing: Option<&PricingConfiguration>,
    options: &ProcessOptions<'_>,
) -> Result<ProcessOutput, SurveyError> {
    let tables = read_survey(source)?;
    Ok(process_tables(&tables, pricing, options))
}

/// Reprocess an upload and commit the result if no newer run started
/// meanwhile. A failed read leaves the stored result untouched.
pub fn reprocess(
    store: &ResultStore,
    upload_id: &str,
    source: &dyn SurveySource,
    pricing: Option<&PricingConfiguration>,
    options: &ProcessOptions<'_>,
) -> Result<CommitOutcome, SurveyError> {
    let ticket = store.begin(upload_id)?;
    let output = process_upload(source, pricing, options)?;
    store.commit(&ticket, output)
}

/// Run normalization, sequencing, classification, resolution,
/// recommendation and (optionally) pricing over already-read tables.
pub fn process_tables(
    tables: &SurveyTables,
    pricing: Option<&PricingConfiguration>,
    options: &ProcessOptions<'_>,
) -> ProcessOutput {
    let table = options.code_table;
    let mut audit = AuditBundle::new(format!("{} v{}", table.name(), table.version()));
    audit.add_read_warnings(&tables.warnings);

    let links = Links::build(tables, &mut audit);
    let sequence = sequence::assign_items(&tables.sections);
    for w in &sequence.warnings {
        audit.warn(None, AuditSeverity::Important, w.clone());
    }
    let item_note = match sequence.mode {
        sequence::NumberingMode::Consecutive => "consecutive sort keys renumbered",
        sequence::NumberingMode::Preserved => "sort key preserved",
        sequence::NumberingMode::Positional => "numbered by position",
    };

    // Topology and items are settled for every section before grading.
    let prepared: Vec<PreparedSection<'_>> = sequence
        .sections
        .iter()
        .map(|s| {
            let inspection = links.inspection(&s.section.key);
            PreparedSection {
                section: s.section,
                item: s.item,
                inspection,
                topology: topology::normalize(s.section, inspection),
            }
        })
        .collect();

    let mut records = Vec::with_capacity(prepared.len());
    for p in &prepared {
        let observations: Vec<RawObservationRow> =
            links.observations(p.inspection).into_iter().cloned().collect();
        let findings = classify_section(&observations, table);
        let authoritative = links.statistics(&p.section.key).map(AuthoritativeGrades::from);
        let resolution = resolve_grades(CandidateGrades::from(&findings), authoritative.as_ref());

        let mut flags = Vec::new();
        if p.topology.direction_unknown() {
            flags.push(SectionFlag::DirectionUnknown);
            audit.warn(
                Some(p.section.key.as_str()),
                AuditSeverity::Info,
                "flow direction unknown; raw node order kept",
            );
        }
        for code in &findings.unclassified {
            flags.push(SectionFlag::UnclassifiedObservation { code: code.clone() });
            audit.warn(
                Some(p.section.key.as_str()),
                AuditSeverity::Important,
                format!("observation code '{code}' is not in the code table"),
            );
        }

        let base = RecordBase {
            prepared: p,
            observations,
            findings: &findings,
            adoptable: resolution.is_adoptable(),
            flags,
        };
        let ctx = SectionContext {
            topology: &p.topology,
            findings: &findings,
            resolution: &resolution,
            item_note,
        };

        for record in base.into_records(&resolution) {
            audit.entries.push(audit::build_entry(&record, &ctx));
            records.push(record);
        }
    }

    let pricing = pricing.map(|config| {
        let report = evaluate_upload(&records, config);
        audit.set_pricing(&report.results);
        report
    });

    tracing::info!(
        sections = prepared.len(),
        records = records.len(),
        split = records.iter().filter(|r| r.is_split_part()).count(),
        gaps = pricing.as_ref().map_or(0, |p| p.gaps.len()),
        "upload processed"
    );

    ProcessOutput {
        records,
        pricing,
        audit,
    }
}

struct PreparedSection<'a> {
    section: &'a RawSectionRow,
    item: u32,
    inspection: Option<&'a RawInspectionRow>,
    topology: Topology,
}

/// Lookups joining the four tables.
struct Links<'a> {
    inspections: HashMap<&'a str, &'a RawInspectionRow>,
    observations: HashMap<&'a str, Vec<&'a RawObservationRow>>,
    statistics: HashMap<&'a str, &'a RawStatisticsRow>,
}

impl<'a> Links<'a> {
    fn build(tables: &'a SurveyTables, audit: &mut AuditBundle) -> Self {
        // The last inspection in export order is the current survey.
        let mut inspections: HashMap<&str, &RawInspectionRow> = HashMap::new();
        for insp in &tables.inspections {
            if let Some(prev) = inspections.insert(insp.section_key.as_str(), insp) {
                tracing::debug!(
                    section = %insp.section_key,
                    replaced = %prev.key,
                    kept = %insp.key,
                    "section has several inspections; using the last"
                );
            }
        }

        let known: HashSet<&str> = tables.inspections.iter().map(|i| i.key.as_str()).collect();
        let mut observations: HashMap<&str, Vec<&RawObservationRow>> = HashMap::new();
        let mut orphans = 0usize;
        for obs in &tables.observations {
            if !known.contains(obs.inspection_key.as_str()) {
                orphans += 1;
                continue;
            }
            observations
                .entry(obs.inspection_key.as_str())
                .or_default()
                .push(obs);
        }
        if orphans > 0 {
            tracing::warn!(orphans, "observations reference unknown inspections");
            audit.warn(
                None,
                AuditSeverity::Important,
                format!("{orphans} observation(s) reference unknown inspections and were ignored"),
            );
        }

        let mut statistics: HashMap<&str, &RawStatisticsRow> = HashMap::new();
        for stat in &tables.statistics {
            statistics.entry(stat.section_key.as_str()).or_insert(stat);
        }

        Links {
            inspections,
            observations,
            statistics,
        }
    }

    fn inspection(&self, section_key: &str) -> Option<&'a RawInspectionRow> {
        self.inspections.get(section_key).copied()
    }

    fn statistics(&self, section_key: &str) -> Option<&'a RawStatisticsRow> {
        self.statistics.get(section_key).copied()
    }

    /// Observations of an inspection ordered by distance, then key.
    /// Rows without a distance sort last.
    fn observations(&self, inspection: Option<&RawInspectionRow>) -> Vec<&'a RawObservationRow> {
        let Some(inspection) = inspection else {
            return Vec::new();
        };
        let mut obs = self
            .observations
            .get(inspection.key.as_str())
            .cloned()
            .unwrap_or_default();
        obs.sort_by(|a, b| {
            (a.distance.is_none(), a.distance, &a.key).cmp(&(b.distance.is_none(), b.distance, &b.key))
        });
        obs
    }
}

struct RecordBase<'p, 'a> {
    prepared: &'p PreparedSection<'a>,
    observations: Vec<RawObservationRow>,
    findings: &'p SectionFindings,
    adoptable: bool,
    flags: Vec<SectionFlag>,
}

impl RecordBase<'_, '_> {
    /// One record per resolved grade. A split yields the service record
    /// first and the structural record suffixed `a`.
    fn into_records(self, resolution: &Resolution) -> Vec<SectionRecord> {
        let base = self.prepared.item;
        match resolution {
            Resolution::ObservationOnly => vec![self.record(
                ItemNo::new(base),
                DefectType::ObservationOnly,
                Grade::NONE,
                GradeSource::None,
            )],
            Resolution::Single(g) => vec![self.graded(ItemNo::new(base), g)],
            Resolution::Split {
                service,
                structural,
            } => vec![
                self.graded(ItemNo::new(base), service),
                self.graded(ItemNo::with_suffix(base, 'a'), structural),
            ],
        }
    }

    fn graded(&self, item: ItemNo, resolved: &ResolvedGrade) -> SectionRecord {
        self.record(item, resolved.defect_type, resolved.grade, resolved.source)
    }

    fn record(
        &self,
        item: ItemNo,
        defect_type: DefectType,
        grade: Grade,
        grade_source: GradeSource,
    ) -> SectionRecord {
        let defect_codes = self
            .findings
            .finding(defect_type)
            .map(|f| f.codes.clone())
            .unwrap_or_default();
        let recommendation = recommend::recommend(defect_type, grade, &defect_codes);
        let section = self.prepared.section;
        let inspection = self.prepared.inspection;

        SectionRecord {
            item,
            section_key: section.key.clone(),
            start_node: self.prepared.topology.start.clone(),
            finish_node: self.prepared.topology.finish.clone(),
            direction: self.prepared.topology.direction,
            diameter_mm: section.diameter_mm,
            material: section.material.clone(),
            surveyed_length: inspection.and_then(|i| i.surveyed_length),
            total_length: section.total_length,
            observations: self.observations.clone(),
            defect_type,
            grade,
            grade_source,
            defect_codes,
            recommendation: recommendation.text,
            catalog_ref: recommendation.catalog_ref,
            adoptable: self.adoptable,
            flags: self.flags.clone(),
        }
    }
}
