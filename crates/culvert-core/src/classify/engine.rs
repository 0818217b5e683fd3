use crate::classify::outcome::{
    CategoryFinding, Classification, Contribution, ObservationKind, ObservationOutcome,
    SectionFindings,
};
use crate::model::{DefectType, Grade, RawObservationRow};
use crate::rules::schema::CodeCategory;
use crate::rules::CodeTable;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s*%").expect("percent regex is valid"));

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Classify a single observation against a code table.
///
/// Note patterns are tried first (for ambiguous codes); the base entry
/// applies when none match. Unknown codes are `Unclassified` with grade 0.
pub fn classify(observation: &RawObservationRow, table: &CodeTable) -> Classification {
    let percent = observation_percent(observation);

    let Some(entry) = table.lookup(&observation.code) else {
        return Classification {
            kind: ObservationKind::Unclassified,
            candidate: Grade::NONE,
            percent_graded: false,
            percent,
            reason: format!(
                "{}: not in code table '{}' v{}",
                observation.code,
                table.name(),
                table.version()
            ),
        };
    };

    let note = observation.note.as_deref().unwrap_or("");
    let matched = entry.patterns.iter().find(|p| p.regex.is_match(note));

    let (category, band, percent_graded, reason) = match matched {
        Some(p) => (
            p.category,
            p.grade,
            p.percent_graded,
            format!(
                "{}: note matches /{}/ -> {} band {}",
                entry.code,
                p.regex.as_str(),
                category_label(p.category),
                p.grade
            ),
        ),
        None => (
            entry.category,
            entry.grade,
            entry.percent_graded,
            format!(
                "{}: {} band {}",
                entry.code,
                category_label(entry.category),
                entry.grade
            ),
        ),
    };

    let kind = match category {
        CodeCategory::Service => ObservationKind::Defect(DefectType::Service),
        CodeCategory::Structural => ObservationKind::Defect(DefectType::Structural),
        CodeCategory::Informational => ObservationKind::Informational,
    };

    Classification {
        kind,
        candidate: band,
        percent_graded,
        percent,
        reason,
    }
}

/// Classify all observations of one section and derive per-category
/// candidate grades.
///
/// Per category the candidate is the highest of:
/// - the band of every graded observation without a usable percentage
/// - the percent-band grade of the highest percentage on percent-graded
///   observations
///
/// Informational codes only count (as structural, at their band) when the
/// section also holds a structural-failure or lining/patching marker.
pub fn classify_section(observations: &[RawObservationRow], table: &CodeTable) -> SectionFindings {
    let has_marker = observations
        .iter()
        .any(|o| table.is_failure_or_lining_marker(&o.code));

    let mut service = Accumulator::default();
    let mut structural = Accumulator::default();
    let mut unclassified = BTreeSet::new();
    let mut outcomes = Vec::with_capacity(observations.len());

    for obs in observations {
        let classification = classify(obs, table);
        let code = obs.code.trim().to_uppercase();

        let contribution = match classification.kind {
            ObservationKind::Defect(DefectType::Service) => {
                service.add(&code, &classification);
                Contribution::Graded
            }
            ObservationKind::Defect(_) => {
                structural.add(&code, &classification);
                Contribution::Graded
            }
            ObservationKind::Informational if has_marker && classification.candidate.is_defect() => {
                structural.add(&code, &classification);
                Contribution::Promoted
            }
            ObservationKind::Informational => Contribution::Excluded,
            ObservationKind::Unclassified => {
                tracing::warn!(
                    observation = %obs.key,
                    code = %obs.code,
                    "unclassified observation excluded from grading"
                );
                unclassified.insert(code.clone());
                Contribution::Unclassified
            }
        };

        outcomes.push(ObservationOutcome {
            observation_key: obs.key.clone(),
            code,
            classification,
            contribution,
        });
    }

    SectionFindings {
        service: service.finish(table),
        structural: structural.finish(table),
        unclassified: unclassified.into_iter().collect(),
        outcomes,
    }
}

#[derive(Default)]
struct Accumulator {
    band_max: Option<Grade>,
    percent_max: Option<Decimal>,
    codes: BTreeSet<String>,
}

impl Accumulator {
    fn add(&mut self, code: &str, classification: &Classification) {
        self.codes.insert(code.to_string());
        match (classification.percent_graded, classification.percent) {
            (true, Some(pct)) => {
                self.percent_max = Some(self.percent_max.map_or(pct, |m| m.max(pct)));
            }
            _ => {
                let band = classification.candidate;
                self.band_max = Some(self.band_max.map_or(band, |m| m.max(band)));
            }
        }
    }

    fn finish(self, table: &CodeTable) -> Option<CategoryFinding> {
        let percent_grade = self.percent_max.map(|pct| table.grade_for_percent(pct));
        let grade = self.band_max.max(percent_grade)?;
        if !grade.is_defect() {
            return None;
        }
        Some(CategoryFinding {
            grade,
            codes: self.codes.into_iter().collect(),
            max_percent: self.percent_max,
        })
    }
}

/// Highest plausible percentage on the row or embedded in its note.
fn observation_percent(observation: &RawObservationRow) -> Option<Decimal> {
    let from_note = observation
        .note
        .as_deref()
        .and_then(percent_from_note);
    let from_column = observation
        .percentage
        .filter(|p| *p >= Decimal::ZERO && *p <= HUNDRED);
    from_note.max(from_column)
}

/// Extract the highest percentage written in a free-text note,
/// e.g. "25% cross-sectional area loss" -> 25.
pub fn percent_from_note(note: &str) -> Option<Decimal> {
    PERCENT_RE
        .captures_iter(note)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().replace(',', ".").parse::<Decimal>().ok())
        .filter(|p| *p <= HUNDRED)
        .max()
}

fn category_label(category: CodeCategory) -> &'static str {
    match category {
        CodeCategory::Service => "service",
        CodeCategory::Structural => "structural",
        CodeCategory::Informational => "informational",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::builtin::default_table;
    use rust_decimal_macros::dec;

    fn obs(key: &str, code: &str, note: Option<&str>) -> RawObservationRow {
        RawObservationRow {
            key: key.into(),
            inspection_key: "I1".into(),
            code: code.into(),
            distance: None,
            note: note.map(String::from),
            percentage: None,
        }
    }

    fn grade(v: u8) -> Grade {
        Grade::new(v).unwrap()
    }

    #[test]
    fn test_known_code_uses_band() {
        let c = classify(&obs("1", "der", None), default_table());
        assert_eq!(c.kind, ObservationKind::Defect(DefectType::Service));
        assert_eq!(c.candidate, grade(2));
        assert!(c.percent_graded);
        assert_eq!(c.percent, None);
    }

    #[test]
    fn test_percentage_in_note_refines_grade() {
        let findings = classify_section(
            &[obs("1", "DER", Some("25% cross-sectional area loss"))],
            default_table(),
        );
        let service = findings.service.unwrap();
        assert_eq!(service.grade, grade(3));
        assert_eq!(service.max_percent, Some(dec!(25)));
        assert!(findings.structural.is_none());
    }

    #[test]
    fn test_percent_threshold_boundaries() {
        let table = default_table();
        for (pct, expected) in [("5", 1), ("5.5", 2), ("15", 2), ("35", 3), ("36", 4)] {
            let note = format!("{pct}% loss");
            let findings = classify_section(&[obs("1", "DES", Some(&note))], table);
            assert_eq!(findings.service.unwrap().grade, grade(expected), "at {pct}%");
        }
    }

    #[test]
    fn test_highest_percentage_across_section_wins() {
        let findings = classify_section(
            &[
                obs("1", "DER", Some("10%")),
                obs("2", "DES", Some("deposits 30 %")),
                obs("3", "DEG", Some("4%")),
            ],
            default_table(),
        );
        let service = findings.service.unwrap();
        assert_eq!(service.grade, grade(3));
        assert_eq!(service.codes, vec!["DEG", "DER", "DES"]);
    }

    #[test]
    fn test_percentage_column_is_used() {
        let mut row = obs("1", "D", None);
        row.percentage = Some(dec!(12));
        let findings = classify_section(&[row], default_table());
        assert_eq!(findings.structural.unwrap().grade, grade(2));
    }

    #[test]
    fn test_non_percent_code_ignores_percentage() {
        let findings = classify_section(&[obs("1", "B", Some("3% visible"))], default_table());
        assert_eq!(findings.structural.unwrap().grade, grade(4));
    }

    #[test]
    fn test_band_and_percent_take_the_higher() {
        let findings = classify_section(
            &[obs("1", "DER", Some("3%")), obs("2", "RM", None)],
            default_table(),
        );
        assert_eq!(findings.service.unwrap().grade, grade(4));
    }

    #[test]
    fn test_ambiguous_code_resolved_by_note_pattern() {
        let table = default_table();
        let plain = classify(&obs("1", "OB", Some("brick in invert")), table);
        assert_eq!(plain.kind, ObservationKind::Defect(DefectType::Service));

        let intruding = classify(&obs("2", "OB", Some("intruding connection at 2 o'clock")), table);
        assert_eq!(intruding.kind, ObservationKind::Defect(DefectType::Structural));
        assert_eq!(intruding.candidate, grade(2));
        assert!(intruding.reason.contains("note matches"));
    }

    #[test]
    fn test_informational_code_excluded_without_marker() {
        let findings = classify_section(
            &[obs("1", "ST", None), obs("2", "SC", Some("150mm to 225mm")), obs("3", "FH", None)],
            default_table(),
        );
        assert!(findings.service.is_none());
        assert!(findings.structural.is_none());
        assert!(findings
            .outcomes
            .iter()
            .all(|o| o.contribution == Contribution::Excluded));
    }

    #[test]
    fn test_informational_code_promoted_with_lining_marker() {
        let findings = classify_section(
            &[obs("1", "SC", None), obs("2", "RPP", Some("patch repair at 4.2m"))],
            default_table(),
        );
        let structural = findings.structural.unwrap();
        assert_eq!(structural.grade, grade(1));
        assert_eq!(structural.codes, vec!["SC"]);
        assert_eq!(findings.outcomes[0].contribution, Contribution::Promoted);
    }

    #[test]
    fn test_informational_code_promoted_with_failure_marker() {
        let findings = classify_section(
            &[obs("1", "MC", None), obs("2", "D", Some("deformed 3%"))],
            default_table(),
        );
        let structural = findings.structural.unwrap();
        assert_eq!(structural.grade, grade(1));
        assert_eq!(structural.codes, vec!["D", "MC"]);
    }

    #[test]
    fn test_unclassified_code_recorded_and_excluded() {
        let findings = classify_section(
            &[obs("1", "ZZZ", None), obs("2", "CL", None)],
            default_table(),
        );
        assert_eq!(findings.unclassified, vec!["ZZZ"]);
        assert_eq!(findings.structural.unwrap().grade, grade(2));
        assert_eq!(findings.outcomes[0].contribution, Contribution::Unclassified);
    }

    #[test]
    fn test_percent_from_note() {
        assert_eq!(percent_from_note("loss 25% and 40 %"), Some(dec!(40)));
        assert_eq!(percent_from_note("12,5% blocked"), Some(dec!(12.5)));
        assert_eq!(percent_from_note("250% typo"), None);
        assert_eq!(percent_from_note("no figure"), None);
    }
}
