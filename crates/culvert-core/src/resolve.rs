use crate::classify::SectionFindings;
use crate::model::{DefectType, Grade, GradeSource, RawStatisticsRow};
use serde::{Deserialize, Serialize};

/// Classifier candidate grades for one section, by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateGrades {
    pub service: Grade,
    pub structural: Grade,
}

impl From<&SectionFindings> for CandidateGrades {
    fn from(findings: &SectionFindings) -> Self {
        CandidateGrades {
            service: findings.service_grade().unwrap_or(Grade::NONE),
            structural: findings.structural_grade().unwrap_or(Grade::NONE),
        }
    }
}

/// Grades taken from the export's statistics table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritativeGrades {
    pub service: Option<Grade>,
    pub structural: Option<Grade>,
}

impl From<&RawStatisticsRow> for AuthoritativeGrades {
    fn from(row: &RawStatisticsRow) -> Self {
        AuthoritativeGrades {
            service: row.service_grade,
            structural: row.structural_grade,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedGrade {
    pub defect_type: DefectType,
    pub grade: Grade,
    pub source: GradeSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// Nothing graded; rendered with grade 0.
    ObservationOnly,
    Single(ResolvedGrade),
    /// Both categories graded; service is rendered first.
    Split {
        service: ResolvedGrade,
        structural: ResolvedGrade,
    },
}

impl Resolution {
    pub fn service(&self) -> Option<&ResolvedGrade> {
        match self {
            Resolution::Single(g) if g.defect_type == DefectType::Service => Some(g),
            Resolution::Split { service, .. } => Some(service),
            _ => None,
        }
    }

    pub fn structural(&self) -> Option<&ResolvedGrade> {
        match self {
            Resolution::Single(g) if g.defect_type == DefectType::Structural => Some(g),
            Resolution::Split { structural, .. } => Some(structural),
            _ => None,
        }
    }

    /// A section is adoptable when its structural grade is below 3 and its
    /// service grade below 4.
    pub fn is_adoptable(&self) -> bool {
        let service = self.service().map_or(0, |g| g.grade.value());
        let structural = self.structural().map_or(0, |g| g.grade.value());
        structural < 3 && service < 4
    }
}

/// Reconcile statistics grades with classifier candidates.
///
/// Per category a non-zero statistics grade wins; otherwise a non-zero
/// classifier candidate is used. Zero everywhere means observation only.
pub fn resolve_grades(
    candidates: CandidateGrades,
    authoritative: Option<&AuthoritativeGrades>,
) -> Resolution {
    let service = resolve_category(
        DefectType::Service,
        candidates.service,
        authoritative.and_then(|a| a.service),
    );
    let structural = resolve_category(
        DefectType::Structural,
        candidates.structural,
        authoritative.and_then(|a| a.structural),
    );

    match (service, structural) {
        (None, None) => Resolution::ObservationOnly,
        (Some(g), None) | (None, Some(g)) => Resolution::Single(g),
        (Some(service), Some(structural)) => Resolution::Split {
            service,
            structural,
        },
    }
}

fn resolve_category(
    defect_type: DefectType,
    candidate: Grade,
    authoritative: Option<Grade>,
) -> Option<ResolvedGrade> {
    if let Some(grade) = authoritative.filter(|g| g.is_defect()) {
        return Some(ResolvedGrade {
            defect_type,
            grade,
            source: GradeSource::Statistics,
        });
    }
    candidate.is_defect().then_some(ResolvedGrade {
        defect_type,
        grade: candidate,
        source: GradeSource::Classifier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(v: u8) -> Grade {
        Grade::new(v).unwrap()
    }

    fn candidates(service: u8, structural: u8) -> CandidateGrades {
        CandidateGrades {
            service: g(service),
            structural: g(structural),
        }
    }

    #[test]
    fn test_statistics_grade_wins() {
        let stats = AuthoritativeGrades {
            service: Some(g(2)),
            structural: None,
        };
        let resolution = resolve_grades(candidates(4, 0), Some(&stats));
        assert_eq!(
            resolution,
            Resolution::Single(ResolvedGrade {
                defect_type: DefectType::Service,
                grade: g(2),
                source: GradeSource::Statistics,
            })
        );
    }

    #[test]
    fn test_zero_statistics_falls_back_to_classifier() {
        let stats = AuthoritativeGrades {
            service: Some(g(0)),
            structural: Some(g(0)),
        };
        let resolution = resolve_grades(candidates(0, 3), Some(&stats));
        let structural = resolution.structural().unwrap();
        assert_eq!(structural.grade, g(3));
        assert_eq!(structural.source, GradeSource::Classifier);
        assert!(resolution.service().is_none());
    }

    #[test]
    fn test_nothing_graded_is_observation_only() {
        assert_eq!(
            resolve_grades(candidates(0, 0), None),
            Resolution::ObservationOnly
        );
        let stats = AuthoritativeGrades::default();
        assert_eq!(
            resolve_grades(candidates(0, 0), Some(&stats)),
            Resolution::ObservationOnly
        );
    }

    #[test]
    fn test_both_categories_split() {
        let stats = AuthoritativeGrades {
            service: Some(g(3)),
            structural: Some(g(4)),
        };
        match resolve_grades(candidates(1, 1), Some(&stats)) {
            Resolution::Split {
                service,
                structural,
            } => {
                assert_eq!(service.grade, g(3));
                assert_eq!(structural.grade, g(4));
                assert_eq!(service.source, GradeSource::Statistics);
            }
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn test_mixed_sources_split() {
        let stats = AuthoritativeGrades {
            service: None,
            structural: Some(g(2)),
        };
        match resolve_grades(candidates(3, 5), Some(&stats)) {
            Resolution::Split {
                service,
                structural,
            } => {
                assert_eq!(service.source, GradeSource::Classifier);
                assert_eq!(structural.source, GradeSource::Statistics);
                assert_eq!(structural.grade, g(2));
            }
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn test_adoptability_thresholds() {
        assert!(resolve_grades(candidates(3, 2), None).is_adoptable());
        assert!(!resolve_grades(candidates(4, 0), None).is_adoptable());
        assert!(!resolve_grades(candidates(0, 3), None).is_adoptable());
        assert!(Resolution::ObservationOnly.is_adoptable());
    }
}
