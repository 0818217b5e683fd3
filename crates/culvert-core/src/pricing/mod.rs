pub mod config;
pub mod store;

pub use config::{
    load_pricing, parse_pricing_str, validate_pricing, ComparisonAttribute, Operator,
    PricingConfiguration, RangeRule, RawPricingConfiguration, VehicleTravel,
};
pub use store::{PricingStore, PricingVersionInfo};

use crate::model::{ItemNo, SectionRecord};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub const UNMATCHED: &str = "unmatched";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostStatus {
    Priced,
    /// Comparison value fell outside every enabled range.
    Unmatched,
    /// Section has no value for the comparison attribute.
    MissingValue,
    /// Arithmetic overflowed while applying the operator or travel add-on.
    Overflow,
}

/// Cost of one record under one configuration version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostResult {
    pub item: ItemNo,
    pub section_key: String,
    /// Label of the matched range, or `unmatched`.
    pub rule: String,
    pub status: CostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_value: Option<Decimal>,
    /// Never zero-filled: `None` whenever no range applied.
    pub cost: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel: Option<Decimal>,
    pub config_version: u32,
}

impl CostResult {
    pub fn is_priced(&self) -> bool {
        self.status == CostStatus::Priced
    }
}

/// An input value no enabled range covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationGap {
    pub item: ItemNo,
    pub section_key: String,
    pub comparison: ComparisonAttribute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_value: Option<Decimal>,
    pub status: CostStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingReport {
    pub config_name: String,
    pub config_version: u32,
    pub results: Vec<CostResult>,
    pub gaps: Vec<ConfigurationGap>,
    /// Sum of priced results. `None` if the sum overflows.
    pub total: Option<Decimal>,
}

/// Numeric interval left uncovered between enabled ranges, exclusive at
/// both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeGap {
    pub after: String,
    pub before: String,
    pub from: Decimal,
    pub to: Decimal,
}

/// Two enabled ranges sharing values; the one declared first wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeOverlap {
    pub winner: String,
    pub shadowed: String,
}

/// Price one record.
///
/// The first enabled range containing the comparison value wins. The travel
/// add-on is charged once per physical section, so the suffixed half of a
/// split record never carries it.
pub fn evaluate(record: &SectionRecord, config: &PricingConfiguration) -> CostResult {
    let comparison_value = match config.comparison {
        ComparisonAttribute::Length => record.costing_length(),
        ComparisonAttribute::Diameter => record.diameter_mm,
    };

    let base = CostResult {
        item: record.item.clone(),
        section_key: record.section_key.clone(),
        rule: UNMATCHED.to_string(),
        status: CostStatus::MissingValue,
        comparison_value,
        cost: None,
        travel: None,
        config_version: config.version,
    };

    let Some(value) = comparison_value else {
        return base;
    };

    let Some((rule, price)) = config.enabled_rules().find(|(rule, _)| rule.contains(value)) else {
        return CostResult {
            status: CostStatus::Unmatched,
            ..base
        };
    };

    let rule = rule.label.clone();
    let strategy = RoundingStrategy::MidpointAwayFromZero;
    let priced = config
        .operator
        .apply(price, config.operand)
        .map(|c| c.round_dp_with_strategy(config.rounding_dp, strategy));

    let travel = if record.is_split_part() {
        Some(Decimal::ZERO)
    } else {
        config
            .travel_add_on()
            .map(|t| t.round_dp_with_strategy(config.rounding_dp, strategy))
    };

    match (priced, travel) {
        (Some(cost), Some(travel)) => match cost.checked_add(travel) {
            Some(total) => CostResult {
                rule,
                status: CostStatus::Priced,
                cost: Some(total),
                travel: (!travel.is_zero()).then_some(travel),
                ..base
            },
            None => overflowed(base, rule),
        },
        _ => overflowed(base, rule),
    }
}

fn overflowed(base: CostResult, rule: String) -> CostResult {
    tracing::warn!(
        item = %base.item,
        rule = %rule,
        "cost arithmetic overflowed"
    );
    CostResult {
        rule,
        status: CostStatus::Overflow,
        ..base
    }
}

/// Price every record of an upload and list the inputs no range covered.
pub fn evaluate_upload(records: &[SectionRecord], config: &PricingConfiguration) -> PricingReport {
    let results: Vec<CostResult> = records.iter().map(|r| evaluate(r, config)).collect();

    let gaps: Vec<ConfigurationGap> = results
        .iter()
        .filter(|r| matches!(r.status, CostStatus::Unmatched | CostStatus::MissingValue))
        .map(|r| ConfigurationGap {
            item: r.item.clone(),
            section_key: r.section_key.clone(),
            comparison: config.comparison,
            comparison_value: r.comparison_value,
            status: r.status,
        })
        .collect();

    for gap in &gaps {
        tracing::warn!(
            item = %gap.item,
            value = ?gap.comparison_value,
            "no pricing range applies"
        );
    }

    let total = results
        .iter()
        .filter_map(|r| r.cost)
        .try_fold(Decimal::ZERO, |acc, c| acc.checked_add(c));

    tracing::debug!(
        config = %config.name,
        version = config.version,
        priced = results.iter().filter(|r| r.is_priced()).count(),
        gaps = gaps.len(),
        "pricing evaluated"
    );

    PricingReport {
        config_name: config.name.clone(),
        config_version: config.version,
        results,
        gaps,
        total,
    }
}

/// Intervals between enabled ranges that no range covers.
pub fn find_gaps(config: &PricingConfiguration) -> Vec<RangeGap> {
    let mut enabled: Vec<&RangeRule> = config.ranges.iter().filter(|r| r.enabled).collect();
    enabled.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end)));

    let mut gaps = Vec::new();
    let Some(first) = enabled.first() else {
        return gaps;
    };
    let mut covered_end = first.end;
    let mut last_label = first.label.clone();

    for rule in enabled.iter().skip(1) {
        if rule.start > covered_end {
            gaps.push(RangeGap {
                after: last_label.clone(),
                before: rule.label.clone(),
                from: covered_end,
                to: rule.start,
            });
        }
        if rule.end > covered_end {
            covered_end = rule.end;
            last_label = rule.label.clone();
        }
    }
    gaps
}

/// Pairs of enabled ranges that overlap, in declared order.
pub fn find_overlaps(config: &PricingConfiguration) -> Vec<RangeOverlap> {
    let enabled: Vec<&RangeRule> = config.ranges.iter().filter(|r| r.enabled).collect();
    let mut overlaps = Vec::new();
    for (i, a) in enabled.iter().enumerate() {
        for b in &enabled[i + 1..] {
            if a.start <= b.end && b.start <= a.end {
                overlaps.push(RangeOverlap {
                    winner: a.label.clone(),
                    shadowed: b.label.clone(),
                });
            }
        }
    }
    overlaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefectType, FlowDirection, Grade, GradeSource};
    use rust_decimal_macros::dec;

    fn record(item: ItemNo, length: Option<Decimal>) -> SectionRecord {
        SectionRecord {
            item,
            section_key: "S1".into(),
            start_node: "A".into(),
            finish_node: "B".into(),
            direction: FlowDirection::Downstream,
            diameter_mm: Some(dec!(225)),
            material: None,
            surveyed_length: length,
            total_length: None,
            observations: Vec::new(),
            defect_type: DefectType::ObservationOnly,
            grade: Grade::NONE,
            grade_source: GradeSource::None,
            defect_codes: Vec::new(),
            recommendation: String::new(),
            catalog_ref: None,
            adoptable: true,
            flags: Vec::new(),
        }
    }

    fn rule(label: &str, start: Decimal, end: Decimal) -> RangeRule {
        RangeRule {
            label: label.into(),
            start,
            end,
            enabled: true,
        }
    }

    fn config(ranges: Vec<RangeRule>, values: Vec<Decimal>) -> PricingConfiguration {
        PricingConfiguration {
            version: 3,
            name: "Test".into(),
            comparison: ComparisonAttribute::Length,
            ranges,
            values,
            operator: Operator::Multiply,
            operand: Decimal::ONE,
            vehicle_travel: Vec::new(),
            rounding_dp: 2,
        }
    }

    fn two_band() -> PricingConfiguration {
        config(
            vec![rule("A", dec!(0), dec!(33)), rule("B", dec!(34), dec!(66))],
            vec![dec!(100), dec!(200)],
        )
    }

    #[test]
    fn test_length_matches_second_range() {
        let result = evaluate(&record(ItemNo::new(1), Some(dec!(34.31))), &two_band());
        assert_eq!(result.rule, "B");
        assert_eq!(result.cost, Some(dec!(200)));
        assert_eq!(result.config_version, 3);
    }

    #[test]
    fn test_gap_value_is_unmatched_not_zero() {
        let result = evaluate(&record(ItemNo::new(1), Some(dec!(33.5))), &two_band());
        assert_eq!(result.rule, UNMATCHED);
        assert_eq!(result.status, CostStatus::Unmatched);
        assert_eq!(result.cost, None);
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let cfg = two_band();
        assert_eq!(evaluate(&record(ItemNo::new(1), Some(dec!(33))), &cfg).rule, "A");
        assert_eq!(evaluate(&record(ItemNo::new(1), Some(dec!(0))), &cfg).rule, "A");
        assert_eq!(evaluate(&record(ItemNo::new(1), Some(dec!(66))), &cfg).rule, "B");
    }

    #[test]
    fn test_first_match_wins_on_overlap() {
        let cfg = config(
            vec![rule("wide", dec!(0), dec!(100)), rule("narrow", dec!(10), dec!(20))],
            vec![dec!(50), dec!(75)],
        );
        let result = evaluate(&record(ItemNo::new(1), Some(dec!(15))), &cfg);
        assert_eq!(result.rule, "wide");
        assert_eq!(
            find_overlaps(&cfg),
            vec![RangeOverlap {
                winner: "wide".into(),
                shadowed: "narrow".into()
            }]
        );
    }

    #[test]
    fn test_disabled_rule_is_skipped() {
        let mut cfg = two_band();
        cfg.ranges[1].enabled = false;
        let result = evaluate(&record(ItemNo::new(1), Some(dec!(40))), &cfg);
        assert_eq!(result.status, CostStatus::Unmatched);
    }

    #[test]
    fn test_missing_value_is_unmatched() {
        let result = evaluate(&record(ItemNo::new(1), None), &two_band());
        assert_eq!(result.status, CostStatus::MissingValue);
        assert_eq!(result.rule, UNMATCHED);
        assert_eq!(result.cost, None);
    }

    #[test]
    fn test_operator_and_rounding() {
        let mut cfg = two_band();
        cfg.operator = Operator::Divide;
        cfg.operand = dec!(3);
        let result = evaluate(&record(ItemNo::new(1), Some(dec!(10))), &cfg);
        assert_eq!(result.cost, Some(dec!(33.33)));
    }

    #[test]
    fn test_travel_added_once_per_split_section() {
        let mut cfg = two_band();
        cfg.vehicle_travel = vec![
            VehicleTravel {
                vehicle: "Jet-vac".into(),
                hourly_rate: dec!(85),
                hours: dec!(1.5),
                enabled: true,
            },
            VehicleTravel {
                vehicle: "Van".into(),
                hourly_rate: dec!(40),
                hours: dec!(2),
                enabled: false,
            },
        ];
        let service = evaluate(&record(ItemNo::new(7), Some(dec!(20))), &cfg);
        let structural = evaluate(&record(ItemNo::with_suffix(7, 'a'), Some(dec!(20))), &cfg);
        assert_eq!(service.cost, Some(dec!(227.50)));
        assert_eq!(service.travel, Some(dec!(127.50)));
        assert_eq!(structural.cost, Some(dec!(100)));
        assert_eq!(structural.travel, None);
    }

    #[test]
    fn test_diameter_comparison() {
        let mut cfg = config(
            vec![rule("small", dec!(100), dec!(150)), rule("large", dec!(151), dec!(300))],
            vec![dec!(80), dec!(120)],
        );
        cfg.comparison = ComparisonAttribute::Diameter;
        let result = evaluate(&record(ItemNo::new(1), Some(dec!(5))), &cfg);
        assert_eq!(result.rule, "large");
    }

    #[test]
    fn test_overflow_reports_status() {
        let mut cfg = two_band();
        cfg.values = vec![Decimal::MAX, Decimal::MAX];
        cfg.operand = dec!(2);
        let result = evaluate(&record(ItemNo::new(1), Some(dec!(1))), &cfg);
        assert_eq!(result.status, CostStatus::Overflow);
        assert_eq!(result.cost, None);
    }

    #[test]
    fn test_upload_report_lists_gaps() {
        let records = vec![
            record(ItemNo::new(1), Some(dec!(34.31))),
            record(ItemNo::new(2), Some(dec!(33.5))),
            record(ItemNo::new(3), Some(dec!(10))),
        ];
        let report = evaluate_upload(&records, &two_band());
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].item, ItemNo::new(2));
        assert_eq!(report.total, Some(dec!(300)));
    }

    #[test]
    fn test_find_gaps_between_ranges() {
        let gaps = find_gaps(&two_band());
        assert_eq!(
            gaps,
            vec![RangeGap {
                after: "A".into(),
                before: "B".into(),
                from: dec!(33),
                to: dec!(34),
            }]
        );

        let contiguous = config(
            vec![rule("A", dec!(0), dec!(50)), rule("B", dec!(40), dec!(66))],
            vec![dec!(1), dec!(2)],
        );
        assert!(find_gaps(&contiguous).is_empty());
    }
}
