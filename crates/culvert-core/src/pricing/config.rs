use crate::error::SurveyError;
use crate::parsing::{f64_to_decimal, parse_number};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DEFAULT_ROUNDING_DP: u32 = 2;
pub const MAX_ROUNDING_DP: u32 = 10;

/// Section attribute compared against the range rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonAttribute {
    /// Surveyed length, falling back to the asset's total length.
    Length,
    Diameter,
}

impl fmt::Display for ComparisonAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonAttribute::Length => write!(f, "length"),
            ComparisonAttribute::Diameter => write!(f, "diameter"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Divide,
    Multiply,
    Add,
    Subtract,
}

impl Operator {
    /// Apply `value op operand`. `None` on overflow or division by zero.
    pub fn apply(self, value: Decimal, operand: Decimal) -> Option<Decimal> {
        match self {
            Operator::Divide => value.checked_div(operand),
            Operator::Multiply => value.checked_mul(operand),
            Operator::Add => value.checked_add(operand),
            Operator::Subtract => value.checked_sub(operand),
        }
    }

    fn parse(s: &str) -> Option<Operator> {
        match s.trim().to_lowercase().as_str() {
            "/" | "divide" | "div" => Some(Operator::Divide),
            "*" | "x" | "multiply" | "mul" | "times" => Some(Operator::Multiply),
            "+" | "add" | "plus" => Some(Operator::Add),
            "-" | "subtract" | "sub" | "minus" => Some(Operator::Subtract),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Divide => "/",
            Operator::Multiply => "*",
            Operator::Add => "+",
            Operator::Subtract => "-",
        };
        write!(f, "{symbol}")
    }
}

/// Inclusive `[start, end]` range with a label shown on the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRule {
    pub label: String,
    pub start: Decimal,
    pub end: Decimal,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

impl RangeRule {
    pub fn contains(&self, value: Decimal) -> bool {
        self.start <= value && value <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleTravel {
    pub vehicle: String,
    pub hourly_rate: Decimal,
    pub hours: Decimal,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

/// A validated, versioned pricing rule set.
///
/// `values[i]` is the price for `ranges[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfiguration {
    /// Assigned by the configuration store. 0 for unsaved configurations.
    #[serde(default)]
    pub version: u32,
    pub name: String,
    pub comparison: ComparisonAttribute,
    pub ranges: Vec<RangeRule>,
    pub values: Vec<Decimal>,
    pub operator: Operator,
    pub operand: Decimal,
    #[serde(default)]
    pub vehicle_travel: Vec<VehicleTravel>,
    #[serde(default = "rounding_default")]
    pub rounding_dp: u32,
}

fn enabled_default() -> bool {
    true
}

fn rounding_default() -> u32 {
    DEFAULT_ROUNDING_DP
}

impl PricingConfiguration {
    /// Enabled rules paired with their price, in declared order.
    pub fn enabled_rules(&self) -> impl Iterator<Item = (&RangeRule, Decimal)> {
        self.ranges
            .iter()
            .zip(self.values.iter().copied())
            .filter(|(rule, _)| rule.enabled)
    }

    /// Sum of enabled `hourly_rate * hours`. `None` on overflow.
    pub fn travel_add_on(&self) -> Option<Decimal> {
        self.vehicle_travel
            .iter()
            .filter(|v| v.enabled)
            .try_fold(Decimal::ZERO, |acc, v| {
                v.hourly_rate
                    .checked_mul(v.hours)
                    .and_then(|t| acc.checked_add(t))
            })
    }
}

/// Check the structural invariants of a pricing configuration.
pub fn validate_pricing(config: &PricingConfiguration) -> Result<(), SurveyError> {
    if config.name.trim().is_empty() {
        return Err(SurveyError::ConfigInvalid("name must not be empty".into()));
    }

    if config.ranges.is_empty() {
        return Err(SurveyError::ConfigInvalid(
            "at least one range rule is required".into(),
        ));
    }

    if config.ranges.len() != config.values.len() {
        return Err(SurveyError::ConfigInvalid(format!(
            "{} range rules but {} pricing values",
            config.ranges.len(),
            config.values.len()
        )));
    }

    for (idx, (rule, value)) in config.ranges.iter().zip(&config.values).enumerate() {
        if rule.label.trim().is_empty() {
            return Err(SurveyError::ConfigInvalid(format!(
                "range rule {} has an empty label",
                idx + 1
            )));
        }
        if rule.start.is_sign_negative() || rule.end.is_sign_negative() {
            return Err(SurveyError::ConfigInvalid(format!(
                "range '{}' has a negative bound",
                rule.label
            )));
        }
        if rule.start > rule.end {
            return Err(SurveyError::ConfigInvalid(format!(
                "range '{}' starts at {} after its end {}",
                rule.label, rule.start, rule.end
            )));
        }
        if value.is_sign_negative() {
            return Err(SurveyError::ConfigInvalid(format!(
                "range '{}' has a negative price {}",
                rule.label, value
            )));
        }
    }

    if config.operator == Operator::Divide && config.operand.is_zero() {
        return Err(SurveyError::ConfigInvalid("divide operand must not be zero".into()));
    }

    for v in &config.vehicle_travel {
        if v.vehicle.trim().is_empty() {
            return Err(SurveyError::ConfigInvalid(
                "vehicle travel entry has an empty vehicle name".into(),
            ));
        }
        if v.hourly_rate.is_sign_negative() || v.hours.is_sign_negative() {
            return Err(SurveyError::ConfigInvalid(format!(
                "vehicle '{}' has a negative rate or hours",
                v.vehicle
            )));
        }
    }

    if config.rounding_dp > MAX_ROUNDING_DP {
        return Err(SurveyError::ConfigInvalid(format!(
            "rounding_dp {} exceeds {}",
            config.rounding_dp, MAX_ROUNDING_DP
        )));
    }

    Ok(())
}

/// A number as written by hand in a configuration file: JSON number or text
/// such as `"£1,250.00"` or `"33m"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LooseNumber {
    fn to_decimal(&self, field: &str) -> Result<Decimal, SurveyError> {
        let parsed = match self {
            LooseNumber::Int(i) => Some(Decimal::from(*i)),
            LooseNumber::Float(f) => f64_to_decimal(*f),
            LooseNumber::Text(s) => parse_number(s).map_err(|e| {
                SurveyError::ConfigInvalid(format!("{field}: {e}"))
            })?,
        };
        parsed.ok_or_else(|| SurveyError::ConfigInvalid(format!("{field}: value is missing")))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRangeRule {
    pub label: String,
    pub start: LooseNumber,
    pub end: LooseNumber,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawVehicleTravel {
    pub vehicle: String,
    pub hourly_rate: LooseNumber,
    pub hours: LooseNumber,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Authoring form of a pricing configuration. Normalized into
/// [`PricingConfiguration`] before it is stored or evaluated.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPricingConfiguration {
    #[serde(default)]
    pub version: Option<u32>,
    pub name: String,
    pub comparison: String,
    pub ranges: Vec<RawRangeRule>,
    pub values: Vec<LooseNumber>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub operand: Option<LooseNumber>,
    #[serde(default)]
    pub vehicle_travel: Vec<RawVehicleTravel>,
    #[serde(default)]
    pub rounding_dp: Option<u32>,
}

impl RawPricingConfiguration {
    /// Parse every loose number and validate the result.
    pub fn normalize(self) -> Result<PricingConfiguration, SurveyError> {
        let comparison = match self.comparison.trim().to_lowercase().as_str() {
            "length" | "len" | "surveyed_length" => ComparisonAttribute::Length,
            "diameter" | "size" | "dia" => ComparisonAttribute::Diameter,
            other => {
                return Err(SurveyError::ConfigInvalid(format!(
                    "unknown comparison attribute '{other}' (expected length or diameter)"
                )))
            }
        };

        let operator = match self.operator.as_deref() {
            None => Operator::Multiply,
            Some(op) => Operator::parse(op).ok_or_else(|| {
                SurveyError::ConfigInvalid(format!("unknown operator '{op}'"))
            })?,
        };

        let operand = match &self.operand {
            None => Decimal::ONE,
            Some(n) => n.to_decimal("operand")?,
        };

        let ranges = self
            .ranges
            .iter()
            .map(|r| {
                Ok(RangeRule {
                    label: r.label.trim().to_string(),
                    start: r.start.to_decimal(&format!("range '{}' start", r.label))?,
                    end: r.end.to_decimal(&format!("range '{}' end", r.label))?,
                    enabled: r.enabled.unwrap_or(true),
                })
            })
            .collect::<Result<Vec<_>, SurveyError>>()?;

        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| v.to_decimal(&format!("value {}", i + 1)))
            .collect::<Result<Vec<_>, SurveyError>>()?;

        let vehicle_travel = self
            .vehicle_travel
            .iter()
            .map(|v| {
                Ok(VehicleTravel {
                    vehicle: v.vehicle.trim().to_string(),
                    hourly_rate: v
                        .hourly_rate
                        .to_decimal(&format!("vehicle '{}' hourly_rate", v.vehicle))?,
                    hours: v.hours.to_decimal(&format!("vehicle '{}' hours", v.vehicle))?,
                    enabled: v.enabled.unwrap_or(true),
                })
            })
            .collect::<Result<Vec<_>, SurveyError>>()?;

        let config = PricingConfiguration {
            version: self.version.unwrap_or(0),
            name: self.name.trim().to_string(),
            comparison,
            ranges,
            values,
            operator,
            operand,
            vehicle_travel,
            rounding_dp: self.rounding_dp.unwrap_or(DEFAULT_ROUNDING_DP),
        };
        validate_pricing(&config)?;
        Ok(config)
    }
}

/// Parse and validate a pricing configuration from JSON. Accepts both the
/// strict form and the loose authoring form.
pub fn parse_pricing_str(json: &str) -> Result<PricingConfiguration, SurveyError> {
    let raw: RawPricingConfiguration = serde_json::from_str(json)
        .map_err(|e| SurveyError::ConfigInvalid(format!("malformed pricing JSON: {e}")))?;
    raw.normalize()
}

pub fn load_pricing(path: &Path) -> Result<PricingConfiguration, SurveyError> {
    let content = std::fs::read_to_string(path)?;
    parse_pricing_str(&content)
}
