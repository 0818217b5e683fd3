use crate::error::SurveyError;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a free-form numeric string from an export or a hand-edited
/// configuration into a Decimal.
///
/// Handles formats like:
/// - "34.31" -> 34.31
/// - "  33 " -> 33
/// - "£1,250.00" -> 1250.00 (currency symbol, thousands separator)
/// - "1 250,5" -> 1250.5 (space grouping, decimal comma)
/// - "33m", "150 mm", "25%" -> 33, 150, 25 (trailing unit)
/// - "", "-", "n/a" -> None
pub fn parse_number(s: &str) -> Result<Option<Decimal>, SurveyError> {
    let s = s.trim();

    if s.is_empty() || s == "-" || s == "—" || s.eq_ignore_ascii_case("n/a") {
        return Ok(None);
    }

    let body = s
        .trim_start_matches(['£', '$', '€'])
        .trim_end_matches(|c: char| c.is_alphabetic() || c == '%' || c.is_whitespace())
        .trim();

    let compact: String = body
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '\'')
        .collect();

    let normalized = normalize_separators(&compact);
    Decimal::from_str(&normalized)
        .map(Some)
        .map_err(|e| SurveyError::InvalidNumber {
            input: s.to_string(),
            reason: e.to_string(),
        })
}

/// Resolve ',' as either a thousands separator or a decimal comma.
///
/// Both separators present: ',' groups thousands. Only ',' present: it groups
/// thousands when every group after the first has exactly three digits,
/// otherwise it is a decimal comma.
fn normalize_separators(s: &str) -> String {
    if !s.contains(',') {
        return s.to_string();
    }
    if s.contains('.') {
        return s.replace(',', "");
    }

    let groups: Vec<&str> = s.split(',').collect();
    let thousands = groups.len() > 1
        && !groups[0].is_empty()
        && groups[1..]
            .iter()
            .all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()));

    if thousands {
        s.replace(',', "")
    } else {
        s.replacen(',', ".", 1)
    }
}

/// Convert f64 to Decimal, preserving reasonable precision.
///
/// Uses string round-trip to avoid floating-point artifacts
/// (e.g., 0.0035_f64 becoming 0.00349999...).
pub fn f64_to_decimal(f: f64) -> Option<Decimal> {
    if !f.is_finite() {
        return None;
    }
    let s = format!("{f}");
    s.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::try_from(f).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_plain_decimal() {
        assert_eq!(parse_number("34.31").unwrap(), Some(dec!(34.31)));
    }

    #[test]
    fn test_whitespace_trimming() {
        assert_eq!(parse_number("  33  ").unwrap(), Some(dec!(33)));
    }

    #[test]
    fn test_currency_and_thousands() {
        assert_eq!(parse_number("£1,250.00").unwrap(), Some(dec!(1250.00)));
        assert_eq!(parse_number("1,250").unwrap(), Some(dec!(1250)));
        assert_eq!(parse_number("€ 12,500,000").unwrap(), Some(dec!(12500000)));
    }

    #[test]
    fn test_decimal_comma() {
        assert_eq!(parse_number("0,5").unwrap(), Some(dec!(0.5)));
        assert_eq!(parse_number("1 250,5").unwrap(), Some(dec!(1250.5)));
    }

    #[test]
    fn test_trailing_units() {
        assert_eq!(parse_number("33m").unwrap(), Some(dec!(33)));
        assert_eq!(parse_number("150 mm").unwrap(), Some(dec!(150)));
        assert_eq!(parse_number("25%").unwrap(), Some(dec!(25)));
    }

    #[test]
    fn test_empty_markers_return_none() {
        assert!(parse_number("").unwrap().is_none());
        assert!(parse_number("-").unwrap().is_none());
        assert!(parse_number("N/A").unwrap().is_none());
    }

    #[test]
    fn test_invalid_returns_error() {
        assert!(parse_number("abc").is_err());
        assert!(parse_number("12..5").is_err());
    }

    #[test]
    fn f64_to_decimal_preserves_precision() {
        assert_eq!(f64_to_decimal(0.0035), Some(dec!(0.0035)));
        assert_eq!(f64_to_decimal(68.0), Some(dec!(68)));
        assert_eq!(f64_to_decimal(34.31), Some(dec!(34.31)));
        assert_eq!(f64_to_decimal(f64::NAN), None);
    }
}
