pub mod builtin;
pub mod schema;

use crate::error::SurveyError;
use crate::model::Grade;
use regex::Regex;
use rust_decimal::Decimal;
use schema::{CodeCategory, CodeDef, CodeTableDef};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A validated code table with note patterns compiled.
#[derive(Debug, Clone)]
pub struct CodeTable {
    def: CodeTableDef,
    entries: HashMap<String, CompiledCode>,
    failure_or_lining: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledCode {
    pub code: String,
    pub category: CodeCategory,
    pub grade: Grade,
    pub percent_graded: bool,
    pub description: Option<String>,
    pub patterns: Vec<CompiledPattern>,
}

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub regex: Regex,
    pub category: CodeCategory,
    pub grade: Grade,
    pub percent_graded: bool,
}

impl CodeTable {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn version(&self) -> &str {
        &self.def.version
    }

    pub fn definition(&self) -> &CodeTableDef {
        &self.def
    }

    /// Look up an operation code, ignoring case and surrounding whitespace.
    pub fn lookup(&self, code: &str) -> Option<&CompiledCode> {
        self.entries.get(&code.trim().to_uppercase())
    }

    /// True if the code is a structural-failure or lining/patching marker.
    pub fn is_failure_or_lining_marker(&self, code: &str) -> bool {
        self.failure_or_lining.contains(&code.trim().to_uppercase())
    }

    /// Grade for an area-loss percentage using the table's bands.
    pub fn grade_for_percent(&self, percent: Decimal) -> Grade {
        self.def
            .percent_bands
            .iter()
            .find(|band| percent <= band.max)
            .map(|band| band.grade)
            .unwrap_or(self.def.percent_fallback_grade)
    }
}

/// Load a code table from a JSON file.
pub fn load_code_table(path: &Path) -> Result<CodeTable, SurveyError> {
    let content = std::fs::read_to_string(path).map_err(|e| SurveyError::CodeTableLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let def: CodeTableDef =
        serde_json::from_str(&content).map_err(|e| SurveyError::CodeTableLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    compile_code_table(def)
}

/// Parse a code table from a JSON string (no file path context).
pub fn parse_code_table_str(json: &str) -> Result<CodeTable, SurveyError> {
    let def: CodeTableDef = serde_json::from_str(json).map_err(SurveyError::Json)?;
    compile_code_table(def)
}

/// Validate a code table definition and compile its patterns.
pub fn compile_code_table(def: CodeTableDef) -> Result<CodeTable, SurveyError> {
    validate_code_table(&def)?;

    let mut entries = HashMap::new();
    for code in &def.codes {
        let compiled = compile_code(code)?;
        entries.insert(compiled.code.clone(), compiled);
    }

    let failure_or_lining = def
        .structural_failure_codes
        .iter()
        .chain(def.lining_codes.iter())
        .map(|c| c.trim().to_uppercase())
        .collect();

    Ok(CodeTable {
        def,
        entries,
        failure_or_lining,
    })
}

fn compile_code(code: &CodeDef) -> Result<CompiledCode, SurveyError> {
    let mut patterns = Vec::with_capacity(code.patterns.len());
    for p in &code.patterns {
        let regex = Regex::new(&p.pattern).map_err(|e| {
            SurveyError::CodeTableInvalid(format!(
                "code '{}' has invalid pattern '{}': {}",
                code.code, p.pattern, e
            ))
        })?;
        patterns.push(CompiledPattern {
            regex,
            category: p.category,
            grade: p.grade,
            percent_graded: p.percent_graded,
        });
    }

    Ok(CompiledCode {
        code: code.code.trim().to_uppercase(),
        category: code.category,
        grade: code.grade,
        percent_graded: code.percent_graded,
        description: code.description.clone(),
        patterns,
    })
}

/// Validate that a code table is well-formed.
pub fn validate_code_table(def: &CodeTableDef) -> Result<(), SurveyError> {
    if def.codes.is_empty() {
        return Err(SurveyError::CodeTableInvalid("codes must not be empty".into()));
    }

    if def.percent_bands.is_empty() {
        return Err(SurveyError::CodeTableInvalid(
            "percent_bands must not be empty".into(),
        ));
    }

    for pair in def.percent_bands.windows(2) {
        if pair[1].max <= pair[0].max {
            return Err(SurveyError::CodeTableInvalid(format!(
                "percent_bands must be strictly ascending ({} follows {})",
                pair[1].max, pair[0].max
            )));
        }
        if pair[1].grade < pair[0].grade {
            return Err(SurveyError::CodeTableInvalid(format!(
                "percent band grades must not decrease ({} follows {})",
                pair[1].grade, pair[0].grade
            )));
        }
    }

    let mut seen = HashSet::new();
    for code in &def.codes {
        let key = code.code.trim().to_uppercase();
        if key.is_empty() {
            return Err(SurveyError::CodeTableInvalid(
                "code must not be empty".into(),
            ));
        }
        if !seen.insert(key.clone()) {
            return Err(SurveyError::CodeTableInvalid(format!(
                "code '{}' is defined more than once",
                key
            )));
        }
        if code.percent_graded && code.category == CodeCategory::Informational {
            return Err(SurveyError::CodeTableInvalid(format!(
                "informational code '{}' cannot be percent graded",
                key
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MINIMAL: &str = r#"{
        "name": "Test",
        "version": "1.0",
        "percent_bands": [{ "max": "5", "grade": 1 }, { "max": "15", "grade": 2 }],
        "percent_fallback_grade": 4,
        "structural_failure_codes": ["b"],
        "codes": [
            { "code": "der", "category": "service", "grade": 2, "percent_graded": true },
            { "code": "B", "category": "structural", "grade": 4 }
        ]
    }"#;

    #[test]
    fn test_parse_valid_table() {
        let table = parse_code_table_str(MINIMAL).unwrap();
        assert_eq!(table.name(), "Test");
        let der = table.lookup(" Der ").unwrap();
        assert_eq!(der.category, CodeCategory::Service);
        assert!(der.percent_graded);
        assert!(table.is_failure_or_lining_marker("B"));
        assert!(!table.is_failure_or_lining_marker("DER"));
    }

    #[test]
    fn test_percent_bands() {
        let table = parse_code_table_str(MINIMAL).unwrap();
        assert_eq!(table.grade_for_percent(dec!(5)), Grade::new(1).unwrap());
        assert_eq!(table.grade_for_percent(dec!(5.01)), Grade::new(2).unwrap());
        assert_eq!(table.grade_for_percent(dec!(80)), Grade::new(4).unwrap());
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let json = r#"{
            "name": "Bad", "version": "1",
            "percent_bands": [{ "max": "5", "grade": 1 }],
            "percent_fallback_grade": 4,
            "codes": [
                { "code": "B", "category": "structural", "grade": 4 },
                { "code": "b", "category": "structural", "grade": 3 }
            ]
        }"#;
        assert!(parse_code_table_str(json).is_err());
    }

    #[test]
    fn test_descending_bands_rejected() {
        let json = r#"{
            "name": "Bad", "version": "1",
            "percent_bands": [{ "max": "15", "grade": 2 }, { "max": "5", "grade": 1 }],
            "percent_fallback_grade": 4,
            "codes": [{ "code": "B", "category": "structural", "grade": 4 }]
        }"#;
        assert!(parse_code_table_str(json).is_err());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let json = r#"{
            "name": "Bad", "version": "1",
            "percent_bands": [{ "max": "5", "grade": 1 }],
            "percent_fallback_grade": 4,
            "codes": [{
                "code": "OB", "category": "service", "grade": 3,
                "patterns": [{ "pattern": "(unclosed", "category": "structural", "grade": 2 }]
            }]
        }"#;
        match parse_code_table_str(json) {
            Err(SurveyError::CodeTableInvalid(msg)) => assert!(msg.contains("OB")),
            other => panic!("expected invalid table, got {other:?}"),
        }
    }

    #[test]
    fn test_grade_out_of_range_rejected() {
        let json = r#"{
            "name": "Bad", "version": "1",
            "percent_bands": [{ "max": "5", "grade": 1 }],
            "percent_fallback_grade": 4,
            "codes": [{ "code": "B", "category": "structural", "grade": 6 }]
        }"#;
        assert!(parse_code_table_str(json).is_err());
    }
}
