use crate::error::SurveyError;
use crate::rules::{compile_code_table, CodeTable};
use crate::rules::schema::CodeTableDef;
use std::sync::LazyLock;

const MSCC5_CODES_JSON: &str = include_str!("../../../../rules/defect-codes.json");

/// Available predefined code tables.
pub const PRESETS: &[&str] = &["mscc5"];

static MSCC5: LazyLock<CodeTable> = LazyLock::new(|| {
    let def: CodeTableDef =
        serde_json::from_str(MSCC5_CODES_JSON).expect("embedded defect-codes.json is valid");
    compile_code_table(def).expect("embedded defect-codes.json passes validation")
});

/// The default code table, compiled once per process.
pub fn default_table() -> &'static CodeTable {
    &MSCC5
}

/// Load a predefined code table by name.
pub fn load_preset(name: &str) -> Result<&'static CodeTable, SurveyError> {
    match name {
        "mscc5" => Ok(&MSCC5),
        _ => Err(SurveyError::UnknownPreset {
            name: name.to_string(),
            available: PRESETS.join(", "),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::schema::CodeCategory;

    #[test]
    fn test_load_mscc5_preset() {
        let table = load_preset("mscc5").unwrap();
        assert!(!table.definition().codes.is_empty());
        assert_eq!(table.lookup("DER").unwrap().category, CodeCategory::Service);
        assert_eq!(table.lookup("SC").unwrap().category, CodeCategory::Informational);
        assert!(table.is_failure_or_lining_marker("XP"));
        assert!(table.is_failure_or_lining_marker("RPP"));
    }

    #[test]
    fn test_unknown_preset() {
        assert!(load_preset("xyz").is_err());
    }
}
