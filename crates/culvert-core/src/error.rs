use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    #[error("survey source '{source_name}' is unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("survey export schema mismatch: {}", describe_missing(.table, .column.as_deref()))]
    SchemaMismatch {
        table: String,
        column: Option<String>,
    },

    #[error("failed to load defect code table from {path}: {reason}")]
    CodeTableLoad { path: PathBuf, reason: String },

    #[error("invalid defect code table: {0}")]
    CodeTableInvalid(String),

    #[error("invalid pricing configuration: {0}")]
    ConfigInvalid(String),

    #[error("unknown preset '{name}'. Available: {available}")]
    UnknownPreset { name: String, available: String },

    #[error("invalid number '{input}': {reason}")]
    InvalidNumber { input: String, reason: String },

    #[error("store error: {0}")]
    Store(String),

    #[error("cannot reprice upload '{upload_id}': {reason}; retry once it settles")]
    RepriceConflict { upload_id: String, reason: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn describe_missing(table: &str, column: Option<&str>) -> String {
    match column {
        Some(column) => format!("table '{table}' has no column '{column}'"),
        None => format!("table '{table}' not found"),
    }
}

impl SurveyError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        SurveyError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_table(table: &str) -> Self {
        SurveyError::SchemaMismatch {
            table: table.to_string(),
            column: None,
        }
    }

    pub fn missing_column(table: &str, column: &str) -> Self {
        SurveyError::SchemaMismatch {
            table: table.to_string(),
            column: Some(column.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_names_missing_identifier() {
        let err = SurveyError::missing_column("SECOBS", "OBS_OpCode");
        assert_eq!(
            err.to_string(),
            "survey export schema mismatch: table 'SECOBS' has no column 'OBS_OpCode'"
        );

        let err = SurveyError::missing_table("SECSTAT");
        assert!(err.to_string().contains("table 'SECSTAT' not found"));
    }

    #[test]
    fn reprice_conflict_names_upload() {
        let err = SurveyError::RepriceConflict {
            upload_id: "u7".into(),
            reason: "a processing run is in flight".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot reprice upload 'u7': a processing run is in flight; retry once it settles"
        );
    }
}
