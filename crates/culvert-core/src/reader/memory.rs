use super::{RawTable, SurveySource};
use crate::error::SurveyError;

/// Tables already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    tables: Vec<RawTable>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        MemorySource {
            name: name.into(),
            tables: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: RawTable) -> Self {
        self.tables.push(table);
        self
    }
}

impl SurveySource for MemorySource {
    fn read_table(&self, name: &str) -> Result<RawTable, SurveyError> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| SurveyError::missing_table(name))
    }

    fn backend_name(&self) -> &str {
        &self.name
    }
}
