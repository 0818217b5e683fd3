//! Table and column names of the survey export.
//!
//! Names are matched case-insensitively. A missing required table or column is
//! a `SchemaMismatch`; optional columns read as null when absent.

pub struct TableSpec {
    pub name: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

pub mod col {
    pub const SECTION_KEY: &str = "OBJ_PK";
    pub const FROM_NODE: &str = "OBJ_FromNode";
    pub const TO_NODE: &str = "OBJ_ToNode";
    pub const SORT_ORDER: &str = "OBJ_SortOrder";
    pub const DELETED: &str = "OBJ_Deleted";
    pub const DIAMETER: &str = "OBJ_Size1";
    pub const MATERIAL: &str = "OBJ_Material";
    pub const LENGTH: &str = "OBJ_Length";

    pub const INSPECTION_KEY: &str = "INS_PK";
    pub const INSPECTION_SECTION: &str = "INS_Section_FK";
    pub const DIRECTION: &str = "INS_InspectionDir";
    pub const INSPECTED_LENGTH: &str = "INS_InspectedLength";

    pub const OBSERVATION_KEY: &str = "OBS_PK";
    pub const OBSERVATION_INSPECTION: &str = "OBS_Inspection_FK";
    pub const OP_CODE: &str = "OBS_OpCode";
    pub const DISTANCE: &str = "OBS_Distance";
    pub const NOTE: &str = "OBS_Observation";
    pub const PERCENT: &str = "OBS_Percent";

    pub const STATISTICS_SECTION: &str = "STA_Section_FK";
    pub const SERVICE_GRADE: &str = "STA_ServiceGrade";
    pub const STRUCTURAL_GRADE: &str = "STA_StructuralGrade";
}

pub const SECTION: TableSpec = TableSpec {
    name: "SECTION",
    required: &[col::SECTION_KEY, col::FROM_NODE, col::TO_NODE],
    optional: &[
        col::SORT_ORDER,
        col::DELETED,
        col::DIAMETER,
        col::MATERIAL,
        col::LENGTH,
    ],
};

pub const INSPECTION: TableSpec = TableSpec {
    name: "SECINSP",
    required: &[col::INSPECTION_KEY, col::INSPECTION_SECTION],
    optional: &[col::DIRECTION, col::INSPECTED_LENGTH],
};

pub const OBSERVATION: TableSpec = TableSpec {
    name: "SECOBS",
    required: &[col::OBSERVATION_KEY, col::OBSERVATION_INSPECTION, col::OP_CODE],
    optional: &[col::DISTANCE, col::NOTE, col::PERCENT],
};

pub const STATISTICS: TableSpec = TableSpec {
    name: "SECSTAT",
    required: &[col::STATISTICS_SECTION],
    optional: &[col::SERVICE_GRADE, col::STRUCTURAL_GRADE],
};

pub const ALL_TABLES: [&TableSpec; 4] = [&SECTION, &INSPECTION, &OBSERVATION, &STATISTICS];
