pub mod engine;
pub mod outcome;

pub use engine::{classify, classify_section};
pub use outcome::{
    CategoryFinding, Classification, Contribution, ObservationKind, ObservationOutcome,
    SectionFindings,
};
