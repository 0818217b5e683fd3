pub mod values;

pub use values::{f64_to_decimal, parse_number};
