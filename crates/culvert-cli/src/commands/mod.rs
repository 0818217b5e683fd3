pub mod codes;
pub mod pricing;
pub mod process;
