//! Export of patient records.

mod records;

pub use records::*;
