//! Parsing for the raw call-count file written by the instrumentation hooks.

pub mod parse;
pub mod row;

pub use parse::{parse_line, read_samples};
pub use row::{Address, Sample};
