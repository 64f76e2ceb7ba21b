//! Report rendering: aligned text (file + colorized console) and JSON.

pub mod json;
pub mod severity;
pub mod text;

pub use json::{JsonReport, write_json_report};
pub use text::write_report;
