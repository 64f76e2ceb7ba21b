//! Severity tiers for call counts relative to the busiest row of a partition.

use colored::{ColoredString, Colorize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    High,
    Mid,
    Low,
}

impl Severity {
    /// `count / max_count` above 0.66 is high, above 0.33 mid, else low.
    /// A zero `max_count` is always low.
    pub fn classify(count: u64, max_count: u64) -> Self {
        let ratio = if max_count > 0 {
            count as f64 / max_count as f64
        } else {
            0.0
        };

        if ratio > 0.66 {
            Severity::High
        } else if ratio > 0.33 {
            Severity::Mid
        } else {
            Severity::Low
        }
    }

    pub fn paint(self, count: u64) -> ColoredString {
        let text = count.to_string();
        match self {
            Severity::High => text.bright_red(),
            Severity::Mid => text.bright_yellow(),
            Severity::Low => text.bright_green(),
        }
    }
}
