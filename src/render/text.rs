use crate::model::PartitionReport;
use crate::render::severity::Severity;

use std::io::Write;

const FUNCTION_HEADER: &str = "Function";
const LOCATION_HEADER: &str = "File:Line";
const COUNT_HEADER: &str = "Call Count";

/// Column widths of one partition; never narrower than the header labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Widths {
    pub function: usize,
    pub location: usize,
}

impl Widths {
    pub fn of(report: &PartitionReport) -> Self {
        Self {
            function: column_width(report.rows.iter().map(|r| r.function.as_str()), FUNCTION_HEADER),
            location: column_width(report.rows.iter().map(|r| r.location.as_str()), LOCATION_HEADER),
        }
    }
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, header: &str) -> usize {
    values
        .map(|v| v.chars().count())
        .max()
        .unwrap_or(0)
        .max(header.chars().count())
}

/// Write every partition to the report file and, colorized, to the console.
///
/// Any write error on either sink aborts the report.
pub fn write_report<F: Write, C: Write>(
    file: &mut F,
    console: &mut C,
    reports: &[PartitionReport],
) -> std::io::Result<()> {
    for report in reports {
        let title = format!("=== Thread {} ===", report.label);
        writeln!(console, "{}", title)?;
        writeln!(file, "{}", title)?;

        if report.rows.is_empty() {
            continue;
        }

        let w = Widths::of(report);
        let header = format!(
            "{:<fw$}  {:<lw$}  {}",
            FUNCTION_HEADER,
            LOCATION_HEADER,
            COUNT_HEADER,
            fw = w.function,
            lw = w.location
        );
        writeln!(console, "{}", header)?;
        writeln!(file, "{}", header)?;

        for row in &report.rows {
            let lead = format!(
                "{:<fw$}  {:<lw$}  ",
                row.function,
                row.location,
                fw = w.function,
                lw = w.location
            );
            let tier = Severity::classify(row.count, report.max_count);
            writeln!(console, "{}{}", lead, tier.paint(row.count))?;
            writeln!(file, "{}{}", lead, row.count)?;
        }

        writeln!(console)?;
        writeln!(file)?;
    }

    file.flush()?;
    console.flush()
}
