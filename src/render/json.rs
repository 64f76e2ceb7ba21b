use crate::Result;
use crate::model::{Mode, PartitionReport};

use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Machine-readable form of the ranked report.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport<'a> {
    pub binary: &'a Path,
    pub mode: Mode,
    pub partitions: &'a [PartitionReport],
}

/// Write `report` as pretty-printed JSON to `path`.
pub fn write_json_report(path: &Path, report: &JsonReport<'_>) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("create json report {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, report)
        .with_context(|| format!("write json report {}", path.display()))?;
    writeln!(out)?;
    out.flush()
        .with_context(|| format!("flush json report {}", path.display()))?;
    Ok(())
}
