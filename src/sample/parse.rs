use crate::Result;
use crate::sample::row::{Address, Sample, ThreadId};

use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Validate one raw line and turn it into a sample.
///
/// Returns `None` for blank lines, lines without exactly three tokens, and
/// lines whose count is not a non-negative integer. This is the only place
/// that decides whether a record is kept.
pub fn parse_line(line: &str) -> Option<Sample> {
    let mut tokens = line.split_whitespace();
    let (address, count, thread) = (tokens.next()?, tokens.next()?, tokens.next()?);
    if tokens.next().is_some() {
        return None;
    }

    let count = count.parse::<u64>().ok()?;

    Some(Sample {
        address: Address::new(address),
        count,
        thread: ThreadId::new(thread),
    })
}

/// Lazy, single-pass iterator over the valid samples of a count file.
///
/// Malformed lines (including ones that are not UTF-8) are skipped without
/// surfacing an error; only read failures of the underlying stream are
/// reported.
pub struct Samples<R> {
    reader: R,
    origin: PathBuf,
    lineno: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> Samples<R> {
    pub fn new(reader: R, origin: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            origin: origin.into(),
            lineno: 0,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for Samples<R> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            let read = match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(n) => n,
                Err(e) => {
                    return Some(Err(e).with_context(|| {
                        format!(
                            "read count file {} after line {}",
                            self.origin.display(),
                            self.lineno
                        )
                    }));
                }
            };
            if read == 0 {
                return None;
            }
            self.lineno += 1;

            let parsed = std::str::from_utf8(&self.buf).ok().and_then(parse_line);
            match parsed {
                Some(sample) => return Some(Ok(sample)),
                None => {
                    trace!(
                        file = %self.origin.display(),
                        line = self.lineno,
                        "skipping malformed sample line"
                    );
                }
            }
        }
    }
}

/// Open a count file and return its sample iterator.
pub fn read_samples(path: &Path) -> Result<Samples<BufReader<File>>> {
    let file =
        File::open(path).with_context(|| format!("open count file {}", path.display()))?;
    Ok(Samples::new(BufReader::new(file), path))
}
