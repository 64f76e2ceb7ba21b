//! Aggregation model: fold samples into per-partition count maps, then join
//! them with the symbol table into ranked report rows.

use crate::Result;
use crate::sample::{Address, Sample};
use crate::symbols::{Symbol, SymbolTable};

use anyhow::bail;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Partition label used when every thread is summed together.
pub const ALL_THREADS: &str = "ALL_THREADS";

/// Accumulated call count per address.
pub type CountMap = BTreeMap<Address, u64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// One partition holding the totals of every thread.
    Sum,
    /// One partition per thread id, in order of first appearance.
    Threaded,
}

impl Mode {
    /// Resolve the two mutually exclusive mode switches.
    pub fn from_flags(sum: bool, threaded: bool) -> Result<Self> {
        match (sum, threaded) {
            (true, false) => Ok(Mode::Sum),
            (false, true) => Ok(Mode::Threaded),
            _ => bail!("choose exactly one mode: --sum or --threaded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub label: String,
    pub counts: CountMap,
}

impl Partition {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            counts: CountMap::new(),
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// Single-pass accumulator for samples.
pub struct Aggregator {
    mode: Mode,
    partitions: Vec<Partition>,
    // thread label -> index into `partitions`
    index: HashMap<String, usize>,
}

impl Aggregator {
    pub fn new(mode: Mode) -> Self {
        let mut agg = Self {
            mode,
            partitions: Vec::new(),
            index: HashMap::new(),
        };
        if mode == Mode::Sum {
            agg.partitions.push(Partition::new(ALL_THREADS));
        }
        agg
    }

    pub fn add(&mut self, sample: Sample) {
        let slot = match self.mode {
            Mode::Sum => 0,
            Mode::Threaded => match self.index.get(sample.thread.as_str()) {
                Some(&i) => i,
                None => {
                    let i = self.partitions.len();
                    self.partitions.push(Partition::new(sample.thread.as_str()));
                    self.index.insert(sample.thread.as_str().to_string(), i);
                    i
                }
            },
        };

        let total = self.partitions[slot].counts.entry(sample.address).or_insert(0);
        *total = total.saturating_add(sample.count);
    }

    pub fn finish(self) -> Vec<Partition> {
        self.partitions
    }
}

/// Consume a sample stream into partitions. Stops on the first read error.
pub fn aggregate<I>(mode: Mode, samples: I) -> Result<Vec<Partition>>
where
    I: IntoIterator<Item = Result<Sample>>,
{
    let mut agg = Aggregator::new(mode);
    let mut accepted = 0usize;
    for sample in samples {
        agg.add(sample?);
        accepted += 1;
    }

    let partitions = agg.finish();
    debug!(
        ?mode,
        samples = accepted,
        calls = partitions.iter().map(Partition::total).sum::<u64>(),
        partitions = partitions.len(),
        "aggregated call counts"
    );
    Ok(partitions)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub address: Address,
    pub function: String,
    pub location: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    pub label: String,
    pub max_count: u64,
    /// Sorted by count desc, then address asc.
    pub rows: Vec<ReportRow>,
}

/// Join one partition with the symbol table and rank it.
pub fn rank(partition: &Partition, symbols: &SymbolTable) -> PartitionReport {
    let mut rows: Vec<ReportRow> = partition
        .counts
        .iter()
        .map(|(address, &count)| {
            let Symbol { function, location } =
                symbols.get(address).cloned().unwrap_or_else(Symbol::unknown);
            ReportRow {
                address: address.clone(),
                function,
                location,
                count,
            }
        })
        .collect();

    // Count maps iterate in address order, so a stable sort keeps ties ascending.
    rows.sort_by(|a, b| b.count.cmp(&a.count));

    PartitionReport {
        label: partition.label.clone(),
        max_count: rows.first().map(|r| r.count).unwrap_or(0),
        rows,
    }
}
