//! Batched address -> (function, file:line) resolution.
//!
//! The resolver is a capability handed in by the caller. It receives every
//! unique address at once and answers with two output lines per address:
//! function name, then file:line, in request order.

pub mod addr2line;

pub use self::addr2line::Addr2Line;

use crate::Result;
use crate::model::Partition;
use crate::sample::Address;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

pub const UNKNOWN: &str = "<unknown>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub function: String,
    pub location: String,
}

impl Symbol {
    pub fn unknown() -> Self {
        Self {
            function: UNKNOWN.to_string(),
            location: UNKNOWN.to_string(),
        }
    }
}

pub type SymbolTable = BTreeMap<Address, Symbol>;

pub trait BatchSymbolResolver {
    /// Resolve `addresses` against `binary` in one call and return the raw
    /// output lines.
    fn resolve(&self, binary: &Path, addresses: &[Address]) -> Result<Vec<String>>;
}

/// Union of addresses across all partitions, in address order.
pub fn unique_addresses(partitions: &[Partition]) -> Vec<Address> {
    partitions
        .iter()
        .flat_map(|p| p.counts.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Build the symbol table for every address seen in `partitions`.
///
/// A failed resolver call is not fatal: it is logged and every address
/// falls back to the unknown placeholder.
pub fn build_symbol_table(
    resolver: &dyn BatchSymbolResolver,
    binary: &Path,
    partitions: &[Partition],
) -> SymbolTable {
    let addresses = unique_addresses(partitions);
    if addresses.is_empty() {
        return SymbolTable::new();
    }

    debug!(addresses = addresses.len(), binary = %binary.display(), "resolving symbols");
    let lines = match resolver.resolve(binary, &addresses) {
        Ok(lines) => lines,
        Err(e) => {
            warn!(
                "symbol resolution failed, reporting all {} addresses as unknown: {:#}",
                addresses.len(),
                e
            );
            Vec::new()
        }
    };

    let expected = addresses.len() * 2;
    if !lines.is_empty() && lines.len() < expected {
        warn!(
            got = lines.len(),
            expected, "resolver output is short, missing entries become unknown"
        );
    }

    align(addresses, &lines)
}

fn align(addresses: Vec<Address>, lines: &[String]) -> SymbolTable {
    let slot = |i: usize| {
        lines
            .get(i)
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string()
    };

    addresses
        .into_iter()
        .enumerate()
        .map(|(i, addr)| {
            let symbol = Symbol {
                function: slot(2 * i),
                location: slot(2 * i + 1),
            };
            (addr, symbol)
        })
        .collect()
}
