//! Record types for the raw count file.
//!
//! Example line: `0x55d0c3a1b2c0 42 140234567890`  =>  Sample { address, count, thread }

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Code address as it appears in the count file (usually `%p` output).
///
/// The token is kept verbatim because it is handed straight to the symbol
/// resolver. Ordering is numeric for hex tokens and falls back to the text
/// for anything else, so `0x200` sorts before `0x1000`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        let digits = self
            .0
            .strip_prefix("0x")
            .or_else(|| self.0.strip_prefix("0X"))?;
        u64::from_str_radix(digits, 16).ok()
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque thread token (the profiler writes a hash of the thread id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadId(String);

impl ThreadId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single validated record from the count file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub address: Address,
    pub count: u64,
    pub thread: ThreadId,
}
