//! Iteration and failure tallies.
//!
//! An explicit collector owned by the engine (or the embedding harness), so
//! multiple engine instances never share counters.

use std::collections::BTreeMap;
use std::fmt;

use crate::Error;

/// Running tallies for one engine instance.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    iterations: u64,
    failures: BTreeMap<&'static str, u64>,
}

impl Stats {
    /// Count one fuzz iteration; returns the running total.
    pub fn record_iteration(&mut self) -> u64 {
        self.iterations += 1;
        self.iterations
    }

    /// Count one decode/mutation failure, keyed by error kind.
    pub fn record_failure(&mut self, error: &Error) {
        *self.failures.entry(error.kind().name()).or_insert(0) += 1;
    }

    /// Total iterations so far.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Failure tallies, keyed by error kind.
    pub fn failures(&self) -> &BTreeMap<&'static str, u64> {
        &self.failures
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Iterations: {}", self.iterations)?;
        writeln!(f, "Failures:")?;
        for (kind, count) in &self.failures {
            writeln!(f, "    {kind}: {count}")?;
        }
        Ok(())
    }
}
