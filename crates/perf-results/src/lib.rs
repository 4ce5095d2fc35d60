//! Parsing and pass/fail evaluation for archived packet-forwarding benchmark results.
//!
//! The benchmark suite leaves behind semi-structured CSV files (comma delimited,
//! `|` quoted) whose layout depends on the test path:
//!
//! - packet-forwarding runs produce a rectangular-ish result table that is checked
//!   for non-positive measurements ([`table`]);
//! - flow-offload runs produce a multi-section file (link speed, packet-size header,
//!   one row per flow count) whose 10K-flow row is compared against a per-speed
//!   threshold table ([`throughput`], [`thresholds`]).
//!
//! [`classify`] picks the path from an archive file name. Everything here is pure:
//! archive access and spreadsheet output live in the `perf-report` crate.

pub mod classify;
mod error;
pub mod number;
pub mod rows;
pub mod table;
pub mod thresholds;
pub mod throughput;

use std::fmt;

pub use classify::{archive_base_name, classify_archive, ArchiveRoute, Datapath, IgnoreReason, Layer};
pub use error::{ResultsError, RowAnomaly};
pub use rows::{parse_rows, read_rows, Row};
pub use table::{extract_table, extract_table_from_rows, Cell, ResultTable, TableExtraction};
pub use thresholds::{LinkSpeed, ThresholdTable};
pub use throughput::{
    evaluate, evaluate_throughput, ComparisonRow, Criterion, EvaluateOptions, ThroughputComparison,
    ThroughputRecord, DEFAULT_TARGET_FLOWS,
};

/// Outcome attached to one processed archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Verdict {
    #[default]
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_failed(self) -> bool {
        self == Verdict::Fail
    }

    /// Fold another observation into this verdict; any failure is sticky.
    pub fn record_failure(&mut self, failed: bool) {
        if failed {
            *self = Verdict::Fail;
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
