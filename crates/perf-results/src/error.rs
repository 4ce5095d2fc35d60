use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResultsError {
    /// The `"Physical port` marker was found but its speed is not a known tier.
    #[error("unsupported link speed `{0}` (expected one of 10, 25, 40, 50 or 100 Gbps)")]
    UnsupportedLinkSpeed(String),
    /// A full scan finished without resolving every required section.
    #[error("throughput results are missing data: {}", .missing.join(", "))]
    IncompleteThroughputData { missing: Vec<String> },
    #[error("invalid threshold table: {0}")]
    Thresholds(String),
    #[error("failed to parse threshold table: {0}")]
    ThresholdsJson(#[from] serde_json::Error),
    #[error("csv parse error at row {row}: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Per-row irregularities that are recovered locally and never abort a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowAnomaly {
    /// The row is too short for positional cell access.
    MalformedRow,
    /// A cell that had to be numeric was not.
    NonNumericCell,
    /// Embedded CPU utilisation statistics (`cpu_*` rows).
    CpuStatsRow,
}

impl RowAnomaly {
    pub fn as_str(self) -> &'static str {
        match self {
            RowAnomaly::MalformedRow => "malformed_row",
            RowAnomaly::NonNumericCell => "non_numeric_cell",
            RowAnomaly::CpuStatsRow => "cpu_stats_row",
        }
    }
}

impl fmt::Display for RowAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
