//! Threshold-based evaluation of flow-offload throughput runs.

pub mod scan;

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use crate::rows::read_rows;
use crate::thresholds::{LinkSpeed, ThresholdTable};
use crate::{ResultsError, Verdict};

pub use scan::{scan_rows, ScanState, Step};

/// Flow count whose result row is judged.
pub const DEFAULT_TARGET_FLOWS: u64 = 10_000;

/// The result row picked out of a throughput file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughputRecord {
    pub link_speed: LinkSpeed,
    pub flow_count: u64,
    /// Packet sizes in header order.
    pub packet_sizes: Vec<u32>,
    /// Packets per second, positionally aligned with `packet_sizes`.
    pub measured: Vec<i64>,
}

impl ThroughputRecord {
    pub fn measured_pps(&self) -> BTreeMap<u32, i64> {
        self.packet_sizes
            .iter()
            .copied()
            .zip(self.measured.iter().copied())
            .collect()
    }
}

/// How one packet size fared against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Met(i64),
    /// Measured value missing or below the minimum shown.
    Missed(i64),
    /// No threshold for this packet size; never affects the verdict.
    NotApplicable,
}

impl Criterion {
    pub fn minimum(self) -> Option<i64> {
        match self {
            Criterion::Met(pps) | Criterion::Missed(pps) => Some(pps),
            Criterion::NotApplicable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonRow {
    pub packet_size: u32,
    pub measured: Option<i64>,
    pub criterion: Criterion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughputComparison {
    pub link_speed: LinkSpeed,
    pub flow_count: u64,
    /// One row per packet size, ascending.
    pub rows: Vec<ComparisonRow>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    pub target_flows: u64,
    pub thresholds: ThresholdTable,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self {
            target_flows: DEFAULT_TARGET_FLOWS,
            thresholds: ThresholdTable::builtin(),
        }
    }
}

/// Compare a record against the tier for its link speed.
///
/// Every packet size that is either measured or has a threshold gets a row.
pub fn evaluate(
    record: &ThroughputRecord,
    thresholds: &ThresholdTable,
) -> Result<ThroughputComparison, ResultsError> {
    let tier = thresholds.tier(record.link_speed).ok_or_else(|| {
        ResultsError::Thresholds(format!("no thresholds configured for {}", record.link_speed))
    })?;
    let measured_pps = record.measured_pps();

    let sizes: BTreeSet<u32> = measured_pps.keys().chain(tier.keys()).copied().collect();

    let mut verdict = Verdict::Pass;
    let rows = sizes
        .into_iter()
        .map(|packet_size| {
            let measured = measured_pps.get(&packet_size).copied();
            let criterion = match tier.get(&packet_size).copied() {
                None => Criterion::NotApplicable,
                Some(minimum) if measured.is_some_and(|pps| pps >= minimum) => {
                    Criterion::Met(minimum)
                }
                Some(minimum) => Criterion::Missed(minimum),
            };
            verdict.record_failure(matches!(criterion, Criterion::Missed(_)));
            ComparisonRow {
                packet_size,
                measured,
                criterion,
            }
        })
        .collect();

    Ok(ThroughputComparison {
        link_speed: record.link_speed,
        flow_count: record.flow_count,
        rows,
        verdict,
    })
}

/// Scan a throughput file and evaluate its target-flow row.
pub fn evaluate_throughput<R: Read>(
    input: R,
    options: &EvaluateOptions,
) -> Result<ThroughputComparison, ResultsError> {
    let rows = read_rows(input)?;
    let record = scan_rows(&rows, options.target_flows)?;
    let comparison = evaluate(&record, &options.thresholds)?;
    log::debug!(
        "{} flows at {}: {}",
        comparison.flow_count,
        comparison.link_speed,
        comparison.verdict
    );
    Ok(comparison)
}
