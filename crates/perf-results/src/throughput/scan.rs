//! Section scanner for flow-offload throughput files.
//!
//! The file is read top to bottom through four states:
//!
//! 1. [`ScanState::SeekSpeed`]: wait for the `"Physical port` row and take the
//!    link speed from the second token of its third cell.
//! 2. [`ScanState::SeekPacketSizes`]: wait for the `Number of flows` header whose
//!    remaining cells are packet sizes.
//! 3. [`ScanState::SeekResultRow`]: look at rows exactly one cell wider than the
//!    packet-size list until one starts with the target flow count.
//! 4. [`ScanState::Done`]: terminal; later blocks are never looked at.
//!
//! A blank row drops any packet-size header seen so far (a new block starts),
//! but keeps the link speed.

use crate::number::{parse_integer, parse_truncated};
use crate::rows::Row;
use crate::thresholds::LinkSpeed;
use crate::{ResultsError, RowAnomaly};

use super::ThroughputRecord;

/// First cell of the link speed row. The leading `"` is part of the cell since
/// `"` is not the quote character of this dialect.
pub const SPEED_MARKER: &str = "\"Physical port";
/// First cell of the packet-size header row.
pub const PACKET_SIZE_MARKER: &str = "Number of flows";
const CPU_STATS_PREFIX: &str = "cpu_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    SeekSpeed,
    SeekPacketSizes {
        speed: LinkSpeed,
    },
    SeekResultRow {
        speed: LinkSpeed,
        packet_sizes: Vec<u32>,
    },
    Done(ThroughputRecord),
}

/// Result of feeding one row to a [`ScanState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub state: ScanState,
    pub anomaly: Option<RowAnomaly>,
}

impl Step {
    fn to(state: ScanState) -> Self {
        Self {
            state,
            anomaly: None,
        }
    }

    fn skipped(state: ScanState, anomaly: RowAnomaly) -> Self {
        Self {
            state,
            anomaly: Some(anomaly),
        }
    }
}

impl ScanState {
    /// Transition on one row.
    ///
    /// Only a bad link speed is an error; every other irregularity is absorbed
    /// and reported through [`Step::anomaly`].
    pub fn step(self, row: &[String], target_flows: u64) -> Result<Step, ResultsError> {
        if row.is_empty() {
            let state = match self {
                ScanState::SeekPacketSizes { speed } | ScanState::SeekResultRow { speed, .. } => {
                    ScanState::SeekPacketSizes { speed }
                }
                other => other,
            };
            return Ok(Step::to(state));
        }

        match self {
            ScanState::SeekSpeed => seek_speed(row),
            ScanState::SeekPacketSizes { speed } => Ok(seek_packet_sizes(speed, row)),
            ScanState::SeekResultRow {
                speed,
                packet_sizes,
            } => Ok(seek_result_row(speed, packet_sizes, row, target_flows)),
            done @ ScanState::Done(_) => Ok(Step::to(done)),
        }
    }

    /// Names of the sections still unresolved in this state.
    fn missing(&self, target_flows: u64) -> Vec<String> {
        let result_row = format!("{target_flows}-flow result row");
        match self {
            ScanState::SeekSpeed => vec![
                "link speed".to_string(),
                "packet size header".to_string(),
                result_row,
            ],
            ScanState::SeekPacketSizes { .. } => vec!["packet size header".to_string(), result_row],
            ScanState::SeekResultRow { .. } => vec![result_row],
            ScanState::Done(_) => Vec::new(),
        }
    }
}

fn seek_speed(row: &[String]) -> Result<Step, ResultsError> {
    if row[0] != SPEED_MARKER {
        return Ok(Step::to(ScanState::SeekSpeed));
    }

    let Some(token) = row.get(2).and_then(|cell| cell.split_whitespace().nth(1)) else {
        return Ok(Step::skipped(ScanState::SeekSpeed, RowAnomaly::MalformedRow));
    };
    let gbps = parse_truncated(token)
        .ok_or_else(|| ResultsError::UnsupportedLinkSpeed(token.to_string()))?;
    let speed = LinkSpeed::try_from(gbps)?;
    log::debug!("link speed {speed}");
    Ok(Step::to(ScanState::SeekPacketSizes { speed }))
}

fn seek_packet_sizes(speed: LinkSpeed, row: &[String]) -> Step {
    if row.len() < 2 || row[0] != PACKET_SIZE_MARKER {
        return Step::to(ScanState::SeekPacketSizes { speed });
    }

    match row[1..]
        .iter()
        .map(|cell| parse_integer(cell))
        .collect::<Option<Vec<u32>>>()
    {
        Some(packet_sizes) => Step::to(ScanState::SeekResultRow {
            speed,
            packet_sizes,
        }),
        None => Step::skipped(
            ScanState::SeekPacketSizes { speed },
            RowAnomaly::NonNumericCell,
        ),
    }
}

fn seek_result_row(
    speed: LinkSpeed,
    packet_sizes: Vec<u32>,
    row: &[String],
    target_flows: u64,
) -> Step {
    if row.len() != packet_sizes.len() + 1 {
        return Step::to(ScanState::SeekResultRow {
            speed,
            packet_sizes,
        });
    }

    let Some(values) = row
        .iter()
        .map(|cell| parse_truncated(cell))
        .collect::<Option<Vec<i64>>>()
    else {
        if row[0].starts_with(CPU_STATS_PREFIX) {
            return Step::skipped(
                ScanState::SeekResultRow {
                    speed,
                    packet_sizes,
                },
                RowAnomaly::CpuStatsRow,
            );
        }
        // Anything else means we walked out of the result block.
        return Step::skipped(
            ScanState::SeekPacketSizes { speed },
            RowAnomaly::NonNumericCell,
        );
    };

    let flows = values[0];
    if u64::try_from(flows).ok() != Some(target_flows) {
        return Step::to(ScanState::SeekResultRow {
            speed,
            packet_sizes,
        });
    }

    Step::to(ScanState::Done(ThroughputRecord {
        link_speed: speed,
        flow_count: target_flows,
        packet_sizes,
        measured: values[1..].to_vec(),
    }))
}

/// Run the scanner over `rows` and return the first complete record.
pub fn scan_rows<'a, I>(rows: I, target_flows: u64) -> Result<ThroughputRecord, ResultsError>
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut state = ScanState::SeekSpeed;
    for (index, row) in rows.into_iter().enumerate() {
        let step = state.step(row, target_flows)?;
        if let Some(anomaly) = step.anomaly {
            log::debug!("row {}: skipped ({anomaly})", index + 1);
        }
        state = match step.state {
            ScanState::Done(record) => return Ok(record),
            other => other,
        };
    }

    Err(ResultsError::IncompleteThroughputData {
        missing: state.missing(target_flows),
    })
}
