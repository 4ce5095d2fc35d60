//! Generic result table extraction for packet-forwarding runs.

use std::fmt;
use std::io::Read;

use crate::number::parse_truncated;
use crate::rows::{read_rows, Row};
use crate::{ResultsError, Verdict};

/// A normalised cell of a [`ResultTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    /// A decimal value truncated toward zero.
    Number(i64),
    /// Anything that did not parse as a number, kept verbatim.
    Text(String),
}

impl Cell {
    fn from_raw(raw: &str) -> Self {
        match parse_truncated(raw) {
            Some(value) => Cell::Number(value),
            None => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Cell::Number(value) => Some(*value),
            Cell::Text(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(value) => write!(f, "{value}"),
            Cell::Text(text) => f.write_str(text),
        }
    }
}

/// Rows in input order. Rows may differ in length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    pub rows: Vec<Vec<Cell>>,
}

impl ResultTable {
    /// Longest row, which determines the report's column span.
    pub fn max_columns(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableExtraction {
    pub table: ResultTable,
    /// Failed if any numeric cell is zero or negative.
    pub verdict: Verdict,
    /// Blank and `cpu` rows that were left out of the table.
    pub skipped_rows: usize,
}

pub fn extract_table<R: Read>(input: R) -> Result<TableExtraction, ResultsError> {
    let rows = read_rows(input)?;
    Ok(extract_table_from_rows(&rows))
}

pub fn extract_table_from_rows(rows: &[Row]) -> TableExtraction {
    let mut out = TableExtraction::default();

    for row in rows {
        let Some(first) = row.first() else {
            out.skipped_rows += 1;
            continue;
        };
        // CPU utilisation sidecar rows are not results.
        if first.contains("cpu") {
            out.skipped_rows += 1;
            continue;
        }

        let cells: Vec<Cell> = row.iter().map(|raw| Cell::from_raw(raw)).collect();
        let non_positive = cells
            .iter()
            .filter_map(Cell::as_number)
            .any(|value| value <= 0);
        out.verdict.record_failure(non_positive);
        out.table.rows.push(cells);
    }

    log::debug!(
        "extracted {} result rows ({} skipped), verdict {}",
        out.table.rows.len(),
        out.skipped_rows,
        out.verdict
    );
    out
}
