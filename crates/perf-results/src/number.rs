//! Numeric normalisation shared by both result paths.

/// Parse a cell as a decimal number and truncate it toward zero.
///
/// Surrounding whitespace is ignored. Non-finite values (`nan`, `inf`) are not
/// numbers for our purposes; out-of-range values saturate.
pub fn parse_truncated(cell: &str) -> Option<i64> {
    let value: f64 = cell.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.trunc() as i64)
}

/// Parse a cell as a plain integer (no fractional part allowed).
pub fn parse_integer(cell: &str) -> Option<u32> {
    cell.trim().parse().ok()
}
