//! CSV dialect used by the benchmark result files.
//!
//! Fields are comma delimited and quoted with `|`, so a literal `"` is ordinary
//! text. Unlike a plain [`csv::Reader`], blank lines are not swallowed: each one
//! is surfaced as an empty row, because the throughput layout uses them as
//! section separators.

use std::io::Read;

use csv::{Reader, ReaderBuilder, StringRecord};

use crate::ResultsError;

pub const DELIMITER: u8 = b',';
pub const QUOTE: u8 = b'|';

/// One parsed CSV row. Empty for a blank line.
pub type Row = Vec<String>;

fn reader_builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .delimiter(DELIMITER)
        .quote(QUOTE)
        .has_headers(false)
        // Result files mix sections of different widths.
        .flexible(true);
    builder
}

/// Read a whole result entry and split it into rows.
pub fn read_rows<R: Read>(mut input: R) -> Result<Vec<Row>, ResultsError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    Rows::new(&bytes).collect()
}

pub fn parse_rows(text: &str) -> Result<Vec<Row>, ResultsError> {
    Rows::new(text.as_bytes()).collect()
}

/// Iterator over the rows of an in-memory result file.
///
/// Records come from a single [`csv::Reader`]; the blank lines it skips are
/// recovered from the bytes between the end of one record and the start of the
/// next.
pub struct Rows<'a> {
    bytes: &'a [u8],
    reader: Reader<&'a [u8]>,
    record: StringRecord,
    /// Byte offset just past the last record read.
    cursor: usize,
    blank: usize,
    pending: Option<Row>,
    /// 1-based number of the last row yielded.
    index: usize,
    done: bool,
}

impl<'a> Rows<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        let cursor = if bytes.starts_with(UTF8_BOM) {
            UTF8_BOM.len()
        } else {
            0
        };
        Self {
            bytes,
            reader: reader_builder().from_reader(bytes),
            record: StringRecord::new(),
            cursor,
            blank: 0,
            pending: None,
            index: 0,
            done: false,
        }
    }

    fn read_next(&mut self) -> Result<(), ResultsError> {
        self.blank = blank_lines_at(self.bytes, self.cursor);
        match self.reader.read_record(&mut self.record) {
            Ok(true) => {
                self.cursor = usize::try_from(self.reader.position().byte())
                    .unwrap_or(self.bytes.len());
                self.pending = Some(self.record.iter().map(str::to_owned).collect());
            }
            Ok(false) => self.done = true,
            Err(source) => {
                self.done = true;
                return Err(ResultsError::Csv {
                    row: self.index + self.blank + 1,
                    source,
                });
            }
        }
        Ok(())
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<Row, ResultsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.blank > 0 {
                self.blank -= 1;
                self.index += 1;
                return Some(Ok(Vec::new()));
            }
            if let Some(row) = self.pending.take() {
                self.index += 1;
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.read_next() {
                return Some(Err(err));
            }
        }
    }
}

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Count the blank lines starting at `start`, the end of the previous record.
///
/// `\r`, `\n` and `\r\n` each end a line. A record ended by `\r` leaves its
/// `\n` unread, so that byte still belongs to the record.
fn blank_lines_at(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    if i > 0 && bytes[i - 1] == b'\r' && bytes.get(i) == Some(&b'\n') {
        i += 1;
    }

    let mut count = 0;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => i += 2,
            b'\r' | b'\n' => i += 1,
            _ => break,
        }
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rows(text: &str) -> Vec<Row> {
        parse_rows(text).unwrap()
    }

    #[test]
    fn blank_lines_become_empty_rows() {
        assert_eq!(
            rows("a,b\n\n\nc\n"),
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec![],
                vec![],
                vec!["c".to_string()],
            ]
        );
    }

    #[test]
    fn pipe_quotes_protect_delimiters_and_newlines() {
        assert_eq!(
            rows("|a,b|,|line1\nline2|,c\r\nnext"),
            vec![
                vec!["a,b".to_string(), "line1\nline2".to_string(), "c".to_string()],
                vec!["next".to_string()],
            ]
        );
    }

    #[test]
    fn double_quote_is_ordinary_text() {
        assert_eq!(
            rows("\"Physical port, \"dpdk0\", speed 10 Gbps\"\n"),
            vec![vec![
                "\"Physical port".to_string(),
                " \"dpdk0\"".to_string(),
                " speed 10 Gbps\"".to_string(),
            ]]
        );
    }

    #[test]
    fn escaped_quote_inside_quoted_field() {
        assert_eq!(rows("|a||b|,c"), vec![vec!["a|b".to_string(), "c".to_string()]]);
    }

    #[test]
    fn trailing_comma_is_an_empty_field_not_a_blank_row() {
        assert_eq!(rows(",\n"), vec![vec![String::new(), String::new()]]);
    }

    #[test]
    fn crlf_and_bare_cr_blank_lines() {
        assert_eq!(
            rows("a\r\n\r\nb\r\rc\r\n"),
            vec![
                vec!["a".to_string()],
                vec![],
                vec!["b".to_string()],
                vec![],
                vec!["c".to_string()],
            ]
        );
    }

    #[test]
    fn leading_and_trailing_blank_lines_are_kept() {
        assert_eq!(
            rows("\n\na\n\n"),
            vec![vec![], vec![], vec!["a".to_string()], vec![]]
        );
    }

    #[test]
    fn blank_line_after_multiline_quoted_field() {
        assert_eq!(
            rows("|x\n\ny|\n\nz"),
            vec![vec!["x\n\ny".to_string()], vec![], vec!["z".to_string()]]
        );
    }

    #[test]
    fn byte_order_mark_is_not_a_cell() {
        assert_eq!(
            read_rows(&b"\xef\xbb\xbf\na,b\n"[..]).unwrap(),
            vec![vec![], vec!["a".to_string(), "b".to_string()]]
        );
    }

    #[test]
    fn invalid_utf8_is_a_csv_error_with_its_row() {
        let err = read_rows(&b"a,b\n\n\xff,1\n"[..]).unwrap_err();
        match err {
            ResultsError::Csv { row, source } => {
                assert_eq!(row, 3);
                assert!(matches!(source.kind(), csv::ErrorKind::Utf8 { .. }), "{source}");
            }
            other => panic!("expected a csv error, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_has_no_rows() {
        assert!(rows("").is_empty());
    }
}
