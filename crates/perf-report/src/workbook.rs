//! XLSX report output.
//!
//! `rust_xlsxwriter` can only write new files, so appending to an existing report
//! means reading its sheets back with `calamine` and re-emitting their values
//! ahead of the new sheet. Throughput sheets get their bold headings and red
//! missed thresholds rebuilt from those values; any other styling and embedded
//! images of previously written sheets are lost.

use std::collections::HashMap;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use calamine::{open_workbook, Data, Reader, Xlsx};
use perf_results::{Cell, Criterion, ResultTable, ThroughputComparison, Verdict};
use rust_xlsxwriter::{Color, ColNum, Format, Image, RowNum, Workbook, Worksheet, XlsxError};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Excel's limit on worksheet name length.
pub const MAX_SHEET_NAME_LEN: usize = 31;
const INVALID_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];
/// Room left for the archive base name next to ` (PASS)` / ` (FAIL)`.
const BASE_BUDGET: usize = MAX_SHEET_NAME_LEN - " (PASS)".len();

const THROUGHPUT_TITLE_PREFIX: &str = "PVP test for ";
const THROUGHPUT_HEADERS: [&str; 3] = ["Packet Size", "pps", "pass criteria pps"];

const TABLE_COLUMN_WIDTH: f64 = 30.0;
const THROUGHPUT_COLUMN_WIDTH: f64 = 16.0;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("failed to read existing workbook {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: calamine::XlsxError,
    },
    #[error("failed to render workbook: {0}")]
    Render(#[from] XlsxError),
    #[error("failed to write workbook {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What goes on a report sheet.
#[derive(Debug, Clone)]
pub enum SheetBody {
    /// Packet-forwarding result table, optionally followed by a plot (PNG bytes).
    Table {
        table: ResultTable,
        image: Option<Vec<u8>>,
    },
    Throughput(ThroughputComparison),
}

#[derive(Debug, Clone, PartialEq)]
enum CarriedValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

#[derive(Debug, Clone)]
enum Sheet {
    /// A sheet loaded from the existing output file.
    Carried {
        name: String,
        cells: Vec<(RowNum, ColNum, CarriedValue)>,
        /// Laid out by [`write_throughput`].
        throughput: bool,
    },
    Report { name: String, body: SheetBody },
}

impl Sheet {
    fn name(&self) -> &str {
        match self {
            Sheet::Carried { name, .. } | Sheet::Report { name, .. } => name,
        }
    }
}

/// Worksheet title for an archive: `<base> (PASS)` or `<base> (FAIL)`.
///
/// Characters Excel rejects are replaced with `_`. A base too long for the
/// verdict suffix is cut and tagged `~1`, so it never takes the title of an
/// archive whose name fits.
pub fn sheet_title(base: &str, verdict: Verdict) -> String {
    let base = sanitize_base(base);
    if base.chars().count() <= BASE_BUDGET {
        format!("{base} ({verdict})")
    } else {
        cut_title(&base, verdict, 1)
    }
}

fn sanitize_base(base: &str) -> String {
    let mut base: String = base
        .chars()
        .map(|c| {
            if INVALID_SHEET_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    if base.starts_with('\'') {
        base.replace_range(..1, "_");
    }
    base
}

fn cut_title(base: &str, verdict: Verdict, n: usize) -> String {
    let tag = format!("~{n}");
    let kept: String = base
        .chars()
        .take(BASE_BUDGET.saturating_sub(tag.len()))
        .collect();
    format!("{kept}{tag} ({verdict})")
}

pub struct ReportWorkbook {
    path: PathBuf,
    sheets: Vec<Sheet>,
}

impl ReportWorkbook {
    /// Start a report at `path`, keeping the sheets of an existing file.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self, WorkbookError> {
        let path = path.as_ref().to_path_buf();
        let sheets = if path.exists() {
            load_sheets(&path)?
        } else {
            Vec::new()
        };
        Ok(Self { path, sheets })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(Sheet::name)
    }

    /// Add the sheet for one archive and return its title.
    ///
    /// When the whole base name fits in the title, an earlier sheet for the same
    /// archive (either verdict) is replaced. A cut base cannot be told apart from
    /// other archives sharing its prefix, so it gets the next free `~N` tag and
    /// no sheet is removed.
    pub fn add_report(&mut self, base: &str, verdict: Verdict, body: SheetBody) -> String {
        let base = sanitize_base(base);
        let name = if base.chars().count() <= BASE_BUDGET {
            let stale =
                [Verdict::Pass, Verdict::Fail].map(|v| format!("{base} ({v})").to_lowercase());
            self.sheets
                .retain(|sheet| !stale.contains(&sheet.name().to_lowercase()));
            format!("{base} ({verdict})")
        } else {
            let mut n = 1;
            loop {
                let title = cut_title(&base, verdict, n);
                if !self.has_sheet(&title) {
                    break title;
                }
                n += 1;
            }
        };

        self.sheets.push(Sheet::Report {
            name: name.clone(),
            body,
        });
        name
    }

    fn has_sheet(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.sheets
            .iter()
            .any(|sheet| sheet.name().to_lowercase() == name)
    }

    /// Render every sheet and atomically replace the output file.
    pub fn save(&self) -> Result<(), WorkbookError> {
        let mut workbook = Workbook::new();
        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(sheet.name())?;
            match sheet {
                Sheet::Carried {
                    cells, throughput, ..
                } => write_carried(worksheet, cells, *throughput)?,
                Sheet::Report {
                    body: SheetBody::Table { table, image },
                    ..
                } => write_table(worksheet, table, image.as_deref())?,
                Sheet::Report {
                    body: SheetBody::Throughput(comparison),
                    ..
                } => write_throughput(worksheet, comparison)?,
            }
        }

        let bytes = workbook.save_to_buffer()?;
        atomic_write(&self.path, &bytes).map_err(|source| WorkbookError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

fn load_sheets(path: &Path) -> Result<Vec<Sheet>, WorkbookError> {
    let read_err = |source| WorkbookError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(read_err)?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name).map_err(read_err)?;
        // `used_cells` coordinates are relative to `range.start()`.
        let (start_row, start_col) = range.start().unwrap_or((0, 0));

        let mut cells = Vec::new();
        for (row, col, value) in range.used_cells() {
            let (Some(row), Some(col)) = (
                u32::try_from(row).ok().and_then(|r| start_row.checked_add(r)),
                u32::try_from(col)
                    .ok()
                    .and_then(|c| start_col.checked_add(c))
                    .and_then(|c| ColNum::try_from(c).ok()),
            ) else {
                log::warn!("skipping out-of-bounds cell in sheet `{name}` at ({row},{col})");
                continue;
            };
            if let Some(value) = carried_value(value) {
                cells.push((row, col, value));
            }
        }
        let throughput = is_throughput_layout(&cells);
        log::debug!(
            "carrying over sheet `{name}` ({} cells, throughput: {throughput})",
            cells.len()
        );
        sheets.push(Sheet::Carried {
            name,
            cells,
            throughput,
        });
    }
    Ok(sheets)
}

fn carried_value(value: &Data) -> Option<CarriedValue> {
    match value {
        Data::Empty => None,
        Data::Int(v) => Some(CarriedValue::Number(*v as f64)),
        Data::Float(v) => Some(CarriedValue::Number(*v)),
        Data::Bool(v) => Some(CarriedValue::Bool(*v)),
        Data::DateTime(v) => Some(CarriedValue::Number(v.as_f64())),
        Data::String(v) | Data::DateTimeIso(v) | Data::DurationIso(v) => {
            Some(CarriedValue::Text(v.clone()))
        }
        Data::Error(e) => Some(CarriedValue::Text(e.to_string())),
    }
}

fn is_throughput_layout(cells: &[(RowNum, ColNum, CarriedValue)]) -> bool {
    let text_at = |row: RowNum, col: ColNum| {
        cells.iter().find_map(|(r, c, value)| match value {
            CarriedValue::Text(text) if *r == row && *c == col => Some(text.as_str()),
            _ => None,
        })
    };
    text_at(0, 0).is_some_and(|title| title.starts_with(THROUGHPUT_TITLE_PREFIX))
        && THROUGHPUT_HEADERS
            .iter()
            .zip(0..)
            .all(|(header, col)| text_at(1, col) == Some(*header))
}

/// A criterion cell is missed when its row has no measurement or a lower one.
fn missed_threshold(measured: Option<&CarriedValue>, minimum: &CarriedValue) -> bool {
    match (minimum, measured) {
        (CarriedValue::Number(minimum), Some(CarriedValue::Number(pps))) => pps < minimum,
        (CarriedValue::Number(_), _) => true,
        _ => false,
    }
}

fn write_carried(
    worksheet: &mut Worksheet,
    cells: &[(RowNum, ColNum, CarriedValue)],
    throughput: bool,
) -> Result<(), XlsxError> {
    if !throughput {
        for (row, col, value) in cells {
            write_carried_value(worksheet, *row, *col, value, None)?;
        }
        return Ok(());
    }

    let formats = ThroughputFormats::new();
    set_throughput_widths(worksheet)?;
    let measured: HashMap<RowNum, &CarriedValue> = cells
        .iter()
        .filter(|(row, col, _)| *row >= 2 && *col == 1)
        .map(|(row, _, value)| (*row, value))
        .collect();

    for (row, col, value) in cells {
        let format = match (*row, *col) {
            (0 | 1, _) => Some(&formats.heading),
            (row, 2) if missed_threshold(measured.get(&row).copied(), value) => {
                Some(&formats.missed)
            }
            _ => None,
        };
        write_carried_value(worksheet, *row, *col, value, format)?;
    }
    Ok(())
}

fn write_carried_value(
    worksheet: &mut Worksheet,
    row: RowNum,
    col: ColNum,
    value: &CarriedValue,
    format: Option<&Format>,
) -> Result<(), XlsxError> {
    match (value, format) {
        (CarriedValue::Number(v), Some(format)) => {
            worksheet.write_number_with_format(row, col, *v, format)?
        }
        (CarriedValue::Number(v), None) => worksheet.write_number(row, col, *v)?,
        (CarriedValue::Text(v), Some(format)) => {
            worksheet.write_string_with_format(row, col, v, format)?
        }
        (CarriedValue::Text(v), None) => worksheet.write_string(row, col, v)?,
        (CarriedValue::Bool(v), Some(format)) => {
            worksheet.write_boolean_with_format(row, col, *v, format)?
        }
        (CarriedValue::Bool(v), None) => worksheet.write_boolean(row, col, *v)?,
    };
    Ok(())
}

fn row_num(index: usize) -> Result<RowNum, XlsxError> {
    RowNum::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

fn col_num(index: usize) -> Result<ColNum, XlsxError> {
    ColNum::try_from(index).map_err(|_| XlsxError::RowColumnLimitError)
}

fn write_table(
    worksheet: &mut Worksheet,
    table: &ResultTable,
    image: Option<&[u8]>,
) -> Result<(), XlsxError> {
    for (r, cells) in table.rows.iter().enumerate() {
        let row = row_num(r)?;
        for (c, cell) in cells.iter().enumerate() {
            let col = col_num(c)?;
            match cell {
                Cell::Number(value) => worksheet.write_number(row, col, *value as f64)?,
                Cell::Text(text) => worksheet.write_string(row, col, text)?,
            };
        }
    }

    for c in 0..table.max_columns() {
        worksheet.set_column_width(col_num(c)?, TABLE_COLUMN_WIDTH)?;
    }

    if let Some(bytes) = image {
        let image = Image::new_from_buffer(bytes)?;
        worksheet.insert_image(row_num(table.rows.len())?, 0, &image)?;
    }
    Ok(())
}

fn flows_label(flows: u64) -> String {
    if flows >= 1000 && flows % 1000 == 0 {
        format!("{}K", flows / 1000)
    } else {
        flows.to_string()
    }
}

struct ThroughputFormats {
    heading: Format,
    missed: Format,
}

impl ThroughputFormats {
    fn new() -> Self {
        Self {
            heading: Format::new().set_bold(),
            missed: Format::new().set_font_color(Color::Red),
        }
    }
}

fn set_throughput_widths(worksheet: &mut Worksheet) -> Result<(), XlsxError> {
    worksheet.set_column_width(0, THROUGHPUT_COLUMN_WIDTH)?;
    worksheet.set_column_width(1, THROUGHPUT_COLUMN_WIDTH)?;
    Ok(())
}

fn write_throughput(
    worksheet: &mut Worksheet,
    comparison: &ThroughputComparison,
) -> Result<(), XlsxError> {
    let formats = ThroughputFormats::new();
    set_throughput_widths(worksheet)?;

    worksheet.write_string_with_format(
        0,
        0,
        format!(
            "{THROUGHPUT_TITLE_PREFIX}{} TC Flower rules with NIC speed of {} Gbps",
            flows_label(comparison.flow_count),
            comparison.link_speed.gbps()
        ),
        &formats.heading,
    )?;
    for (col, header) in THROUGHPUT_HEADERS.into_iter().enumerate() {
        worksheet.write_string_with_format(1, col_num(col)?, header, &formats.heading)?;
    }

    for (i, result) in comparison.rows.iter().enumerate() {
        let row = row_num(i + 2)?;
        worksheet.write_number(row, 0, f64::from(result.packet_size))?;
        match result.measured {
            Some(pps) => worksheet.write_number(row, 1, pps as f64)?,
            None => worksheet.write_string(row, 1, "N/A")?,
        };
        match result.criterion {
            Criterion::Met(minimum) => worksheet.write_number(row, 2, minimum as f64)?,
            Criterion::Missed(minimum) => {
                worksheet.write_number_with_format(row, 2, minimum as f64, &formats.missed)?
            }
            Criterion::NotApplicable => worksheet.write_string(row, 2, "-")?,
        };
    }
    Ok(())
}

fn parent_dir_or_dot(path: &Path) -> &Path {
    // `Path::parent` is `Some("")` for bare file names like `report.xlsx`.
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Write to a temp file next to `dest`, sync it, then rename it into place.
fn atomic_write(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = parent_dir_or_dot(dest);
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file_mut().flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|err| err.error)?;
    Ok(())
}
