//! Turn one benchmark results archive into a PASS/FAIL worksheet.
//!
//! The archive name selects the analysis ([`perf_results::classify_archive`]); the
//! matching CSV entry is parsed and judged, and the outcome is added to an XLSX
//! report as a sheet titled `<archive base name> (PASS|FAIL)`. Data errors abort
//! before the report is touched, so a failed run never leaves a partial sheet.

pub mod archive;
pub mod cli;
pub mod workbook;

use std::path::PathBuf;

use anyhow::{Context, Result};
use perf_results::{
    archive_base_name, classify_archive, evaluate_throughput, extract_table, ArchiveRoute,
    EvaluateOptions, IgnoreReason, Verdict,
};

pub use archive::{ArchiveEntries, ArchiveError, Compression};
pub use workbook::{sheet_title, ReportWorkbook, SheetBody, WorkbookError};

#[derive(Debug, Clone)]
pub struct ReportRequest {
    /// Results tarball to analyse.
    pub archive: PathBuf,
    /// XLSX report to create or append to.
    pub output: PathBuf,
    pub options: EvaluateOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Reported { sheet: String, verdict: Verdict },
    /// The archive name did not select an analysis; the report was left alone.
    Ignored(IgnoreReason),
}

impl ProcessOutcome {
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            ProcessOutcome::Reported { verdict, .. } => Some(*verdict),
            ProcessOutcome::Ignored(_) => None,
        }
    }
}

pub fn process_archive(request: &ReportRequest) -> Result<ProcessOutcome> {
    let archive_path = &request.archive;
    let base = archive_base_name(archive_path).with_context(|| {
        format!("cannot derive a sheet name from {}", archive_path.display())
    })?;
    let file_name = archive_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(base.as_str());

    let route = classify_archive(file_name);
    if let ArchiveRoute::Ignored(reason) = route {
        log::warn!("skipping {}: {reason}", archive_path.display());
        return Ok(ProcessOutcome::Ignored(reason));
    }
    log::info!("processing {} as {route:?}", archive_path.display());

    let csv_entry = route
        .results_entry(&base)
        .context("archive route has no results entry")?;
    let image_entry = route.embedded_image(&base);
    let mut wanted = vec![csv_entry.clone()];
    wanted.extend(image_entry.iter().cloned());

    let mut entries = archive::read_entries(archive_path, &wanted)?;
    let csv = entries.require(&csv_entry)?;

    let (verdict, body) = match route {
        ArchiveRoute::FlowOffload => {
            let comparison = evaluate_throughput(csv.as_slice(), &request.options)
                .with_context(|| format!("evaluate {csv_entry} in {}", archive_path.display()))?;
            (comparison.verdict, SheetBody::Throughput(comparison))
        }
        _ => {
            let extraction = extract_table(csv.as_slice())
                .with_context(|| format!("parse {csv_entry} in {}", archive_path.display()))?;
            let image = image_entry.and_then(|entry| {
                let image = entries.take(&entry);
                if image.is_none() {
                    log::warn!(
                        "{} has no `{entry}`; report will have no plot",
                        archive_path.display()
                    );
                }
                image
            });
            (
                extraction.verdict,
                SheetBody::Table {
                    table: extraction.table,
                    image,
                },
            )
        }
    };

    let mut workbook = ReportWorkbook::open_or_create(&request.output)?;
    let sheet = workbook.add_report(&base, verdict, body);
    workbook.save()?;
    log::info!("wrote sheet `{sheet}` to {}", request.output.display());

    Ok(ProcessOutcome::Reported { sheet, verdict })
}
