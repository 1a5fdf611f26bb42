//! Funnel streamer
//!
//! Scans the visit log one row at a time, looks each user id up in the
//! purchase index and writes the visits that converted. The visit log is never
//! held in memory: a single record buffer is reused for every row.

use crate::constants::{FUNNEL_HEADER, SOURCE_COLUMN, USER_ID_FIELD};
use crate::error::{FunnelError, Result};
use crate::metrics::FunnelMetrics;
use crate::types::{FunnelRecord, PurchaseIndex, VisitRecord};
use csv::StringRecord;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Where the user id and source live in each visit row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ColumnLayout {
    /// Both columns were found by name in the header
    Named { user_id: usize, source: usize },
    /// The header lacked one of the names; column 0 is the user id, column 1 the source
    Positional,
}

impl ColumnLayout {
    /// Resolve the layout from a header row. Cells are compared after trimming,
    /// dropping a byte-order mark and lower-casing.
    pub fn resolve(header: &StringRecord) -> Self {
        let normalized: Vec<String> = header
            .iter()
            .map(|cell| cell.trim_start_matches('\u{feff}').trim().to_lowercase())
            .collect();
        let position = |name: &str| normalized.iter().position(|cell| cell == name);

        match (position(USER_ID_FIELD), position(SOURCE_COLUMN)) {
            (Some(user_id), Some(source)) => ColumnLayout::Named { user_id, source },
            _ => ColumnLayout::Positional,
        }
    }

    pub fn user_id_column(&self) -> usize {
        match self {
            ColumnLayout::Named { user_id, .. } => *user_id,
            ColumnLayout::Positional => 0,
        }
    }

    pub fn source_column(&self) -> usize {
        match self {
            ColumnLayout::Named { source, .. } => *source,
            ColumnLayout::Positional => 1,
        }
    }

    /// Minimum number of fields a row needs to be usable
    pub fn required_len(&self) -> usize {
        self.user_id_column().max(self.source_column()) + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No fields, or the single empty field of a blank line
    Empty,
    /// Fewer fields than the layout requires
    Short,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Matched(FunnelRecord),
    Unmatched,
    Skipped(SkipReason),
}

/// Validate one visit row against the layout and join it with the index
pub fn classify_row(row: &StringRecord, layout: ColumnLayout, index: &PurchaseIndex) -> RowOutcome {
    if row.is_empty() || (row.len() == 1 && row[0].is_empty()) {
        return RowOutcome::Skipped(SkipReason::Empty);
    }
    if row.len() < layout.required_len() {
        return RowOutcome::Skipped(SkipReason::Short);
    }

    let visit = VisitRecord {
        user_id: row[layout.user_id_column()].trim().to_string(),
        source: row[layout.source_column()].trim().to_string(),
    };
    match index.matched_category(&visit.user_id) {
        Some(category) => RowOutcome::Matched(FunnelRecord::from_visit(visit, category)),
        None => RowOutcome::Unmatched,
    }
}

/// Counters and the first written row for one streaming pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FunnelSummary {
    /// Data rows read after the header
    pub rows_read: usize,
    pub rows_written: usize,
    pub rows_skipped: usize,
    pub rows_unmatched: usize,
    /// `None` when the visit log had no header row
    pub columns: Option<ColumnLayout>,
    pub first_row: Option<FunnelRecord>,
}

impl FunnelSummary {
    fn record(&mut self, outcome: RowOutcome) -> Option<FunnelRecord> {
        self.rows_read += 1;
        match outcome {
            RowOutcome::Matched(record) => {
                self.rows_written += 1;
                if self.first_row.is_none() {
                    self.first_row = Some(record.clone());
                }
                Some(record)
            }
            RowOutcome::Unmatched => {
                self.rows_unmatched += 1;
                None
            }
            RowOutcome::Skipped(_) => {
                self.rows_skipped += 1;
                None
            }
        }
    }
}

/// Stream `visit_source` through `index` into `sink`.
///
/// The sink always receives the `user_id,source,category` header followed by
/// the matched rows in input order. Rows are handed to the CSV writer as soon
/// as they match.
pub fn stream_funnel<R: Read, W: Write>(
    visit_source: R,
    index: &PurchaseIndex,
    sink: W,
) -> Result<FunnelSummary> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(visit_source);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(sink);

    let mut summary = FunnelSummary::default();
    let mut row = StringRecord::new();

    if !reader.read_record(&mut row)? {
        writer.write_record(FUNNEL_HEADER)?;
        writer.flush()?;
        debug!("Visit log is empty; wrote header only");
        return Ok(summary);
    }

    let layout = ColumnLayout::resolve(&row);
    summary.columns = Some(layout);
    writer.write_record(FUNNEL_HEADER)?;

    while reader.read_record(&mut row)? {
        let outcome = classify_row(&row, layout, index);
        if let Some(record) = summary.record(outcome) {
            writer.write_record([
                record.user_id.as_str(),
                record.source.as_str(),
                record.category.as_str(),
            ])?;
        }
    }
    writer.flush()?;

    FunnelMetrics::record_stream_finished(
        summary.rows_read,
        summary.rows_written,
        summary.rows_skipped,
        summary.rows_unmatched,
    );
    info!(
        read = summary.rows_read,
        written = summary.rows_written,
        skipped = summary.rows_skipped,
        unmatched = summary.rows_unmatched,
        "Visit log streamed"
    );
    Ok(summary)
}

/// Symlink chains longer than this are treated as a loop
const MAX_SYMLINK_HOPS: usize = 40;

/// Follow `output` through any symlinks to the file that should receive the
/// rows. A dangling link resolves to the path it names.
fn resolve_output(output: &Path) -> Result<PathBuf> {
    let mut target = output.to_path_buf();
    for _ in 0..MAX_SYMLINK_HOPS {
        match fs::symlink_metadata(&target) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let link = fs::read_link(&target)?;
                target = match target.parent() {
                    Some(parent) => parent.join(link),
                    None => link,
                };
            }
            _ => return Ok(target),
        }
    }
    Err(FunnelError::Io(io::Error::new(
        io::ErrorKind::Other,
        format!("too many levels of symbolic links: {}", output.display()),
    )))
}

/// Build the funnel file at `output` from the visit log at `visit_log`.
///
/// Rows are staged in a temporary file next to the resolved output and renamed
/// into place once the stream has completed, so a failed run leaves no partial
/// output. A symlinked output keeps its link and the file it points at is
/// replaced. An existing output keeps its permissions; a new one gets `0o666`
/// less the process umask, as a plain create would.
#[instrument(skip_all, fields(visit_log = %visit_log.display(), output = %output.display()))]
pub fn build_funnel(visit_log: &Path, index: &PurchaseIndex, output: &Path) -> Result<FunnelSummary> {
    if !visit_log.exists() {
        return Err(FunnelError::SourceNotFound { path: visit_log.to_path_buf() });
    }
    let target = resolve_output(output)?;
    let existing = fs::metadata(&target).ok();
    if existing.is_some() && fs::canonicalize(visit_log)? == fs::canonicalize(&target)? {
        return Err(FunnelError::Config(format!(
            "output path {} is the visit log itself",
            output.display()
        )));
    }

    let input = File::open(visit_log)?;
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(".funnel-");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    let mut staged = builder.tempfile_in(dir)?;

    let summary = stream_funnel(input, index, staged.as_file_mut())?;
    if let Some(meta) = existing {
        staged.as_file().set_permissions(meta.permissions())?;
    }
    staged.as_file().sync_all()?;
    staged.persist(&target).map_err(|e| FunnelError::Io(e.error))?;

    info!(rows = summary.rows_written, target = %target.display(), "Funnel written");
    Ok(summary)
}
