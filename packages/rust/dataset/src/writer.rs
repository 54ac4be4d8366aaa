//! Kept/excluded CSV output.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;

use berclean_shared::{BerCleanError, Result, Table};

/// Rows written to each output by a [`SplitWriter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitCounts {
    pub kept: usize,
    pub excluded: usize,
}

struct Output {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl Output {
    fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BerCleanError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| BerCleanError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: csv::Writer::from_writer(file),
        })
    }

    fn write_rows(&mut self, rows: &[Vec<String>]) -> Result<()> {
        for row in rows {
            self.writer.write_record(row)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| BerCleanError::io(&self.path, e))
    }
}

/// Appends processed chunks to the kept file and, when filtering, the excluded file.
///
/// Both files are truncated on creation. The header row is written with the
/// first chunk only.
pub struct SplitWriter {
    kept: Output,
    excluded: Option<Output>,
    header_written: bool,
    counts: SplitCounts,
}

impl SplitWriter {
    /// Create the output files. Pass `None` for `excluded` when filtering is off.
    pub fn create(kept: &Path, excluded: Option<&Path>) -> Result<Self> {
        let kept = Output::create(kept)?;
        let excluded = excluded.map(Output::create).transpose()?;
        Ok(Self {
            kept,
            excluded,
            header_written: false,
            counts: SplitCounts::default(),
        })
    }

    /// Append one chunk. Kept and excluded tables share one column set.
    pub fn write(&mut self, kept: &Table, excluded: Option<&Table>) -> Result<()> {
        if let Some(excluded) = excluded {
            if excluded.headers != kept.headers {
                return Err(BerCleanError::validation(
                    "kept and excluded chunks have different columns",
                ));
            }
        }

        if !self.header_written {
            self.kept.writer.write_record(&kept.headers)?;
            if let Some(out) = self.excluded.as_mut() {
                out.writer.write_record(&kept.headers)?;
            }
            self.header_written = true;
        }

        self.kept.write_rows(&kept.rows)?;
        self.counts.kept += kept.len();

        match (self.excluded.as_mut(), excluded) {
            (Some(out), Some(table)) => {
                out.write_rows(&table.rows)?;
                self.counts.excluded += table.len();
            }
            (None, Some(table)) if !table.is_empty() => {
                return Err(BerCleanError::validation(
                    "excluded rows given but no excluded output was opened",
                ));
            }
            _ => {}
        }

        debug!(
            kept = kept.len(),
            excluded = excluded.map(Table::len).unwrap_or(0),
            "wrote chunk"
        );
        Ok(())
    }

    /// Flush both files and return the row counts.
    pub fn finish(mut self) -> Result<SplitCounts> {
        self.kept.flush()?;
        if let Some(out) = self.excluded.as_mut() {
            out.flush()?;
        }
        Ok(self.counts)
    }
}
