//! Chunked CSV reading.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use berclean_shared::{BerCleanError, Result, Table};

/// Reads a CSV file as a sequence of [`Table`] chunks sharing one header row.
///
/// Cells are decoded as UTF-8, replacing invalid sequences rather than
/// failing. Rows are not required to match the header width; the record
/// model reports ragged rows with their position.
pub struct ChunkReader<R: Read = File> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    chunk_size: usize,
    record: csv::ByteRecord,
    chunks: usize,
    rows: usize,
    exhausted: bool,
}

impl ChunkReader<File> {
    /// Open `path` and read its header row.
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| BerCleanError::io(path, e))?;
        let reader = Self::from_reader(file, chunk_size)?;
        debug!(
            path = %path.display(),
            columns = reader.headers.len(),
            chunk_size,
            "opened input"
        );
        Ok(reader)
    }
}

impl<R: Read> ChunkReader<R> {
    pub fn from_reader(source: R, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(BerCleanError::config("chunk_size must be at least 1"));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);
        let headers = reader.byte_headers()?.iter().map(decode).collect();
        Ok(Self {
            reader,
            headers,
            chunk_size,
            record: csv::ByteRecord::new(),
            chunks: 0,
            rows: 0,
            exhausted: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows returned so far.
    pub fn rows_read(&self) -> usize {
        self.rows
    }

    /// Read up to `chunk_size` rows.
    ///
    /// The first call always yields a chunk, even for a header-only file, so
    /// the caller sees the column set. Later calls return `None` once the
    /// input is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Table>> {
        if self.exhausted && self.chunks > 0 {
            return Ok(None);
        }

        let mut rows = Vec::with_capacity(self.chunk_size.min(4096));
        while rows.len() < self.chunk_size {
            if !self.reader.read_byte_record(&mut self.record)? {
                self.exhausted = true;
                break;
            }
            rows.push(self.record.iter().map(decode).collect());
        }

        if rows.is_empty() && self.chunks > 0 {
            return Ok(None);
        }

        self.chunks += 1;
        self.rows += rows.len();
        debug!(chunk = self.chunks, rows = rows.len(), "read chunk");
        Ok(Some(Table::new(self.headers.clone(), rows)))
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Table>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

fn decode(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}
