//! Fixed-width residence record file
//!
//! Residence files store one coordinate pair per record, every record padded
//! to the same byte length (newline included). Record `i` therefore starts at
//! byte `i * record_size`, and a worker can seek directly to any record it
//! owns.
//!
//! ```text
//! offset 0   [ "   1234.500     567.250\n" ]  24 bytes
//! offset 24  [ "   8000.000    9100.125\n" ]  24 bytes
//! offset 48  [ ...                        ]
//! ```
//!
//! The final record may be shorter than `record_size` when the file has no
//! trailing newline. A trailing fragment consisting only of whitespace is
//! ignored.
//!
//! # Example
//!
//! ```no_run
//! use proxpulse::input::{FixedWidthRecordFile, RecordSource};
//! use std::path::Path;
//!
//! let mut file = FixedWidthRecordFile::open(Path::new("residences.dat"), Some(24))?;
//! let first = file.point_at(0)?;
//! println!("{} records, first at ({}, {})", file.record_count(), first.x, first.y);
//! # Ok::<(), anyhow::Error>(())
//! ```

use super::{parse_point, RecordSource};
use crate::error::ProximityError;
use crate::geo::Point;
use crate::partition::RecordPartitioner;
use crate::Result;
use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Record size of the classic residence layout (two 11-column values,
/// a separator and a newline)
pub const DEFAULT_RECORD_SIZE: u64 = 24;

/// Smallest record that can hold two values and a separator
pub const MIN_RECORD_SIZE: u64 = 4;

/// Random-access reader over a fixed-width record file
#[derive(Debug)]
pub struct FixedWidthRecordFile {
    path: PathBuf,
    file: File,
    file_len: u64,
    record_size: u64,
    record_count: u64,
    buf: Vec<u8>,
}

impl FixedWidthRecordFile {
    /// Open `path` with the given record size
    ///
    /// When `record_size` is `None` the size is taken from the first line,
    /// newline included.
    pub fn open(path: &Path, record_size: Option<u64>) -> Result<Self> {
        let mut file = File::open(path)
            .with_context(|| format!("Failed to open residence file: {}", path.display()))?;

        let file_len = file
            .metadata()
            .with_context(|| format!("Failed to stat residence file: {}", path.display()))?
            .len();

        let record_size = match record_size {
            Some(size) => size,
            None => detect_record_size(&mut file)
                .with_context(|| format!("Failed to detect record size: {}", path.display()))?,
        };

        if record_size < MIN_RECORD_SIZE {
            return Err(ProximityError::invalid_input(format!(
                "record size {} is below the minimum of {} bytes",
                record_size, MIN_RECORD_SIZE
            ))
            .into());
        }

        // A read never extends past the end of the file
        let buf_len = record_size.min(file_len).max(MIN_RECORD_SIZE);

        let mut reader = Self {
            path: path.to_path_buf(),
            file,
            file_len,
            record_size,
            record_count: 0,
            buf: vec![0u8; buf_len as usize],
        };
        reader.record_count = reader.count_records()?;

        tracing::debug!(
            path = %path.display(),
            file_len,
            record_size,
            records = reader.record_count,
            "opened residence file"
        );

        Ok(reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_size(&self) -> u64 {
        self.record_size
    }

    /// Full records plus a trailing partial record unless it is blank
    fn count_records(&mut self) -> Result<u64> {
        let full = self.file_len / self.record_size;
        let tail = self.file_len % self.record_size;
        if tail == 0 {
            return Ok(full);
        }

        let mut fragment = vec![0u8; tail as usize];
        self.file
            .seek(SeekFrom::Start(full * self.record_size))
            .context("Failed to seek to trailing record")?;
        self.file
            .read_exact(&mut fragment)
            .context("Failed to read trailing record")?;

        if fragment.iter().all(u8::is_ascii_whitespace) {
            Ok(full)
        } else {
            Ok(full + 1)
        }
    }
}

impl RecordSource for FixedWidthRecordFile {
    fn record_count(&self) -> u64 {
        self.record_count
    }

    fn point_at(&mut self, index: u64) -> Result<Point> {
        if index >= self.record_count {
            return Err(ProximityError::invalid_input(format!(
                "record {} out of range ({} records in {})",
                index,
                self.record_count,
                self.path.display()
            ))
            .into());
        }

        let offset = RecordPartitioner::byte_offset(index, self.record_size);
        let len = self.record_size.min(self.file_len - offset) as usize;

        self.file
            .seek(SeekFrom::Start(offset))
            .with_context(|| format!("Failed to seek to record {} (offset {})", index, offset))?;
        self.file
            .read_exact(&mut self.buf[..len])
            .with_context(|| format!("Failed to read record {} (offset {})", index, offset))?;

        let text = std::str::from_utf8(&self.buf[..len]).map_err(|_| {
            ProximityError::invalid_input(format!("record {} is not valid text", index))
        })?;

        parse_point(text)
            .with_context(|| format!("Malformed record {} in {}", index, self.path.display()))
    }
}

/// Length of the first line including its newline
fn detect_record_size(file: &mut File) -> Result<u64> {
    file.seek(SeekFrom::Start(0))?;
    let mut first = Vec::new();
    let read = BufReader::new(&mut *file).read_until(b'\n', &mut first)?;
    if read == 0 {
        // Empty file: any size yields zero records
        return Ok(DEFAULT_RECORD_SIZE);
    }
    // A file holding a single record without a newline sizes to that record
    Ok(read as u64)
}
