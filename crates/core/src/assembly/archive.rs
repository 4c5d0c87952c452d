//! Deterministic ZIP writer.
//!
//! Entries stream straight to the caller's sink; there are no temporary
//! files. Every entry carries the same modification time (the order's
//! creation timestamp) and a fixed compression level, so generating the
//! same order twice produces byte-identical archives. Entry names are
//! tracked to uphold the one-entry-per-destination invariant.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::Path;

use chrono::{DateTime, Datelike, Timelike, Utc};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Error types for archive writing. Sink failures (including a closed
/// or cancelled sink) surface through the `Io` variant.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to write archive entry {0}: {1}")]
    Entry(String, zip::result::ZipError),

    #[error("Archive sink error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to finalize archive: {0}")]
    Finish(zip::result::ZipError),
}

/// Streams uniquely named entries into a ZIP with fixed metadata.
pub struct ArchiveWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: FileOptions,
    entries: BTreeSet<String>,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    /// Create a writer stamping every entry with `modified_at`.
    pub fn new(sink: W, modified_at: DateTime<Utc>) -> Self {
        let timestamp = zip::DateTime::from_date_and_time(
            modified_at.year().clamp(1980, 2107) as u16,
            modified_at.month() as u8,
            modified_at.day() as u8,
            modified_at.hour() as u8,
            modified_at.minute() as u8,
            modified_at.second() as u8,
        )
        .unwrap_or_default();

        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9))
            .last_modified_time(timestamp)
            .unix_permissions(0o644);

        Self {
            zip: ZipWriter::new(sink),
            options,
            entries: BTreeSet::new(),
        }
    }

    /// Whether `entry_path` has already been written.
    pub fn contains(&self, entry_path: &str) -> bool {
        self.entries.contains(entry_path)
    }

    /// Add an in-memory entry. Returns `false` when the path was already
    /// written; the first writer keeps the slot.
    pub fn add_bytes(&mut self, entry_path: &str, contents: &[u8]) -> Result<bool, ArchiveError> {
        if !self.entries.insert(entry_path.to_string()) {
            tracing::debug!("Skipping duplicate archive entry {}", entry_path);
            return Ok(false);
        }
        self.zip
            .start_file(entry_path, self.options)
            .map_err(|e| ArchiveError::Entry(entry_path.to_string(), e))?;
        self.zip.write_all(contents)?;
        Ok(true)
    }

    /// Stream a file from disk into the archive through a bounded buffer.
    pub fn add_file(&mut self, entry_path: &str, disk_path: &Path) -> Result<bool, ArchiveError> {
        if !self.entries.insert(entry_path.to_string()) {
            tracing::debug!("Skipping duplicate archive entry {}", entry_path);
            return Ok(false);
        }
        self.zip
            .start_file(entry_path, self.options)
            .map_err(|e| ArchiveError::Entry(entry_path.to_string(), e))?;

        let mut file = File::open(disk_path)?;
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            self.zip.write_all(&buffer[..read])?;
        }
        Ok(true)
    }

    /// Finalize the central directory and hand the sink back.
    pub fn finish(mut self) -> Result<W, ArchiveError> {
        self.zip.finish().map_err(ArchiveError::Finish)
    }
}
