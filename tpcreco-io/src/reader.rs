//! Memory-mapped step table readers.
//!
//! A step table is a JSON Lines file. The first line is a header naming the
//! table and its version; every following non-blank line holds one event
//! with its steps in arrival order.

use crate::{Error, Result};
use log::debug;
use memmap2::Mmap;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tpcreco_core::source::EventSource;
use tpcreco_core::step::StepEvent;

/// Table name expected in the header line.
pub const STEP_TABLE_NAME: &str = "steps";
/// Supported step table version.
pub const STEP_TABLE_VERSION: u32 = 1;

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without loading the entire file
/// into memory.
pub struct MappedFileReader {
    mmap: Option<Arc<Mmap>>,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// Empty files are not mapped and read back as an empty slice.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mmap = if file.metadata()?.len() == 0 {
            None
        } else {
            // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
            // This is the standard safety contract for memory mapping.
            #[allow(unsafe_code)]
            let mmap = unsafe { Mmap::map(&file) }
                .map_err(|e| Error::MmapError(format!("{}: {e}", path.display())))?;
            Some(Arc::new(mmap))
        };
        Ok(Self { mmap, path })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.mmap.as_deref().map_or(&[][..], |mmap| &mmap[..])
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Deserialize)]
struct TableHeader {
    table: String,
    version: u32,
}

/// Event source over a memory-mapped step table.
pub struct StepFileReader {
    reader: MappedFileReader,
    cursor: usize,
    line: usize,
    events_read: u64,
    steps_read: u64,
}

impl StepFileReader {
    /// Opens a step table and validates its header line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped, or `InvalidFormat` if
    /// the header is missing or names another table or version.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = Self {
            reader: MappedFileReader::open(path)?,
            cursor: 0,
            line: 0,
            events_read: 0,
            steps_read: 0,
        };
        reader.read_header()?;
        debug!(
            "opened step table {} ({} bytes)",
            reader.reader.path().display(),
            reader.reader.len()
        );
        Ok(reader)
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Returns the path of the step table.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Events returned so far.
    #[must_use]
    pub fn events_read(&self) -> u64 {
        self.events_read
    }

    /// Steps returned so far, over all events.
    #[must_use]
    pub fn steps_read(&self) -> u64 {
        self.steps_read
    }

    fn read_header(&mut self) -> Result<()> {
        let path = self.reader.path().display().to_string();
        let Some((_, line)) = self.next_line() else {
            return Err(Error::InvalidFormat(format!("{path}: missing step table header")));
        };
        let header: TableHeader = serde_json::from_slice(line).map_err(|e| {
            Error::InvalidFormat(format!("{path}: line 1 is not a step table header: {e}"))
        })?;
        if header.table != STEP_TABLE_NAME || header.version != STEP_TABLE_VERSION {
            return Err(Error::InvalidFormat(format!(
                "{path}: expected table \"{STEP_TABLE_NAME}\" version {STEP_TABLE_VERSION}, found \"{}\" version {}",
                header.table, header.version
            )));
        }
        Ok(())
    }

    /// Returns the next line (1-based number, contents without the line ending).
    fn next_line(&mut self) -> Option<(usize, &[u8])> {
        let data = self.reader.as_bytes();
        if self.cursor >= data.len() {
            return None;
        }
        let rest = &data[self.cursor..];
        let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
        self.cursor += end + 1;
        self.line += 1;

        let line = &rest[..end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Some((self.line, line))
    }

    /// Reads the next event, skipping blank lines.
    ///
    /// Steps take their event ID from the enclosing event line.
    ///
    /// # Errors
    /// Returns `InvalidFormat` with the line number if a line is not a
    /// valid event.
    pub fn read_event(&mut self) -> Result<Option<StepEvent>> {
        let path = self.reader.path().display().to_string();
        loop {
            let Some((number, line)) = self.next_line() else {
                return Ok(None);
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let mut event: StepEvent = serde_json::from_slice(line)
                .map_err(|e| Error::InvalidFormat(format!("{path}: line {number}: {e}")))?;
            for step in &mut event.steps {
                step.event_id = event.event_id;
            }

            self.events_read += 1;
            self.steps_read += event.steps.len() as u64;
            return Ok(Some(event));
        }
    }
}

impl EventSource for StepFileReader {
    fn next_event(&mut self) -> tpcreco_core::Result<Option<StepEvent>> {
        self.read_event().map_err(Error::into_source)
    }
}
