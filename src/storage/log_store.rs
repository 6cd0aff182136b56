// Append-only key-value log
//
// File format: a sequence of [i32 little-endian length][payload] frames,
// alternating key and value. No header, footer or checksum.

use crate::error::{Error, Result};
use crate::storage::KvStore;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Key-value store backed by a single append-only log file.
///
/// Every operation holds the store's lock for its whole duration, so an
/// in-place `update` is never observed half-written by this process.
/// A crash mid-write can still leave a truncated log behind.
pub struct LogStore {
    name: String,
    path: PathBuf,
    file: Mutex<File>,
}

impl LogStore {
    /// Open (or create) the log `name` under `dir`
    pub fn open<P: AsRef<Path>>(dir: P, name: &str) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        log::info!("Opened log store {} at {}", name, path.display());
        Ok(Self {
            name: name.to_string(),
            path,
            file: Mutex::new(file),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current size of the log in bytes
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl KvStore for LogStore {
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut record = Vec::with_capacity(8 + key.len() + value.len());
        push_frame(&mut record, key)?;
        push_frame(&mut record, value)?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::End(0))?;
        file.write_all(&record)?;
        file.flush()?;

        log::trace!("{}: appended {} byte key, {} byte value", self.name, key.len(), value.len());
        Ok(())
    }

    /// First record whose key matches wins
    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let mut file = self.file.lock();
        let mut scanner = Scanner::new(&mut *file)?;

        match scanner.find(key)? {
            Some(value_len) => {
                log::trace!("{}: {} byte value at offset {}", self.name, value_len, scanner.offset);
                scanner.read_payload(value_len, "log value")
            }
            None => {
                log::trace!("{}: key not found after scanning {} bytes", self.name, scanner.offset);
                Err(Error::NotFound)
            }
        }
    }

    /// Rewrite the value of the first matching record in place, shifting
    /// every later byte and truncating the file to its new length
    fn update(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut file = self.file.lock();

        let (value_pos, old_len) = {
            let mut scanner = Scanner::new(&mut *file)?;
            match scanner.find(key)? {
                Some(value_len) => (scanner.offset - 4, value_len),
                None => return Err(Error::NotFound),
            }
        };

        let mut tail = Vec::new();
        file.seek(SeekFrom::Start(value_pos + 4 + old_len as u64))?;
        file.read_to_end(&mut tail)?;

        let mut rewrite = Vec::with_capacity(4 + value.len() + tail.len());
        push_frame(&mut rewrite, value)?;
        rewrite.extend_from_slice(&tail);

        file.seek(SeekFrom::Start(value_pos))?;
        file.write_all(&rewrite)?;
        file.set_len(value_pos + rewrite.len() as u64)?;
        file.flush()?;

        log::trace!(
            "{}: updated value at offset {} ({} -> {} bytes, {} tail bytes moved)",
            self.name,
            value_pos,
            old_len,
            value.len(),
            tail.len()
        );
        Ok(())
    }
}

/// Append a length-prefixed frame
fn push_frame(buf: &mut Vec<u8>, payload: &[u8]) -> Result<()> {
    let len = i32::try_from(payload.len()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "payload larger than i32::MAX bytes")
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(())
}

/// Forward reader over the frames of a log file
struct Scanner<'a> {
    reader: BufReader<&'a mut File>,
    offset: u64,
    end: u64,
}

impl<'a> Scanner<'a> {
    fn new(file: &'a mut File) -> Result<Self> {
        let end = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            reader: BufReader::new(file),
            offset: 0,
            end,
        })
    }

    /// Read the next length prefix; `None` at a clean end of log
    fn next_len(&mut self, field: &'static str) -> Result<Option<usize>> {
        if self.offset == self.end {
            return Ok(None);
        }
        if self.end - self.offset < 4 {
            return Err(Error::TruncatedRecord { field });
        }

        let mut prefix = [0u8; 4];
        self.reader.read_exact(&mut prefix)?;
        let len = i32::from_le_bytes(prefix);
        let len = usize::try_from(len).map_err(|_| Error::CorruptLog { offset: self.offset })?;
        self.offset += 4;

        if (self.end - self.offset) < len as u64 {
            return Err(Error::TruncatedRecord { field });
        }
        Ok(Some(len))
    }

    fn read_payload(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>> {
        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::TruncatedRecord { field },
            _ => Error::Io(e),
        })?;
        self.offset += len as u64;
        Ok(payload)
    }

    fn skip_payload(&mut self, len: usize) -> Result<()> {
        self.reader.seek_relative(len as i64)?;
        self.offset += len as u64;
        Ok(())
    }

    /// Scan to the first record keyed by `key`. On a match the scanner sits
    /// just past the value's length prefix and the value length is returned.
    fn find(&mut self, key: &[u8]) -> Result<Option<usize>> {
        while let Some(key_len) = self.next_len("log key")? {
            let matches = if key_len == key.len() {
                self.read_payload(key_len, "log key")? == key
            } else {
                self.skip_payload(key_len)?;
                false
            };

            let value_len = self
                .next_len("log value")?
                .ok_or(Error::TruncatedRecord { field: "log value" })?;
            if matches {
                return Ok(Some(value_len));
            }
            self.skip_payload(value_len)?;
        }
        Ok(None)
    }
}
