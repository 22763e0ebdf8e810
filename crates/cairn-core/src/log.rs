//! The append-only ledger file.
//!
//! # Layout
//!
//! ```text
//! .cairn/
//!   ledger.jsonl    # one canonical JSON event per line
//!   ledger.lock     # advisory writer lock (sidecar, never holds data)
//!   config.toml     # optional settings
//! ```
//!
//! # Invariants
//!
//! - Every append happens under the exclusive [`LedgerLock`].
//! - A batch is encoded up front and written with a single `write_all` on an
//!   `O_APPEND` handle, so its lines land contiguously.
//! - A torn trailing line (crash mid-write) is closed off with a newline
//!   before the next append. The fragment stays in the file and is skipped
//!   on every read.
//! - Readers never lock.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write as IoWrite};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::LedgerError;
use crate::event::{self, Event};
use crate::lock::LedgerLock;

/// File name of the ledger inside the `.cairn` directory.
pub const LEDGER_FILE: &str = "ledger.jsonl";
/// File name of the writer lock inside the `.cairn` directory.
pub const LOCK_FILE: &str = "ledger.lock";

/// A decoded line together with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub event: Event,
}

/// A line that failed to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: String,
}

/// Result of a tolerant scan: good records plus whatever was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedLine>,
}

impl Scan {
    /// Drop line numbers and keep only the events.
    #[must_use]
    pub fn into_events(self) -> Vec<Event> {
        self.records.into_iter().map(|r| r.event).collect()
    }
}

/// Handle on one ledger file.
#[derive(Debug, Clone)]
pub struct AppendLog {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    durable: bool,
}

impl AppendLog {
    /// Handle for the ledger inside `cairn_dir` (usually `<root>/.cairn`).
    pub fn new(cairn_dir: impl AsRef<Path>) -> Self {
        let dir = cairn_dir.as_ref();
        Self {
            path: dir.join(LEDGER_FILE),
            lock_path: dir.join(LOCK_FILE),
            lock_timeout: Duration::from_secs(5),
            durable: true,
        }
    }

    /// Override the lock wait bound and the fsync policy.
    #[must_use]
    pub const fn with_options(mut self, lock_timeout: Duration, durable: bool) -> Self {
        self.lock_timeout = lock_timeout;
        self.durable = durable;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create the directory and an empty ledger if they do not exist yet.
    ///
    /// Returns `true` if the ledger file was created.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the directory or file cannot be created.
    pub fn create(&self) -> Result<bool, LedgerError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Append a single event.
    ///
    /// # Errors
    ///
    /// See [`AppendLog::append_all`].
    pub fn append(&self, event: &Event) -> Result<(), LedgerError> {
        self.append_all(std::slice::from_ref(event)).map(|_| ())
    }

    /// Append a batch of events atomically with respect to other writers.
    ///
    /// Every event is encoded before the lock is taken; an encoding failure
    /// writes nothing. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Encode`] if an event cannot be serialized,
    /// [`LedgerError::LockTimeout`] if the lock is held for longer than the
    /// configured bound, or [`LedgerError::Io`] if the write fails.
    pub fn append_all(&self, events: &[Event]) -> Result<usize, LedgerError> {
        if events.is_empty() {
            return Ok(0);
        }
        let batch = encode_batch(events)?;
        let _lock = LedgerLock::acquire(&self.lock_path, self.lock_timeout)?;
        self.write_locked(batch, events.len())
    }

    /// Read, decide, and append under one lock hold.
    ///
    /// `decide` sees every event currently in the ledger and returns the
    /// events to append plus a value for the caller. No other writer can
    /// append between the read and the write, so checks made inside
    /// `decide` still hold when its events land. Returning an error or an
    /// empty batch writes nothing.
    ///
    /// # Errors
    ///
    /// Whatever `decide` returns, plus the errors of [`AppendLog::append_all`].
    pub fn transact<T, F>(&self, decide: F) -> Result<T, LedgerError>
    where
        F: FnOnce(Vec<Event>) -> Result<(Vec<Event>, T), LedgerError>,
    {
        let _lock = LedgerLock::acquire(&self.lock_path, self.lock_timeout)?;
        let current = self.read_all()?;
        let (events, out) = decide(current)?;
        if !events.is_empty() {
            let batch = encode_batch(&events)?;
            self.write_locked(batch, events.len())?;
        }
        Ok(out)
    }

    /// Write an encoded batch. The caller holds the lock.
    fn write_locked(&self, mut batch: String, count: usize) -> Result<usize, LedgerError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        if has_torn_tail(&mut file)? {
            tracing::warn!(
                path = %self.path.display(),
                "ledger ends with an incomplete line; closing it before appending"
            );
            batch.insert(0, '\n');
        }

        file.write_all(batch.as_bytes())?;
        file.flush()?;

        if self.durable {
            file.sync_data()?;
        }

        tracing::debug!(events = count, bytes = batch.len(), "appended to ledger");
        Ok(batch.len())
    }

    /// Read every decodable record, skipping blank and malformed lines.
    ///
    /// A missing ledger reads as empty. Malformed lines are reported through
    /// `tracing::warn!` and in [`Scan::skipped`].
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the file exists but cannot be read.
    pub fn scan(&self) -> Result<Scan, LedgerError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Scan::default()),
            Err(e) => return Err(e.into()),
        };

        let mut scan = Scan::default();
        for (idx, raw) in bytes.split(|&b| b == b'\n').enumerate() {
            let line_no = idx + 1;
            let text = String::from_utf8_lossy(raw);
            if text.trim().is_empty() {
                continue;
            }
            match event::decode(&text) {
                Ok(event) => scan.records.push(Record {
                    line: line_no,
                    event,
                }),
                Err(e) => {
                    tracing::warn!(line = line_no, error = %e, "skipping malformed ledger record");
                    scan.skipped.push(SkippedLine {
                        line: line_no,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(scan)
    }

    /// Read every decodable event in file order.
    ///
    /// # Errors
    ///
    /// Same as [`AppendLog::scan`].
    pub fn read_all(&self) -> Result<Vec<Event>, LedgerError> {
        Ok(self.scan()?.into_events())
    }

    /// Read every event, failing on the first malformed line.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MalformedRecord`] naming the first bad line.
    pub fn read_strict(&self) -> Result<Vec<Event>, LedgerError> {
        let scan = self.scan()?;
        if let Some(bad) = scan.skipped.into_iter().next() {
            return Err(LedgerError::MalformedRecord {
                line: bad.line,
                reason: bad.reason,
            });
        }
        Ok(scan.records.into_iter().map(|r| r.event).collect())
    }

    /// Modification time and length of the ledger, `None` if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the metadata cannot be read.
    pub fn modified(&self) -> Result<Option<(SystemTime, u64)>, LedgerError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some((meta.modified()?, meta.len()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn encode_batch(events: &[Event]) -> Result<String, LedgerError> {
    let mut batch = String::new();
    for event in events {
        batch.push_str(&event::encode_line(event)?);
    }
    Ok(batch)
}

/// Whether the file is non-empty and its last byte is not a newline.
fn has_torn_tail(file: &mut File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0_u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}
