//! Append-only JSON-lines audit journal
//!
//! Records are handed to a bounded channel and written by a dedicated
//! thread, so the Audit stage never waits on disk. When the buffer is full
//! the record is dropped and the caller receives [`AuditError::Full`].

use super::{AuditError, AuditRecord, AuditSink};
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

/// Default channel depth between the Audit stage and the writer thread
pub const DEFAULT_JOURNAL_BUFFER: usize = 4096;

pub struct JournalAuditSink {
    sender: Option<Sender<AuditRecord>>,
    thread_handle: Option<thread::JoinHandle<()>>,
    written: Arc<AtomicU64>,
    path: PathBuf,
}

impl JournalAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        Self::with_buffer(path, DEFAULT_JOURNAL_BUFFER)
    }

    /// Open (or create) `path` for appending and start the writer thread
    pub fn with_buffer(path: impl Into<PathBuf>, buffer: usize) -> Result<Self, AuditError> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let (sender, receiver) = bounded(buffer.max(1));
        let written = Arc::new(AtomicU64::new(0));

        let handle = {
            let written = written.clone();
            let path = path.clone();
            thread::Builder::new()
                .name("audit-journal".to_string())
                .spawn(move || Self::writer_loop(path, file, receiver, written))?
        };

        info!(path = %path.display(), buffer, "Audit journal opened");

        Ok(Self {
            sender: Some(sender),
            thread_handle: Some(handle),
            written,
            path,
        })
    }

    fn writer_loop(path: PathBuf, file: File, receiver: Receiver<AuditRecord>, written: Arc<AtomicU64>) {
        let mut writer = BufWriter::new(file);

        for record in receiver {
            match serde_json::to_string(&record) {
                Ok(json) => {
                    if let Err(e) = writeln!(writer, "{}", json) {
                        error!("Failed to write audit record to {:?}: {}", path, e);
                        continue;
                    }
                    written.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => error!("Failed to serialize audit record: {}", e),
            }
        }

        // Sender dropped: flush and exit
        if let Err(e) = writer.flush() {
            error!("Failed to flush audit journal {:?}: {}", path, e);
        }
        info!("Audit journal writer stopping");
    }

    /// Records successfully written so far
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JournalAuditSink {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        let sender = self.sender.as_ref().ok_or(AuditError::Closed)?;
        sender.try_send(record).map_err(|e| match e {
            TrySendError::Full(_) => AuditError::Full,
            TrySendError::Disconnected(_) => AuditError::Closed,
        })
    }
}

impl Drop for JournalAuditSink {
    fn drop(&mut self) {
        // Closing the channel ends the writer loop
        let _ = self.sender.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for JournalAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalAuditSink")
            .field("path", &self.path)
            .field("written", &self.written())
            .finish()
    }
}

/// Read every record from a journal file
pub fn read_journal(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>, AuditError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
