// Snapshot capture and persistence.
//
// A snapshot is the full text of the active document at one instant
// (truncated to whole seconds), written verbatim to a file named after
// that instant inside the working directory.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use autosnap_common::naming::{snapshot_file_name, truncate_to_seconds};
use chrono::{DateTime, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// One captured copy of the active document. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    timestamp: DateTime<Utc>,
    content: Vec<u8>,
}

impl SnapshotRecord {
    pub fn new(timestamp: DateTime<Utc>, content: impl Into<Vec<u8>>) -> Self {
        Self { timestamp: truncate_to_seconds(timestamp), content: content.into() }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

// ── Content sources ─────────────────────────────────────────────────

/// Supplies the text of whatever document is currently active.
///
/// `Ok(None)` means there is no active editable content; the tick then ends
/// quietly.
pub trait ContentSource: Send + Sync + 'static {
    fn active_content(&self) -> std::io::Result<Option<Vec<u8>>>;
}

/// Treats a file on disk as the active document. A missing file means
/// nothing is active.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentSource for FileSource {
    fn active_content(&self) -> std::io::Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// In-memory document buffer that an editor integration keeps up to date.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    text: Arc<Mutex<Option<String>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active document's text.
    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock().unwrap_or_else(PoisonError::into_inner) = Some(text.into());
    }

    /// No document is focused anymore.
    pub fn clear(&self) {
        *self.text.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl ContentSource for SharedBuffer {
    fn active_content(&self) -> std::io::Result<Option<Vec<u8>>> {
        let text = self.text.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(text.as_ref().map(|text| text.as_bytes().to_vec()))
    }
}

// ── Clock ───────────────────────────────────────────────────────────

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CaptureError(pub std::io::Error);

impl Display for CaptureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to read active document: {}", self.0)
    }
}

impl Error for CaptureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

#[derive(Debug)]
pub struct WriteError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to write snapshot `{}`: {}", self.path.display(), self.source)
    }
}

impl Error for WriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

// ── Writer ──────────────────────────────────────────────────────────

pub struct SnapshotWriter<S, C = SystemClock> {
    source: S,
    clock: C,
}

impl<S: ContentSource> SnapshotWriter<S, SystemClock> {
    pub fn new(source: S) -> Self {
        Self { source, clock: SystemClock }
    }
}

impl<S: ContentSource, C: Clock> SnapshotWriter<S, C> {
    pub fn with_clock(source: S, clock: C) -> Self {
        Self { source, clock }
    }

    /// Take a snapshot of the active document, if there is one.
    pub fn capture(&self) -> Result<Option<SnapshotRecord>, CaptureError> {
        let content = self.source.active_content().map_err(CaptureError)?;
        Ok(content.map(|content| SnapshotRecord::new(self.clock.now(), content)))
    }

    /// Write `record` into `directory` and return the new file's path.
    ///
    /// A file left over from the same second is overwritten (last write wins).
    pub async fn persist(
        &self,
        record: &SnapshotRecord,
        directory: &Path,
    ) -> Result<PathBuf, WriteError> {
        let path = directory.join(snapshot_file_name(record.timestamp()));
        let to_error = |source| WriteError { path: path.clone(), source };

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                warn!(path = %path.display(), "snapshot for this second already exists, overwriting");
                OpenOptions::new().write(true).truncate(true).open(&path).await.map_err(to_error)?
            }
            Err(error) => return Err(to_error(error)),
        };

        file.write_all(record.content()).await.map_err(to_error)?;
        file.flush().await.map_err(to_error)?;
        file.sync_all().await.map_err(to_error)?;

        debug!(path = %path.display(), bytes = record.content().len(), "snapshot written");
        Ok(path)
    }
}
