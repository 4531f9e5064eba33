use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{SinkError, SinkKind};

/// An append-mode file handle that writes whole lines or nothing.
///
/// tokio finishes a file write on the blocking pool even when the future
/// driving it is dropped, so a timed out append can still land. The length
/// before each append is held in `pending` until the append returns; a later
/// append, `close`, or the next `open` cuts the file back to it.
pub struct AppendFile {
    file: File,
    path: PathBuf,
    pending: Option<u64>,
}

impl AppendFile {
    /// Opens an existing file for appending. A missing file means the storage
    /// mount is unavailable, which is retryable; it is never recreated here.
    ///
    /// `torn` is the length to cut back to when the previous handle was
    /// abandoned with an append in flight.
    pub async fn open(
        sink: SinkKind,
        path: &Path,
        torn: Option<u64>,
    ) -> Result<AppendFile, SinkError> {
        match tokio::fs::try_exists(path).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(SinkError::retryable(
                    sink,
                    format!("{} is not reachable", path.display()),
                ))
            }
            Err(e) => return Err(SinkError::from_io(sink, "stat", e)),
        }
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .await
            .map_err(|e| SinkError::from_io(sink, "open", e))?;
        let mut file = AppendFile {
            file,
            path: path.to_path_buf(),
            pending: torn,
        };
        file.settle(sink).await?;
        Ok(file)
    }

    /// Creates the file if needed. Used at provisioning, where any failure is
    /// fatal.
    pub async fn create(sink: SinkKind, path: &Path) -> Result<AppendFile, SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| SinkError::fatal(sink, format!("create {}: {e}", path.display())))?;
        Ok(AppendFile {
            file,
            path: path.to_path_buf(),
            pending: None,
        })
    }

    /// Length to cut back to if this handle is abandoned now.
    pub fn pending(&self) -> Option<u64> {
        self.pending
    }

    /// Cuts back an append that never reported success.
    async fn settle(&mut self, sink: SinkKind) -> Result<(), SinkError> {
        let Some(length) = self.pending else {
            return Ok(());
        };
        // Waits for a write still running on the blocking pool.
        if let Err(e) = self.file.flush().await {
            log::debug!("{sink}: interrupted append to {} failed: {e}", self.path.display());
        }
        let current = self
            .file
            .metadata()
            .await
            .map_err(|e| SinkError::from_io(sink, "stat", e))?
            .len();
        if current > length {
            log::warn!(
                "{sink}: cutting an interrupted append out of {}",
                self.path.display()
            );
            self.file
                .set_len(length)
                .await
                .map_err(|e| SinkError::from_io(sink, "truncate", e))?;
        }
        self.pending = None;
        Ok(())
    }

    /// Appends one encoded line. On failure the file is cut back to its
    /// previous length so no partial line survives.
    pub async fn append(&mut self, sink: SinkKind, line: &[u8]) -> Result<(), SinkError> {
        self.settle(sink).await?;
        let length = self
            .file
            .metadata()
            .await
            .map_err(|e| SinkError::from_io(sink, "stat", e))?
            .len();
        self.pending = Some(length);
        let written = async {
            self.file.write_all(line).await?;
            self.file.flush().await
        }
        .await;
        match written {
            Ok(()) => {
                self.pending = None;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.settle(sink).await {
                    log::warn!(
                        "{sink}: could not roll back partial line in {}: {rollback}",
                        self.path.display()
                    );
                }
                Err(SinkError::from_io(sink, "append", e))
            }
        }
    }

    /// Flushes and syncs. Returns the length still owed a cut back when an
    /// interrupted append could not be undone.
    pub async fn close(mut self, sink: SinkKind) -> Option<u64> {
        if let Err(e) = self.settle(sink).await {
            log::warn!("{sink}: {e}");
        }
        let synced = async {
            self.file.flush().await?;
            self.file.sync_data().await
        }
        .await;
        if let Err(e) = synced {
            log::warn!("{sink}: error closing {}: {e}", self.path.display());
        }
        self.pending
    }
}
