use std::fmt::Display;

use async_trait::async_trait;

use crate::record::{Record, Schema};

pub mod append_file;
pub mod csv_sink;
pub mod guard;
pub mod jsonl_sink;
pub mod postgres_sink;
pub mod retry_queue;
pub mod sink_error;

#[cfg(test)]
pub(crate) mod scripted_sink;

pub use sink_error::SinkError;

/// The storage backends a manager can feed, one slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SinkKind {
    Relational,
    DelimitedFile,
    LineRecordFile,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Relational => "relational",
            SinkKind::DelimitedFile => "csv",
            SinkKind::LineRecordFile => "flat",
        }
    }
}

impl Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Native line terminator for every file this crate writes.
pub const LINE_TERMINATOR: &str = if cfg!(windows) { "\r\n" } else { "\n" };

/// A durable storage backend.
///
/// `provision` runs once before the first cycle. Each update then opens a
/// handle, writes queued records one at a time, and closes the handle. The
/// handle is moved into `close`, so a handle is never closed twice.
#[async_trait]
pub trait SinkAdapter: Send {
    type Handle: Send;

    fn kind(&self) -> SinkKind;

    /// Validates or creates the persisted identity. Any failure is fatal.
    async fn provision(&mut self, schema: &Schema) -> Result<(), SinkError>;

    async fn open(&mut self) -> Result<Self::Handle, SinkError>;

    /// Commits exactly one record. A retryable failure must leave nothing of
    /// the record behind.
    async fn write_one(&mut self, handle: &mut Self::Handle, record: &Record)
        -> Result<(), SinkError>;

    /// Releases the handle. Problems are logged here, never returned.
    async fn close(&mut self, handle: Self::Handle);
}
