use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::ser::Formatter;

use crate::record::{Record, Schema};

use super::append_file::AppendFile;
use super::{SinkAdapter, SinkError, SinkKind, LINE_TERMINATOR};

const KIND: SinkKind = SinkKind::LineRecordFile;

/// Compact JSON with `", "` between members and `": "` after keys.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

pub fn encode_line(schema: &Schema, record: &Record) -> Result<Vec<u8>, serde_json::Error> {
    let mut serializer = serde_json::Serializer::with_formatter(Vec::new(), SpacedFormatter);
    record.keyed(schema).serialize(&mut serializer)?;
    let mut line = serializer.into_inner();
    line.extend_from_slice(LINE_TERMINATOR.as_bytes());
    Ok(line)
}

/// Headerless file of one JSON object per line, keyed by field name.
pub struct JsonlSink {
    path: PathBuf,
    schema: Option<Schema>,
    torn: Option<u64>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> JsonlSink {
        JsonlSink {
            path: path.into(),
            schema: None,
            torn: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SinkAdapter for JsonlSink {
    type Handle = AppendFile;

    fn kind(&self) -> SinkKind {
        KIND
    }

    async fn provision(&mut self, schema: &Schema) -> Result<(), SinkError> {
        let file = AppendFile::create(KIND, &self.path).await?;
        file.close(KIND).await;
        log::info!("{KIND}: appending records to {}", self.path.display());
        self.schema = Some(schema.clone());
        Ok(())
    }

    async fn open(&mut self) -> Result<AppendFile, SinkError> {
        let file = AppendFile::open(KIND, &self.path, self.torn).await?;
        self.torn = None;
        Ok(file)
    }

    async fn write_one(&mut self, handle: &mut AppendFile, record: &Record) -> Result<(), SinkError> {
        let schema = self
            .schema
            .as_ref()
            .ok_or_else(|| SinkError::fatal(KIND, "write before provisioning"))?;
        let line = encode_line(schema, record)
            .map_err(|e| SinkError::fatal(KIND, format!("encode record: {e}")))?;
        handle.append(KIND, &line).await
    }

    async fn close(&mut self, handle: AppendFile) {
        // Survives this future being dropped, so the next open can cut back.
        self.torn = handle.pending();
        self.torn = handle.close(KIND).await;
    }
}
