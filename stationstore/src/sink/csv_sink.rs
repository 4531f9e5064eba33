use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::record::{Record, Schema};

use super::append_file::AppendFile;
use super::sink_error::HeaderMismatch;
use super::{SinkAdapter, SinkError, SinkKind};

const KIND: SinkKind = SinkKind::DelimitedFile;

fn terminator() -> csv::Terminator {
    if cfg!(windows) {
        csv::Terminator::CRLF
    } else {
        csv::Terminator::Any(b'\n')
    }
}

/// One delimited line with minimal quoting and the native line terminator.
pub fn encode_row<I, T>(fields: I) -> Result<Vec<u8>, csv::Error>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(terminator())
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer.into_inner().map_err(|e| e.into_error().into())
}

fn parse_header(line: &str) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(|field| field.trim().to_string()).collect()),
        None => Ok(Vec::new()),
    }
}

/// Comma-separated file with a header line naming the schema fields.
pub struct CsvSink {
    path: PathBuf,
    /// Set while a handle with an unfinished append is being closed.
    torn: Option<u64>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> CsvSink {
        CsvSink {
            path: path.into(),
            torn: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_header(&self) -> Result<Option<String>, SinkError> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SinkError::fatal(
                    KIND,
                    format!("read {}: {e}", self.path.display()),
                ))
            }
        };
        let mut line = String::new();
        BufReader::new(file)
            .read_line(&mut line)
            .await
            .map_err(|e| SinkError::fatal(KIND, format!("read {}: {e}", self.path.display())))?;
        Ok(if line.trim().is_empty() { None } else { Some(line) })
    }
}

#[async_trait]
impl SinkAdapter for CsvSink {
    type Handle = AppendFile;

    fn kind(&self) -> SinkKind {
        KIND
    }

    /// Writes the header into a new or empty file, otherwise checks the stored
    /// header name by name and position.
    async fn provision(&mut self, schema: &Schema) -> Result<(), SinkError> {
        match self.read_header().await? {
            Some(line) => {
                let found = parse_header(&line)
                    .map_err(|e| SinkError::fatal(KIND, format!("unreadable header: {e}")))?;
                log::debug!("{KIND}: checking header {found:?}");
                if found.as_slice() != schema.fields() {
                    log::error!(
                        "{KIND}: header in {} does not match the schema",
                        self.path.display()
                    );
                    return Err(HeaderMismatch {
                        sink: KIND,
                        expected: schema.fields().to_vec(),
                        found,
                    }
                    .into());
                }
                let file = AppendFile::create(KIND, &self.path).await?;
                file.close(KIND).await;
            }
            None => {
                log::info!("{KIND}: writing header to {}", self.path.display());
                let header = encode_row(schema.fields())
                    .map_err(|e| SinkError::fatal(KIND, format!("encode header: {e}")))?;
                let mut file = AppendFile::create(KIND, &self.path).await?;
                file.append(KIND, &header)
                    .await
                    .map_err(|e| SinkError::fatal(KIND, format!("write header: {e}")))?;
                file.close(KIND).await;
            }
        }
        Ok(())
    }

    async fn open(&mut self) -> Result<AppendFile, SinkError> {
        let file = AppendFile::open(KIND, &self.path, self.torn).await?;
        self.torn = None;
        Ok(file)
    }

    async fn write_one(&mut self, handle: &mut AppendFile, record: &Record) -> Result<(), SinkError> {
        let line = encode_row(record.values().iter().map(|value| value.to_field()))
            .map_err(|e| SinkError::fatal(KIND, format!("encode record: {e}")))?;
        handle.append(KIND, &line).await
    }

    async fn close(&mut self, handle: AppendFile) {
        // Survives this future being dropped, so the next open can cut back.
        self.torn = handle.pending();
        self.torn = handle.close(KIND).await;
    }
}
