use stationstore::{Record, Schema};
use tokio::io::{AsyncRead, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

#[derive(thiserror::Error, Debug)]
pub enum InputError {
    #[error("not a JSON array of values: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected {expected} values, got {actual}")]
    Width { expected: usize, actual: usize },
}

/// One JSON array per line, in schema order. Blank lines yield `None`.
pub fn parse_record(line: &str, schema: &Schema) -> Result<Option<Record>, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let record: Record = serde_json::from_str(line)?;
    if !record.fits(schema) {
        return Err(InputError::Width {
            expected: schema.len(),
            actual: record.len(),
        });
    }
    Ok(Some(record))
}

/// Records read line by line from a reader, usually stdin. Lines that do
/// not parse are logged and skipped.
pub struct RecordLines<R> {
    lines: LinesStream<BufReader<R>>,
    schema: Schema,
    line_number: usize,
}

impl<R> RecordLines<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R, schema: Schema) -> RecordLines<R> {
        RecordLines {
            lines: LinesStream::new(BufReader::new(reader).lines()),
            schema,
            line_number: 0,
        }
    }

    /// The next well-formed record, or `None` at end of input.
    pub async fn next_record(&mut self) -> Option<Record> {
        while let Some(line) = self.lines.next().await {
            self.line_number += 1;
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::error!("input read failed at line {}: {e}", self.line_number);
                    return None;
                }
            };
            match parse_record(&line, &self.schema) {
                Ok(Some(record)) => return Some(record),
                Ok(None) => continue,
                Err(e) => log::warn!("skipping input line {}: {e}", self.line_number),
            }
        }
        None
    }
}
