use std::fmt::Display;
use std::io::ErrorKind;

use thiserror::Error;

use super::SinkKind;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("{sink} sink is unreachable: {message}")]
    Retryable { sink: SinkKind, message: String },

    #[error("{sink} sink failed: {message}")]
    Fatal { sink: SinkKind, message: String },

    #[error("{sink} sink postgres error: {inner}")]
    Postgres {
        sink: SinkKind,
        #[source]
        inner: tokio_postgres::Error,
    },

    #[error("stored header does not match the schema")]
    HeaderMismatch(#[from] HeaderMismatch),
}

impl SinkError {
    pub fn retryable(sink: SinkKind, message: impl Into<String>) -> SinkError {
        SinkError::Retryable {
            sink,
            message: message.into(),
        }
    }

    pub fn fatal(sink: SinkKind, message: impl Into<String>) -> SinkError {
        SinkError::Fatal {
            sink,
            message: message.into(),
        }
    }

    /// Connectivity-class faults are retried on the next update. Everything
    /// else needs an operator.
    pub fn is_retryable(&self) -> bool {
        match self {
            SinkError::Retryable { .. } => true,
            SinkError::Postgres { inner, .. } => is_connectivity_error(inner),
            SinkError::Fatal { .. } | SinkError::HeaderMismatch(_) => false,
        }
    }

    pub fn sink(&self) -> SinkKind {
        match self {
            SinkError::Retryable { sink, .. }
            | SinkError::Fatal { sink, .. }
            | SinkError::Postgres { sink, .. } => *sink,
            SinkError::HeaderMismatch(mismatch) => mismatch.sink,
        }
    }

    /// Classifies a filesystem error by kind. A vanished mount looks like
    /// not-found or a network error, so those are retryable.
    pub fn from_io(sink: SinkKind, context: &str, error: std::io::Error) -> SinkError {
        let message = format!("{context}: {error}");
        match error.kind() {
            ErrorKind::NotFound
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::TimedOut
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
            | ErrorKind::UnexpectedEof => SinkError::retryable(sink, message),
            _ => SinkError::fatal(sink, message),
        }
    }
}

/// SQLSTATE classes that mean the server went away or refused us for now.
fn is_retryable_sqlstate(code: &str) -> bool {
    code.starts_with("08")
        || code.starts_with("53")
        || matches!(code, "57P01" | "57P02" | "57P03")
}

pub fn is_connectivity_error(error: &tokio_postgres::Error) -> bool {
    if let Some(db_error) = error.as_db_error() {
        return is_retryable_sqlstate(db_error.code().code());
    }
    if error.is_closed() {
        return true;
    }
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        if cause.is::<std::io::Error>() {
            return true;
        }
        source = cause.source();
    }
    false
}

#[derive(Debug, Error)]
pub struct HeaderMismatch {
    pub sink: SinkKind,
    pub expected: Vec<String>,
    pub found: Vec<String>,
}

impl Display for HeaderMismatch {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("HeaderMismatch")
            .field("sink", &self.sink)
            .field("expected", &self.expected)
            .field("found", &self.found)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_split_on_kind() {
        let gone = std::io::Error::new(ErrorKind::NotFound, "mount is gone");
        assert!(SinkError::from_io(SinkKind::DelimitedFile, "open", gone).is_retryable());

        let denied = std::io::Error::new(ErrorKind::PermissionDenied, "read only");
        let error = SinkError::from_io(SinkKind::DelimitedFile, "open", denied);
        assert!(!error.is_retryable());
        assert_eq!(error.sink(), SinkKind::DelimitedFile);
    }

    #[test]
    fn sqlstate_classes() {
        assert!(is_retryable_sqlstate("08006"));
        assert!(is_retryable_sqlstate("57P03"));
        assert!(is_retryable_sqlstate("53300"));
        assert!(!is_retryable_sqlstate("28P01"));
        assert!(!is_retryable_sqlstate("42P01"));
        assert!(!is_retryable_sqlstate("22003"));
    }

    #[test]
    fn header_mismatch_is_fatal() {
        let error = SinkError::from(HeaderMismatch {
            sink: SinkKind::DelimitedFile,
            expected: vec!["time".to_string()],
            found: vec!["date".to_string()],
        });
        assert!(!error.is_retryable());
    }
}
