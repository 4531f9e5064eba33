use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{SinkError, SinkKind};

/// Bounds every adapter call with a deadline and a cancellation token. An
/// attempt that times out or is cancelled counts as a retryable failure.
#[derive(Debug, Clone)]
pub struct IoGuard {
    timeout: Duration,
    cancel: CancellationToken,
}

impl IoGuard {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> IoGuard {
        IoGuard { timeout, cancel }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run<T, F>(&self, sink: SinkKind, operation: &str, future: F) -> Result<T, SinkError>
    where
        F: Future<Output = Result<T, SinkError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(SinkError::retryable(sink, format!("{operation} cancelled")))
            }
            result = tokio::time::timeout(self.timeout, future) => match result {
                Ok(result) => result,
                Err(_) => Err(SinkError::retryable(
                    sink,
                    format!("{operation} timed out after {:?}", self.timeout),
                )),
            },
        }
    }
}
