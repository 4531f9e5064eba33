use thiserror::Error;

use crate::config::ConfigError;
use crate::sink::{SinkError, SinkKind};

pub mod managed_sink;
pub mod write_manager;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("record has {actual} values but the schema has {expected} fields")]
    RecordShape { expected: usize, actual: usize },

    #[error("a {0} sink is already attached")]
    DuplicateSink(SinkKind),

    #[error("no {0} sink is enabled")]
    NotEnabled(SinkKind),

    #[error("provisioning the {kind} sink failed: {source}")]
    Provision { kind: SinkKind, source: SinkError },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ManagerError {
    /// True only for connectivity-class sink failures, which a caller doing its
    /// own backoff may retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ManagerError::Sink(e) => e.is_retryable(),
            _ => false,
        }
    }
}
