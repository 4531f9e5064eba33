use std::path::PathBuf;

use thiserror::Error;

pub mod db_config;
pub mod options;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        inner: std::io::Error,
    },

    #[error("malformed configuration")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
