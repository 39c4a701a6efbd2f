// src/error.rs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("refusing to write an empty target address list")]
    EmptyTargets,

    #[error("sentinel address is not a valid pool address: {0}")]
    InvalidSentinel(String),

    #[error("handoff file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl HandoffError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HandoffError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, HandoffError>;
