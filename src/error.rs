use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CuratorError {
    #[error("malformed field: {0}")]
    Format(String),

    #[error("invalid accession: {0}")]
    InvalidAccession(String),

    #[error("invalid organism kind: {0}")]
    InvalidKind(String),

    #[error("range {start}..{stop} is outside the sequence (length {length})")]
    OutOfRange { start: u64, stop: u64, length: u64 },

    #[error("no sequence bin covers position {0}")]
    MissingBin(u64),

    #[error("missing config file gbcur.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("retrieval request failed: {0}")]
    FetchHttp(String),

    #[error("retrieval returned status {status}: {message}")]
    FetchStatus { status: u16, message: String },

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("external process interrupted: {0}")]
    Process(String),

    #[error("download incomplete after {rounds} round(s); {missing} accession(s) still missing")]
    RetryLimit { rounds: u32, missing: usize },

    #[error("persistence failed: {0}")]
    Persistence(String),
}
