use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed record at line {line}: {reason}")]
    RecordParse { line: u64, reason: String },

    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
