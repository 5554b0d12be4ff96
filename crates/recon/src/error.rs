use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (empty file name, zero page size, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A required input file does not exist.
    #[error("missing input file: {path}")]
    MissingInput { path: String },
    /// A required input collection has no usable entries.
    #[error("no {what} found")]
    EmptyInput { what: String },
    /// Snapshot file is not the expected JSON shape.
    #[error("cannot parse {path}: {message}")]
    SnapshotParse { path: String, message: String },
    /// IO error (file read, etc.).
    #[error("IO error: {0}")]
    Io(String),
    /// Report serialization or write failure.
    #[error("report write error: {0}")]
    ReportWrite(String),
}

impl ReconError {
    pub fn empty(what: impl Into<String>) -> Self {
        Self::EmptyInput { what: what.into() }
    }
}
