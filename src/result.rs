use thiserror::Error;

#[derive(Error, Debug)]
pub enum TileError {
    /// The elevation provider failed to deliver a grid. Aborts the export.
    #[error("elevation provider failed: {0}")]
    Provider(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("quads can not be merged: {0}")]
    IncompatibleQuads(String),
    #[error("IO error")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config")]
    RonRead(#[from] ron::error::SpannedError),
    #[error("failed to write config")]
    RonWrite(#[from] ron::Error),
}

pub type TileResult<T> = Result<T, TileError>;
