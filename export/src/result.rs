use terrain_tiles::result::TileError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("TIFF error")]
    Tiff(#[from] tiff::TiffError),
    #[error("the source raster is not georeferenced")]
    MissingGeoreference,
    #[error("the source raster has an invalid shape")]
    InvalidShape(#[from] ndarray::ShapeError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("the scene directory {0} is not empty, pass --overwrite to replace it")]
    SceneExists(String),
    #[error(transparent)]
    Tile(#[from] TileError),
    #[error("IO error")]
    Io(#[from] std::io::Error),
    #[error("failed to read the scene manifest")]
    RonRead(#[from] ron::error::SpannedError),
    #[error("failed to write the scene manifest")]
    RonWrite(#[from] ron::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;
