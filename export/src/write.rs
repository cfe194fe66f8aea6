use crate::result::ExportResult;
use bytemuck::cast_slice;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use terrain_tiles::prelude::*;
use tracing::debug;

/// The file the scene is described in, next to one `<name>.bin` height file per tile.
pub const MANIFEST_FILE: &str = "scene.ron";

/// The description of a written scene. Tile heights are stored out of band.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneManifest {
    pub extent: Extent,
    pub config: TerrainConfig,
    pub tiles: Vec<TileDescriptor>,
    pub summary: ExportSummary,
}

impl SceneManifest {
    pub fn load_file<P: AsRef<Path>>(path: P) -> ExportResult<Self> {
        let encoded = fs::read_to_string(path)?;
        Ok(ron::from_str(&encoded)?)
    }
}

/// The height file of a tile, relative to the scene directory.
pub fn height_file(name: &str) -> String {
    format!("{name}.bin")
}

/// Writes tiles as they are produced, so only one tile is held in memory at a time.
pub struct SceneWriter {
    directory: PathBuf,
    extent: Extent,
    config: TerrainConfig,
    tiles: Vec<TileDescriptor>,
    summary: ExportSummary,
}

impl SceneWriter {
    pub fn new(directory: PathBuf, extent: Extent, config: TerrainConfig) -> Self {
        Self {
            directory,
            extent,
            config,
            tiles: Vec::new(),
            summary: ExportSummary::default(),
        }
    }

    /// Stores the heights as little endian `f32`, row major with the top row first.
    pub fn write_tile(&mut self, mut tile: TileDescriptor) -> ExportResult<()> {
        let path = self.directory.join(height_file(&tile.name));

        if cfg!(target_endian = "little") {
            fs::write(&path, cast_slice::<f32, u8>(&tile.values))?;
        } else {
            let bytes: Vec<u8> = tile
                .values
                .iter()
                .flat_map(|value| value.to_le_bytes())
                .collect();
            fs::write(&path, bytes)?;
        }

        debug!("wrote {}", path.display());

        self.summary.record(&tile);
        tile.values = Vec::new();
        self.tiles.push(tile);

        Ok(())
    }

    /// Writes the manifest and returns what was exported.
    pub fn finish(mut self, cancelled: bool) -> ExportResult<ExportSummary> {
        self.summary.cancelled = cancelled;

        let manifest = SceneManifest {
            extent: self.extent,
            config: self.config,
            tiles: self.tiles,
            summary: self.summary,
        };

        let encoded = ron::ser::to_string_pretty(&manifest, PrettyConfig::default())?;
        fs::write(self.directory.join(MANIFEST_FILE), encoded)?;

        Ok(manifest.summary)
    }
}
