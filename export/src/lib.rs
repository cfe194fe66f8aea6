mod cli;
mod dataset;
mod result;
mod write;

use crate::cli::ExportBar;
use std::time::Instant;
use terrain_tiles::prelude::*;
use tracing::info;

pub use crate::{
    dataset::{ExportContext, SourceRaster},
    result::{ExportError, ExportResult},
    write::{height_file, SceneManifest, SceneWriter, MANIFEST_FILE},
};

pub mod prelude {
    pub use crate::{
        cli::Cli,
        dataset::{ExportContext, SourceRaster},
        export, export_terrain,
        result::{ExportError, ExportResult},
        write::SceneManifest,
    };
}

/// Exports the map view of the source raster into the scene directory.
pub fn export(context: &ExportContext) -> ExportResult<ExportSummary> {
    let raster = SourceRaster::load(&context.src_path)?;
    let extent = context.extent(&raster.bounds);

    export_terrain(&raster.sampler, extent, context, &CancellationToken::new())
}

/// Assembles the tiles of `extent` and writes them as they are produced.
///
/// A cancelled export still writes a manifest for the tiles produced so far.
pub fn export_terrain<S: GridSampler>(
    sampler: &S,
    extent: Extent,
    context: &ExportContext,
    cancel: &CancellationToken,
) -> ExportResult<ExportSummary> {
    let start_export = Instant::now();

    context.prepare_scene_directory()?;

    let mut writer = SceneWriter::new(context.scene_path.clone(), extent, context.config.clone());

    let cancelled = if context.config.focus.is_some() {
        let progress_bar = ExportBar::new("Sampling".to_string());
        let quads = QuadtreeAssembler::new(&context.config, extent)?.materialize_quads(
            sampler,
            &AssemblyContext::new(cancel.clone()).with_progress(progress_bar.callback()),
        )?;
        progress_bar.finish();

        let mut tiles = quads.reconcile_and_stream(AssemblyContext::new(cancel.clone()))?;
        for tile in &mut tiles {
            writer.write_tile(tile)?;
        }

        tiles.cancelled()
    } else {
        let progress_bar = ExportBar::new("Assembling".to_string());
        let mut tiles = RingAssembler::new(&context.config, extent)?.blocks(
            sampler,
            AssemblyContext::new(cancel.clone()).with_progress(progress_bar.callback()),
        );
        for tile in &mut tiles {
            writer.write_tile(tile?)?;
        }
        progress_bar.finish();

        tiles.cancelled()
    };

    let summary = writer.finish(cancelled)?;

    info!(
        "exported {} tiles to {} in {:?}",
        summary.tile_count,
        context.scene_path.display(),
        start_export.elapsed()
    );

    Ok(summary)
}
