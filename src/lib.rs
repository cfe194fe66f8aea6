//! This crate assembles the height field of a map view into tiles of varying level of detail,
//! ready to be written out as a web scene.
//!
//! # Background
//! A terrain scene has to show the area around the point of interest in full detail, while the
//! surroundings only need enough samples to give context.
//! Sampling everything at full resolution would multiply the size of the scene for no visible gain.
//!
//! ## Where to sample densely?
//! There are two layouts.
//! The ring layout places equally sized blocks in concentric rings around the map view.
//! The center block is sampled at full resolution, all others are roughened.
//! The quadtree layout subdivides the map view wherever it touches a focus area,
//! so the sample density increases towards the focus.
//! See the [`assembly`] module for more information.
//!
//! ## How to avoid cracks?
//! Neighboring tiles of different resolution do not agree on the heights along their shared edge.
//! Before the tiles are handed out, the edges of the finer tiles are resampled from their coarser
//! neighbors. See [`assembly::stitch`] for more information.
//!
//! The heights are read from a [`GridSampler`](terrain_data::GridSampler), which can be backed by
//! anything from an in memory raster to a remote elevation service.

pub mod assembly;
pub mod config;
pub mod math;
pub mod result;
pub mod terrain_data;

#[allow(missing_docs)]
pub mod prelude {
    #[doc(hidden)]
    pub use crate::{
        assembly::{
            AssemblyContext, CancellationToken, ExportSummary, MaterializedQuads, ProgressCallback,
            QuadtreeAssembler, RingAssembler, TileDescriptor,
        },
        config::{FocusArea, FocusConfig, TerrainConfig},
        math::{Extent, GeoTransform, QuadRect},
        result::{TileError, TileResult},
        terrain_data::{
            ClipPolygon, ConstantSampler, FunctionSampler, GridBlock, GridSampler, Quadtree,
            RasterSampler,
        },
    };
}
