use crate::{
    math::{Extent, QuadRect},
    result::{TileError, TileResult},
    terrain_data::ClipPolygon,
};
use glam::{DVec2, UVec2};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// The deepest quadtree that can be requested. Each level quadruples the leaf count near the focus.
pub const MAX_QUAD_DEPTH: u32 = 16;

/// The area of the terrain that is subdivided most finely in quadtree mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FocusArea {
    /// An axis aligned rectangle in world coordinates.
    Rect(QuadRect),
    /// A single world position, usually the center of the map view.
    Point(DVec2),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FocusConfig {
    pub area: FocusArea,
    pub max_depth: u32,
}

impl FocusConfig {
    /// The focus area in the normalized space of `extent`.
    pub fn normalized_rect(&self, extent: &Extent) -> QuadRect {
        match &self.area {
            FocusArea::Point(point) => QuadRect::from_point(extent.normalize_point(*point)),
            FocusArea::Rect(rect) => {
                let corners = [
                    rect.min,
                    DVec2::new(rect.min.x, rect.max.y),
                    rect.max,
                    DVec2::new(rect.max.x, rect.min.y),
                ];

                QuadRect::bounding(corners.map(|corner| extent.normalize_point(corner)))
                    .unwrap_or_default()
            }
        }
    }
}

/// The options of a terrain export.
///
/// Every field has a default, so a config file only has to list what it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// The grid size (width, height) of a block sampled without roughening.
    pub base_grid_size: UVec2,
    /// The decimation factor applied to every block except the center one.
    pub roughening: u32,
    /// The number of blocks per side in ring mode. Must be odd.
    pub ring_size: u32,
    pub vertical_shift: f32,
    pub vertical_scale: f32,
    /// The rotation of the map view in degrees, as displayed (clockwise).
    pub rotation: f64,
    /// The width of the whole scene plane in scene units.
    pub scene_width: f64,
    pub clip: Option<ClipPolygon>,
    pub sides: bool,
    pub frame: bool,
    /// Opaque material index, resolved by the serializer.
    pub material: Option<u32>,
    /// Enables quadtree mode.
    pub focus: Option<FocusConfig>,
    /// Emits the deepest focus quads as one merged tile.
    pub merge_center: bool,
    pub reconcile_edges: bool,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            base_grid_size: UVec2::splat(65),
            roughening: 4,
            ring_size: 1,
            vertical_shift: 0.0,
            vertical_scale: 1.0,
            rotation: 0.0,
            scene_width: 100.0,
            clip: None,
            sides: false,
            frame: false,
            material: None,
            focus: None,
            merge_center: false,
            reconcile_edges: true,
        }
    }
}

impl TerrainConfig {
    pub fn load_file<P: AsRef<Path>>(path: P) -> TileResult<Self> {
        let encoded = fs::read_to_string(path)?;
        Ok(ron::from_str(&encoded)?)
    }

    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> TileResult<()> {
        let encoded = ron::ser::to_string_pretty(self, PrettyConfig::default())?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn validate(&self) -> TileResult<()> {
        let invalid = |message: String| Err(TileError::InvalidConfiguration(message));

        if self.base_grid_size.x < 2 || self.base_grid_size.y < 2 {
            return invalid(format!(
                "base grid size {} must be at least 2x2",
                self.base_grid_size
            ));
        }
        if self.roughening == 0 {
            return invalid("roughening must be at least 1".to_string());
        }
        if self.ring_size % 2 == 0 {
            return invalid(format!("ring size {} must be odd", self.ring_size));
        }
        if !(self.scene_width > 0.0 && self.scene_width.is_finite()) {
            return invalid(format!("scene width {} must be positive", self.scene_width));
        }
        if !self.vertical_shift.is_finite() || !self.vertical_scale.is_finite() {
            return invalid("vertical shift and scale must be finite".to_string());
        }
        if let Some(focus) = &self.focus {
            if focus.max_depth > MAX_QUAD_DEPTH {
                return invalid(format!(
                    "max depth {} exceeds {MAX_QUAD_DEPTH}",
                    focus.max_depth
                ));
            }
        }

        Ok(())
    }

    /// The extent of a map view centered on `center`, rotated by the configured map rotation.
    pub fn view_extent(&self, center: DVec2, width: f64, height: f64) -> Extent {
        Extent::new(center, width, height, self.rotation)
    }

    /// The scene plane of `extent`, `scene_width` wide and keeping the aspect ratio of the extent.
    pub fn scene_size(&self, extent: &Extent) -> DVec2 {
        DVec2::new(
            self.scene_width,
            self.scene_width * extent.height() / extent.width(),
        )
    }
}
