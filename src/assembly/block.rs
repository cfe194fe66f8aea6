use crate::{
    config::TerrainConfig,
    math::Extent,
    result::{TileError, TileResult},
    terrain_data::{grid_block::BlockLayout, ClipPolygon, Decoration, GridBlock, GridSampler},
};
use glam::UVec2;
use tracing::debug;

/// The grid dimension left after decimating `base` grid points by `roughening`.
/// Never drops below two, so every block keeps at least one cell.
#[inline]
pub fn roughened_size(base: u32, roughening: u32) -> u32 {
    ((base.saturating_sub(1)) / roughening.max(1) + 1).max(2)
}

pub fn roughened_grid_size(base: UVec2, roughening: u32) -> UVec2 {
    UVec2::new(
        roughened_size(base.x, roughening),
        roughened_size(base.y, roughening),
    )
}

/// Everything needed to sample one tile.
#[derive(Clone, Debug)]
pub struct TileRequest {
    pub name: String,
    pub extent: Extent,
    pub layout: BlockLayout,
}

/// Turns [`TileRequest`]s into finished [`GridBlock`]s.
///
/// Each block is sampled, shifted and scaled vertically, and decorated, in this order and
/// exactly once.
#[derive(Clone, Debug)]
pub struct BlockAssembler {
    base_grid_size: UVec2,
    vertical_shift: f32,
    vertical_scale: f32,
    clip: Option<ClipPolygon>,
    decoration: Decoration,
}

impl BlockAssembler {
    pub fn new(config: &TerrainConfig) -> Self {
        let mut decoration = Decoration::NONE;
        decoration.set(Decoration::SIDES, config.sides);
        decoration.set(Decoration::FRAME, config.frame);

        Self {
            base_grid_size: config.base_grid_size,
            vertical_shift: config.vertical_shift,
            vertical_scale: config.vertical_scale,
            clip: config.clip.clone(),
            decoration,
        }
    }

    /// The grid size a request with the given roughening is sampled at.
    pub fn grid_size(&self, roughening: u32) -> UVec2 {
        roughened_grid_size(self.base_grid_size, roughening)
    }

    pub fn assemble<S: GridSampler + ?Sized>(
        &self,
        request: &TileRequest,
        sampler: &S,
    ) -> TileResult<GridBlock> {
        let mut block = self.sample(request, sampler)?;

        block.shift_scale(self.vertical_shift, self.vertical_scale);

        let clip = self
            .clip
            .as_ref()
            .map(|clip| clip.normalized(&request.extent));
        block.decorate(clip, self.decoration);
        block.finish();

        Ok(block)
    }

    fn sample<S: GridSampler + ?Sized>(
        &self,
        request: &TileRequest,
        sampler: &S,
    ) -> TileResult<GridBlock> {
        let size = self.grid_size(request.layout.roughening);
        let (width, height) = (size.x as usize, size.y as usize);

        let values = sampler.read(width, height, &request.extent)?;
        let count = values.len();

        let block = GridBlock::from_samples(request.extent, width, height, values, request.layout)
            .ok_or_else(|| {
                TileError::Provider(format!(
                    "received {count} values for the {width}x{height} grid of tile {}",
                    request.name
                ))
            })?;

        debug!(
            "sampled tile {} ({width}x{height}, heights {}..{})",
            request.name,
            block.stats().min,
            block.stats().max
        );

        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain_data::{BlockStage, ConstantSampler};
    use glam::DVec2;

    struct FailingSampler;

    impl GridSampler for FailingSampler {
        fn read(&self, _: usize, _: usize, _: &Extent) -> TileResult<Vec<f32>> {
            Err(TileError::Provider("connection reset".to_string()))
        }

        fn read_value(&self, _: f64, _: f64) -> TileResult<f32> {
            Err(TileError::Provider("connection reset".to_string()))
        }
    }

    struct ShortSampler;

    impl GridSampler for ShortSampler {
        fn read(&self, width: usize, height: usize, _: &Extent) -> TileResult<Vec<f32>> {
            Ok(vec![0.0; width * height - 1])
        }

        fn read_value(&self, _: f64, _: f64) -> TileResult<f32> {
            Ok(0.0)
        }
    }

    fn request(roughening: u32) -> TileRequest {
        TileRequest {
            name: "test".to_string(),
            extent: Extent::new(DVec2::ZERO, 10.0, 10.0, 0.0),
            layout: BlockLayout {
                roughening,
                ..Default::default()
            },
        }
    }

    #[test]
    fn roughening_keeps_at_least_two_samples() {
        assert_eq!(roughened_size(17, 4), 5);
        assert_eq!(roughened_size(17, 1), 17);
        assert_eq!(roughened_size(3, 8), 2);
        assert_eq!(roughened_size(2, 100), 2);
        assert_eq!(roughened_grid_size(UVec2::new(65, 33), 4), UVec2::new(17, 9));
    }

    #[test]
    fn assemble_runs_every_stage_once() {
        let config = TerrainConfig {
            base_grid_size: UVec2::new(17, 9),
            vertical_shift: 10.0,
            vertical_scale: 2.0,
            sides: true,
            ..Default::default()
        };
        let block = BlockAssembler::new(&config)
            .assemble(&request(4), &ConstantSampler(100.0))
            .unwrap();

        assert_eq!((block.width(), block.height()), (5, 3));
        assert!(block.values().iter().all(|&value| value == 220.0));
        assert_eq!(block.stats().min, 100.0);
        assert_eq!(block.stats().max, 100.0);
        assert_eq!(block.decoration(), Decoration::SIDES);
        assert_eq!(block.stage(), BlockStage::Ready);
    }

    #[test]
    fn clip_is_normalized_into_the_rotated_block() {
        let config = TerrainConfig {
            base_grid_size: UVec2::splat(3),
            frame: true,
            clip: Some(ClipPolygon::new(vec![
                vec![
                    DVec2::new(10.0, 20.0),
                    DVec2::new(10.0, 22.0),
                    DVec2::new(9.0, 18.0),
                ],
                vec![DVec2::new(10.5, 19.0)],
            ])),
            ..Default::default()
        };
        let request = TileRequest {
            extent: Extent::new(DVec2::new(10.0, 20.0), 4.0, 2.0, 90.0),
            ..request(1)
        };

        let block = BlockAssembler::new(&config)
            .assemble(&request, &ConstantSampler(0.0))
            .unwrap();
        let clip = block.clip().unwrap();

        // the long side of the extent points up
        let expected = [
            vec![
                DVec2::new(0.5, 0.5),
                DVec2::new(1.0, 0.5),
                DVec2::new(0.0, 1.0),
            ],
            vec![DVec2::new(0.25, 0.25)],
        ];
        assert_eq!(clip.rings.len(), expected.len());
        for (ring, expected) in clip.rings.iter().zip(&expected) {
            assert_eq!(ring.len(), expected.len());
            for (point, expected) in ring.iter().zip(expected) {
                let distance = (*point - *expected).length();
                assert!(distance < 1e-9, "{point} != {expected}");
            }
        }

        assert_eq!(block.decoration(), Decoration::NONE);
    }

    #[test]
    fn provider_errors_propagate() {
        let assembler = BlockAssembler::new(&TerrainConfig::default());

        assert!(matches!(
            assembler.assemble(&request(1), &FailingSampler),
            Err(TileError::Provider(_))
        ));
        assert!(matches!(
            assembler.assemble(&request(1), &ShortSampler),
            Err(TileError::Provider(_))
        ));
    }
}
