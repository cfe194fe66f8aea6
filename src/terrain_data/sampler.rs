use crate::{
    math::{Extent, GeoTransform},
    result::{TileError, TileResult},
    terrain_data::bilinear,
};
use glam::DVec2;
use itertools::iproduct;
use ndarray::Array2;

/// The value reported for positions outside of the elevation data.
pub const OUT_OF_COVERAGE: f32 = 0.0;

/// The source of elevation data.
///
/// Reads are blocking and must be deterministic for identical arguments.
/// Any error is fatal to the export, there are no retries.
pub trait GridSampler {
    /// Reads a `width` x `height` grid covering `extent`, row major with the top row first.
    /// The outer grid points lie exactly on the edges of the extent.
    fn read(&self, width: usize, height: usize, extent: &Extent) -> TileResult<Vec<f32>>;

    /// Reads the elevation at a single world position.
    fn read_value(&self, x: f64, y: f64) -> TileResult<f32>;
}

impl<S: GridSampler + ?Sized> GridSampler for &S {
    fn read(&self, width: usize, height: usize, extent: &Extent) -> TileResult<Vec<f32>> {
        (**self).read(width, height, extent)
    }

    fn read_value(&self, x: f64, y: f64) -> TileResult<f32> {
        (**self).read_value(x, y)
    }
}

/// Evaluates `value` at every grid point of the extent.
fn read_grid_points(
    width: usize,
    height: usize,
    extent: &Extent,
    mut value: impl FnMut(DVec2) -> TileResult<f32>,
) -> TileResult<Vec<f32>> {
    let transform = extent.geotransform(width, height, true);

    iproduct!(0..height, 0..width)
        .map(|(row, col)| value(transform.apply(col as f64 + 0.5, row as f64 + 0.5)))
        .collect()
}

/// A flat terrain at a constant height.
#[derive(Clone, Copy, Debug)]
pub struct ConstantSampler(pub f32);

impl GridSampler for ConstantSampler {
    fn read(&self, width: usize, height: usize, _extent: &Extent) -> TileResult<Vec<f32>> {
        Ok(vec![self.0; width * height])
    }

    fn read_value(&self, _x: f64, _y: f64) -> TileResult<f32> {
        Ok(self.0)
    }
}

/// A terrain described by a height function of the world position.
pub struct FunctionSampler<F>(pub F);

impl<F: Fn(DVec2) -> f32> GridSampler for FunctionSampler<F> {
    fn read(&self, width: usize, height: usize, extent: &Extent) -> TileResult<Vec<f32>> {
        read_grid_points(width, height, extent, |point| Ok((self.0)(point)))
    }

    fn read_value(&self, x: f64, y: f64) -> TileResult<f32> {
        Ok((self.0)(DVec2::new(x, y)))
    }
}

/// An in memory raster with a geo transform, sampled bilinearly between pixel centers.
pub struct RasterSampler {
    data: Array2<f32>,
    inverse_transform: GeoTransform,
}

impl RasterSampler {
    /// `data` is indexed `[row, col]`, `transform` maps pixel corners to world space.
    pub fn new(data: Array2<f32>, transform: GeoTransform) -> TileResult<Self> {
        if data.is_empty() {
            return Err(TileError::Provider("the raster contains no pixels".to_string()));
        }

        let inverse_transform = transform.invert().ok_or_else(|| {
            TileError::Provider(format!("the raster transform {transform:?} is singular"))
        })?;

        Ok(Self {
            data,
            inverse_transform,
        })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    fn value(&self, point: DVec2) -> f32 {
        let (rows, cols) = self.data.dim();
        let pixel = self.inverse_transform.apply(point.x, point.y);

        let covered = pixel.x >= 0.0
            && pixel.y >= 0.0
            && pixel.x <= cols as f64
            && pixel.y <= rows as f64;

        if !covered {
            return OUT_OF_COVERAGE;
        }

        let value = bilinear(&self.data, pixel.x - 0.5, pixel.y - 0.5);

        if value.is_finite() {
            value
        } else {
            OUT_OF_COVERAGE
        }
    }
}

impl GridSampler for RasterSampler {
    fn read(&self, width: usize, height: usize, extent: &Extent) -> TileResult<Vec<f32>> {
        read_grid_points(width, height, extent, |point| Ok(self.value(point)))
    }

    fn read_value(&self, x: f64, y: f64) -> TileResult<f32> {
        Ok(self.value(DVec2::new(x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn function_sampler_reads_grid_points_top_row_first() {
        let sampler = FunctionSampler(|point: DVec2| (point.x + 10.0 * point.y) as f32);
        let extent = Extent::new(DVec2::new(1.0, 1.0), 2.0, 2.0, 0.0);

        let values = sampler.read(3, 2, &extent).unwrap();

        assert_eq!(values, vec![20.0, 21.0, 22.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn raster_sampler_interpolates_between_pixel_centers() {
        let data = array![[0.0, 10.0], [20.0, 30.0]];
        // two by two pixels covering [0,2]², north up
        let transform = GeoTransform([0.0, 1.0, 0.0, 2.0, 0.0, -1.0]);
        let sampler = RasterSampler::new(data, transform).unwrap();

        assert_eq!(sampler.read_value(0.5, 1.5).unwrap(), 0.0);
        assert_eq!(sampler.read_value(1.0, 1.0).unwrap(), 15.0);
        assert_eq!(sampler.read_value(1.5, 0.5).unwrap(), 30.0);
        assert_eq!(sampler.read_value(5.0, 1.0).unwrap(), OUT_OF_COVERAGE);
    }

    #[test]
    fn raster_sampler_fills_uncovered_grid_points_with_the_sentinel() {
        let data = Array2::from_elem((4, 4), 7.0);
        let transform = GeoTransform([0.0, 1.0, 0.0, 4.0, 0.0, -1.0]);
        let sampler = RasterSampler::new(data, transform).unwrap();
        let extent = Extent::new(DVec2::new(4.0, 2.0), 4.0, 4.0, 0.0);

        let values = sampler.read(3, 3, &extent).unwrap();

        assert_eq!(values, vec![7.0, 7.0, 0.0, 7.0, 7.0, 0.0, 7.0, 7.0, 0.0]);
    }
}
