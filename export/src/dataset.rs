use crate::{
    cli::Cli,
    result::{ExportError, ExportResult},
};
use glam::DVec2;
use ndarray::Array2;
use num::NumCast;
use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};
use terrain_tiles::prelude::*;
use tiff::{
    decoder::{Decoder, DecodingResult},
    tags::Tag,
};
use tracing::{debug, info};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GDAL_NODATA: u16 = 42113;

fn find_f64_tag<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    tag: u16,
) -> ExportResult<Option<Vec<f64>>> {
    Ok(decoder
        .find_tag(Tag::from_u16_exhaustive(tag))?
        .map(|value| value.into_f64_vec())
        .transpose()?)
}

/// A single band GeoTIFF loaded into memory.
pub struct SourceRaster {
    pub sampler: RasterSampler,
    /// The axis aligned world rectangle covered by the raster.
    pub bounds: QuadRect,
}

impl SourceRaster {
    pub fn load(path: &Path) -> ExportResult<Self> {
        let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

        let (width, height) = decoder.dimensions()?;
        let transform = read_geo_transform(&mut decoder)?;
        let no_data = read_no_data(&mut decoder)?;

        let mut values = match decoder.read_image()? {
            DecodingResult::U8(data) => convert(data),
            DecodingResult::U16(data) => convert(data),
            DecodingResult::U32(data) => convert(data),
            DecodingResult::U64(data) => convert(data),
            DecodingResult::F32(data) => data,
            DecodingResult::F64(data) => convert(data),
            DecodingResult::I8(data) => convert(data),
            DecodingResult::I16(data) => convert(data),
            DecodingResult::I32(data) => convert(data),
            DecodingResult::I64(data) => convert(data),
        };

        if let Some(no_data) = no_data {
            values
                .iter_mut()
                .filter(|value| **value == no_data)
                .for_each(|value| *value = f32::NAN);
        }

        let (width, height) = (width as usize, height as usize);
        let data = Array2::from_shape_vec((height, width), values)?;

        let bounds = QuadRect::bounding(
            [(0, 0), (width, 0), (0, height), (width, height)]
                .map(|(col, row)| transform.apply(col as f64, row as f64)),
        )
        .ok_or(ExportError::MissingGeoreference)?;

        info!(
            "loaded {} ({width}x{height} pixels) covering {:?}",
            path.display(),
            bounds
        );

        Ok(Self {
            sampler: RasterSampler::new(data, transform)?,
            bounds,
        })
    }
}

fn convert<T: NumCast + Copy>(data: Vec<T>) -> Vec<f32> {
    data.into_iter()
        .map(|value| NumCast::from(value).unwrap_or(f32::NAN))
        .collect()
}

fn read_geo_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> ExportResult<GeoTransform> {
    if let Some(matrix) = find_f64_tag(decoder, MODEL_TRANSFORMATION)? {
        if matrix.len() >= 8 {
            debug!("using the model transformation");
            return Ok(GeoTransform::new([
                matrix[3], matrix[0], matrix[1], matrix[7], matrix[4], matrix[5],
            ]));
        }
    }

    let scale =
        find_f64_tag(decoder, MODEL_PIXEL_SCALE)?.ok_or(ExportError::MissingGeoreference)?;
    let tiepoint =
        find_f64_tag(decoder, MODEL_TIEPOINT)?.ok_or(ExportError::MissingGeoreference)?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(ExportError::MissingGeoreference);
    }

    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);

    Ok(GeoTransform::new([
        x - i * scale[0],
        scale[0],
        0.0,
        y + j * scale[1],
        0.0,
        -scale[1],
    ]))
}

fn read_no_data<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> ExportResult<Option<f32>> {
    let Some(value) = decoder.find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))? else {
        return Ok(None);
    };

    let text = value.into_string()?;

    text.trim_matches(char::from(0))
        .trim()
        .parse::<f32>()
        .map(Some)
        .map_err(|_| ExportError::InvalidArgument(format!("invalid no data value {text:?}")))
}

/// Everything an export needs besides the elevation source.
#[derive(Clone, Debug)]
pub struct ExportContext {
    pub src_path: PathBuf,
    pub scene_path: PathBuf,
    pub overwrite: bool,
    pub config: TerrainConfig,
    /// The map view. `None` exports the whole raster.
    pub view: Option<(DVec2, DVec2)>,
}

impl ExportContext {
    pub fn from_cli(args: Cli) -> ExportResult<Self> {
        let mut config = match &args.config {
            Some(path) => TerrainConfig::load_file(path)?,
            None => TerrainConfig::default(),
        };

        if let Some(ring_size) = args.ring_size {
            config.ring_size = ring_size;
        }
        if let Some(roughening) = args.roughening {
            config.roughening = roughening;
        }
        if let Some(rotation) = args.rotation {
            config.rotation = rotation;
        }
        if let Some(scene_width) = args.scene_width {
            config.scene_width = scene_width;
        }
        if let Some(focus) = point(&args.focus, "focus")? {
            config.focus = Some(FocusConfig {
                area: FocusArea::Point(focus),
                max_depth: args.max_depth.unwrap_or(4),
            });
        }
        config.merge_center |= args.merge_center;

        config.validate()?;

        let view = match (point(&args.center, "center")?, args.width, args.height) {
            (Some(center), Some(width), Some(height)) => Some((center, DVec2::new(width, height))),
            (None, None, None) => None,
            _ => {
                return Err(ExportError::InvalidArgument(
                    "center, width and height have to be given together".to_string(),
                ))
            }
        };

        Ok(Self {
            src_path: args.src_path,
            scene_path: args.scene_path,
            overwrite: args.overwrite,
            config,
            view,
        })
    }

    /// The extent of the map view, falling back to the bounds of the source.
    pub fn extent(&self, bounds: &QuadRect) -> Extent {
        let (center, size) = self.view.unwrap_or((bounds.center(), bounds.size()));

        self.config.view_extent(center, size.x, size.y)
    }

    /// Creates the scene directory, clearing it first if overwriting is allowed.
    pub fn prepare_scene_directory(&self) -> ExportResult<()> {
        let occupied = fs::read_dir(&self.scene_path)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);

        if occupied {
            if !self.overwrite {
                return Err(ExportError::SceneExists(
                    self.scene_path.display().to_string(),
                ));
            }

            fs::remove_dir_all(&self.scene_path)?;
        }

        fs::create_dir_all(&self.scene_path)?;

        Ok(())
    }
}

fn point(values: &Option<Vec<f64>>, name: &str) -> ExportResult<Option<DVec2>> {
    match values.as_deref() {
        None => Ok(None),
        Some([x, y]) => Ok(Some(DVec2::new(*x, *y))),
        Some(_) => Err(ExportError::InvalidArgument(format!(
            "{name} takes exactly two coordinates"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::{colortype::Gray32Float, TiffEncoder};

    fn write_geotiff(path: &Path, width: u32, height: u32, values: &[f32], no_data: Option<&str>) {
        let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
        let mut image = encoder.new_image::<Gray32Float>(width, height).unwrap();

        let scale = [2.0f64, 2.0, 0.0];
        let tiepoint = [0.0f64, 0.0, 0.0, 100.0, 200.0, 0.0];
        let tag = Tag::from_u16_exhaustive;

        let tags = image.encoder();
        tags.write_tag(tag(MODEL_PIXEL_SCALE), &scale[..]).unwrap();
        tags.write_tag(tag(MODEL_TIEPOINT), &tiepoint[..]).unwrap();
        if let Some(no_data) = no_data {
            tags.write_tag(tag(GDAL_NODATA), no_data).unwrap();
        }

        image.write_data(values).unwrap();
    }

    #[test]
    fn geotiff_is_georeferenced() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("dem.tif");
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, -9999.0];
        write_geotiff(&path, 3, 2, &values, Some("-9999"));

        let raster = SourceRaster::load(&path).unwrap();

        assert_eq!(raster.sampler.dim(), (2, 3));
        assert_eq!(
            raster.bounds,
            QuadRect::new(DVec2::new(100.0, 196.0), DVec2::new(106.0, 200.0))
        );

        // pixel centers
        assert_eq!(raster.sampler.read_value(101.0, 199.0).unwrap(), 1.0);
        assert_eq!(raster.sampler.read_value(103.0, 197.0).unwrap(), 5.0);
        // no data becomes the out of coverage height
        assert_eq!(raster.sampler.read_value(105.0, 197.0).unwrap(), 0.0);
    }

    #[test]
    fn missing_georeference_is_rejected() {
        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("plain.tif");

        let mut encoder = TiffEncoder::new(File::create(&path).unwrap()).unwrap();
        encoder
            .write_image::<Gray32Float>(2, 2, &[0.0, 1.0, 2.0, 3.0])
            .unwrap();

        assert!(matches!(
            SourceRaster::load(&path),
            Err(ExportError::MissingGeoreference)
        ));
    }
}
