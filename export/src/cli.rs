use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use terrain_tiles::assembly::ProgressCallback;

const BAR_SIZE: u64 = 10000;

#[derive(Parser, Debug)]
#[command(name = "tte", author, version, about)]
pub struct Cli {
    /// The GeoTIFF the heights are read from.
    #[arg(required = true)]
    pub src_path: PathBuf,
    /// The directory the scene is written to.
    #[arg(required = true)]
    pub scene_path: PathBuf,
    /// A RON terrain config. The options below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(short, long, default_value_t = false)]
    pub overwrite: bool,

    /// The center of the map view in world coordinates.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    pub center: Option<Vec<f64>>,
    #[arg(long)]
    pub width: Option<f64>,
    #[arg(long)]
    pub height: Option<f64>,
    /// The rotation of the map view in degrees, clockwise.
    #[arg(long, allow_negative_numbers = true)]
    pub rotation: Option<f64>,

    #[arg(long)]
    pub ring_size: Option<u32>,
    #[arg(long)]
    pub roughening: Option<u32>,
    #[arg(long)]
    pub scene_width: Option<f64>,

    /// Switches to the quadtree layout, refined around this world position.
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
    pub focus: Option<Vec<f64>>,
    #[arg(long)]
    pub max_depth: Option<u32>,
    #[arg(long, default_value_t = false)]
    pub merge_center: bool,
}

pub(crate) struct ExportBar<'a> {
    name: String,
    bar: ProgressBar,
    callback: Box<ProgressCallback<'a>>,
}

impl ExportBar<'_> {
    pub(crate) fn new(name: String) -> Self {
        let bar = ProgressBar::new(BAR_SIZE).with_style(
            ProgressStyle::with_template(
                &(name.clone() + " terrain: {wide_bar} {percent} % [{elapsed}/{duration}])"),
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let callback = Box::new({
            let progress_bar = bar.clone();
            move |completion: f64| {
                progress_bar.set_position((completion * BAR_SIZE as f64) as u64);
                true
            }
        });

        Self {
            name,
            bar,
            callback,
        }
    }

    pub(crate) fn callback(&self) -> &ProgressCallback<'_> {
        self.callback.as_ref()
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
        tracing::info!("{} took: {:?}", self.name, self.bar.elapsed());
    }
}
