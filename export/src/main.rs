use clap::Parser;
use terrain_tiles_export::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();
    let context = ExportContext::from_cli(args)?;

    let summary = export(&context)?;

    if summary.cancelled {
        tracing::warn!("the export was cancelled, the scene is incomplete");
    }

    Ok(())
}
