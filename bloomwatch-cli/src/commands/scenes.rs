//! `scenes` command: search satellite scenes over an area.

use super::common::{format_cloud, print_json, resolve_bbox, DateArgs, OutputFormat};
use crate::error::CliError;
use crate::runner::CliRunner;
use bloomwatch::service::ServiceError;
use clap::Args;
use futures::{pin_mut, TryStreamExt};

#[derive(Debug, Args)]
pub struct ScenesArgs {
    /// Bounding box as min_lon,min_lat,max_lon,max_lat
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: String,

    #[command(flatten)]
    pub dates: DateArgs,

    /// Drop scenes cloudier than this percentage (default from config)
    #[arg(long)]
    pub max_cloud: Option<f64>,

    /// Stop after this many scenes (default from config)
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub async fn run(runner: &CliRunner, args: ScenesArgs) -> Result<(), CliError> {
    runner.log_startup("scenes");
    let bbox = resolve_bbox(&args.bbox)?;
    let range = args.dates.to_range()?;
    let service = runner.create_service()?;

    let scenes = service
        .scene_stream(&bbox, &range, args.max_cloud, args.limit)
        .map_err(ServiceError::from);
    pin_mut!(scenes);

    match args.format {
        OutputFormat::Json => {
            let scenes: Vec<_> = scenes.try_collect().await?;
            print_json(&scenes)?;
        }
        OutputFormat::Text => {
            println!("Scenes over {} for {}", bbox, range);
            let mut count = 0;
            while let Some(scene) = scenes.try_next().await? {
                count += 1;
                println!(
                    "  {}  {}  cloud {}  {} asset(s)",
                    scene.acquisition_day(),
                    scene.scene_id,
                    format_cloud(scene.cloud_cover_pct),
                    scene.asset_urls.len()
                );
            }
            println!("{} scene(s)", count);
        }
    }
    Ok(())
}
