//! `view` command: build the combined map view for an area.

use super::common::{format_cloud, print_json, read_image, DateArgs, OutputFormat};
use crate::error::CliError;
use crate::runner::CliRunner;
use bloomwatch::aggregate::{LayerStack, MapViewModel};
use bloomwatch::geo::RawQuery;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

/// Area around a geocoded address when --radius-m is not given.
const DEFAULT_RADIUS_M: f64 = 10_000.0;

#[derive(Debug, Args)]
pub struct ViewArgs {
    /// Bounding box as min_lon,min_lat,max_lon,max_lat
    #[arg(long, allow_hyphen_values = true, required_unless_present = "near")]
    pub bbox: Option<String>,

    /// Address or place name to centre the view on instead of --bbox
    #[arg(long, conflicts_with = "bbox")]
    pub near: Option<String>,

    /// Half-size of the area around --near, in metres
    #[arg(long, default_value_t = DEFAULT_RADIUS_M)]
    pub radius_m: f64,

    /// Tile layer identifier
    #[arg(long)]
    pub layer: String,

    #[command(flatten)]
    pub dates: DateArgs,

    /// Map zoom level (clamped to the configured range)
    #[arg(long)]
    pub zoom: Option<String>,

    /// Image to classify alongside the view
    #[arg(long)]
    pub image: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct ViewOutput<'a> {
    view: &'a MapViewModel,
    stack: LayerStack,
}

impl ViewArgs {
    fn to_query(&self, bbox: &str) -> Result<RawQuery, CliError> {
        let mut query = RawQuery::new(bbox, &self.layer);
        if let Some(date) = &self.dates.date {
            query = query.with_date(date);
        }
        if let (Some(start), Some(end)) = (&self.dates.start, &self.dates.end) {
            query = query.with_range(start, end);
        }
        if let Some(zoom) = &self.zoom {
            query = query.with_zoom(zoom);
        }
        if let Some(path) = &self.image {
            query = query.with_image(read_image(path)?);
        }
        Ok(query)
    }
}

pub async fn run(runner: &CliRunner, args: ViewArgs) -> Result<(), CliError> {
    runner.log_startup("view");
    let service = runner.create_service()?;

    let bbox = match (&args.near, &args.bbox) {
        (Some(address), _) => service.locate(address, args.radius_m).await?.to_string(),
        (None, Some(bbox)) => bbox.clone(),
        (None, None) => {
            return Err(CliError::InvalidArgument(
                "either --bbox or --near is required".to_string(),
            ))
        }
    };
    let query = args.to_query(&bbox)?;

    let view = service.build_view(&query).await?;
    let stack = LayerStack::from_view(&view);

    match args.format {
        OutputFormat::Json => print_json(&ViewOutput { view: &view, stack })?,
        OutputFormat::Text => print_text(&view, &stack),
    }

    service.shutdown();
    Ok(())
}

fn print_text(view: &MapViewModel, stack: &LayerStack) {
    let query = &view.query;
    println!("Map view");
    println!("========");
    println!("  Area:   {}", query.bbox);
    println!("  Dates:  {}", query.date_range);
    println!(
        "  Center: {:.4}, {:.4} (zoom {})",
        stack.center.0, stack.center.1, stack.zoom
    );
    println!();

    match &stack.tiles {
        Some(tiles) => {
            println!("Layer: {} ({})", tiles.name, tiles.layer_id);
            println!("  Time:       {}", tiles.time);
            println!("  Projection: {}", tiles.projection);
            println!("  Tiles:      {}", tiles.url_template);
        }
        None => println!("Layer: unavailable"),
    }
    println!();

    println!("Scenes: {}", stack.overlays.len());
    for overlay in &stack.overlays {
        println!(
            "  {:>2}. {}  {}  cloud {}",
            overlay.rank + 1,
            overlay.date,
            overlay.scene_id,
            format_cloud(overlay.cloud_cover_pct)
        );
    }

    if let Some(badge) = &stack.badge {
        println!();
        println!(
            "Classification: {} ({}%, model {}){}",
            badge.label,
            badge.confidence_pct,
            badge.model_version,
            if badge.clamped { " [clamped]" } else { "" }
        );
    }

    if !stack.notices.is_empty() {
        println!();
        for notice in &stack.notices {
            println!("! {}", notice.message);
        }
    }
}
