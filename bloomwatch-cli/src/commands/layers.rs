//! `layers` command: list and describe catalog layers.

use super::common::{print_json, OutputFormat};
use crate::error::CliError;
use crate::runner::CliRunner;
use bloomwatch::layers::{FilterMode, LayerDescriptor, LayerFilter};
use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum MatchMode {
    /// Case-insensitive substring
    #[default]
    Contains,
    /// Case-insensitive prefix
    Prefix,
    /// Case-insensitive regular expression
    Regex,
}

impl From<MatchMode> for FilterMode {
    fn from(mode: MatchMode) -> Self {
        match mode {
            MatchMode::Contains => FilterMode::Contains,
            MatchMode::Prefix => FilterMode::Prefix,
            MatchMode::Regex => FilterMode::Regex,
        }
    }
}

#[derive(Debug, Args)]
pub struct LayersArgs {
    /// Only list layers matching this pattern
    #[arg(long)]
    pub filter: Option<String>,

    #[arg(long, value_enum, default_value_t)]
    pub mode: MatchMode,

    /// Describe one layer instead of listing
    #[arg(long, conflicts_with = "filter")]
    pub describe: Option<String>,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub async fn run(runner: &CliRunner, args: LayersArgs) -> Result<(), CliError> {
    runner.log_startup("layers");
    let service = runner.create_service()?;

    if let Some(layer_id) = &args.describe {
        let layer = service.describe_layer(layer_id).await?;
        match args.format {
            OutputFormat::Json => print_json(&layer)?,
            OutputFormat::Text => print_layer(&layer),
        }
        return Ok(());
    }

    let filter = LayerFilter::new(args.filter.as_deref().unwrap_or(""), args.mode.into())
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    let ids = service.list_layers(&filter).await?;

    match args.format {
        OutputFormat::Json => print_json(&ids)?,
        OutputFormat::Text => {
            let info = service.service_info().await?;
            println!("{} (WMS {})", info.title, info.version);
            println!("{} matching layer(s)", ids.len());
            println!();
            for id in &ids {
                println!("  {}", id);
            }
        }
    }
    Ok(())
}

fn print_layer(layer: &LayerDescriptor) {
    println!("{}", layer.layer_id);
    println!("  Title:      {}", layer.display_name);
    if let Some(description) = &layer.description {
        println!("  About:      {}", description);
    }
    println!("  Projection: {}", layer.projection);
    println!("  Tiles:      {}", layer.tile_url_template);
    match &layer.valid_time_range {
        Some(range) => println!("  Valid:      {}", range),
        None => println!("  Valid:      not time-enabled"),
    }
    if let Some(default_time) = &layer.default_time {
        println!("  Default:    {}", default_time);
    }
    if let Some(bbox) = &layer.geographic_bbox {
        println!("  Extent:     {}", bbox);
    }
}
