//! `classify` command: send one image to the inference endpoint.

use super::common::{print_json, read_image, OutputFormat};
use crate::error::CliError;
use crate::runner::CliRunner;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Image file (TIFF, PNG or JPEG)
    pub image: PathBuf,

    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

pub async fn run(runner: &CliRunner, args: ClassifyArgs) -> Result<(), CliError> {
    runner.log_startup("classify");
    let image = read_image(&args.image)?;
    let service = runner.create_service()?;

    let result = service.classify(&image).await?;

    match args.format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => {
            println!("Label:      {}", result.label);
            println!("Confidence: {:.1}%", result.confidence * 100.0);
            println!("Model:      {}", result.model_version);
            if result.confidence_clamped {
                println!("(confidence was outside 0..1 and has been clamped)");
            }
        }
    }
    Ok(())
}
