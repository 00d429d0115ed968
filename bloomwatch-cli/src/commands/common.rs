//! Common types and utilities shared across CLI commands.

use crate::error::CliError;
use bloomwatch::geo::{parse_bbox, parse_date, BBox, DateRange};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::Path;

/// Output rendering for command results.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Date selection shared by `view` and `scenes`.
#[derive(Debug, Clone, Args)]
pub struct DateArgs {
    /// Single day (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub date: Option<String>,

    /// Range start (YYYY-MM-DD), requires --end
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// Range end (YYYY-MM-DD), requires --start
    #[arg(long, requires = "start")]
    pub end: Option<String>,
}

impl DateArgs {
    /// Resolve to a concrete range.
    pub fn to_range(&self) -> Result<DateRange, CliError> {
        match (&self.date, &self.start, &self.end) {
            (Some(day), _, _) => Ok(DateRange::single(parse_day("date", day)?)),
            (None, Some(start), Some(end)) => {
                DateRange::new(parse_day("start", start)?, parse_day("end", end)?)
                    .map_err(|e| CliError::InvalidArgument(e.to_string()))
            }
            _ => Err(CliError::InvalidArgument(
                "either --date or both --start and --end are required".to_string(),
            )),
        }
    }
}

fn parse_day(flag: &str, value: &str) -> Result<chrono::NaiveDate, CliError> {
    parse_date(value).map_err(|e| CliError::InvalidArgument(format!("--{}: {}", flag, e)))
}

/// Parse a `min_lon,min_lat,max_lon,max_lat` argument.
pub fn resolve_bbox(value: &str) -> Result<BBox, CliError> {
    parse_bbox(value).map_err(|e| CliError::InvalidArgument(e.to_string()))
}

/// Read an image file into memory.
pub fn read_image(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|error| CliError::FileRead {
        path: path.display().to_string(),
        error,
    })
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format an optional cloud cover percentage.
pub fn format_cloud(cloud_cover_pct: Option<f64>) -> String {
    match cloud_cover_pct {
        Some(pct) => format!("{:.1}%", pct),
        None => "unknown".to_string(),
    }
}
