pub mod analyze;
pub mod apply;
pub mod init;
pub mod plan;

use crate::cli::OutputFormat;
use crate::config::EncapConfig;
use crate::core::types::{PatternKind, PatternMatch};
use crate::io::output::{CompactWriter, JsonWriter, OutputWriter};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Report envelope shared by all subcommands
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub generated_at: DateTime<Utc>,
    pub tool: &'static str,
    pub version: &'static str,
    pub report: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(report: T) -> Self {
        Self {
            generated_at: Utc::now(),
            tool: "encap",
            version: env!("CARGO_PKG_VERSION"),
            report,
        }
    }
}

pub fn load_config(explicit: Option<&Path>, target: &Path) -> Result<EncapConfig> {
    match explicit {
        Some(path) => EncapConfig::from_file(path),
        None => {
            let dir = if target.is_dir() {
                target.to_path_buf()
            } else {
                target
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."))
            };
            Ok(EncapConfig::load_or_default(&dir))
        }
    }
}

pub fn write_report<T: Serialize>(
    report: &T,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let envelope = Envelope::new(report);
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            dispatch(&envelope, format, file)
        }
        None => dispatch(&envelope, format, std::io::stdout().lock()),
    }
}

fn dispatch<T: Serialize, W: std::io::Write>(
    report: &T,
    format: OutputFormat,
    writer: W,
) -> Result<()> {
    match format {
        OutputFormat::Json => JsonWriter::new(writer).write_report(report),
        OutputFormat::Compact => CompactWriter::new(writer).write_report(report),
    }
}

/// Restrict matches to the kinds named on the command line
pub fn select_matches(
    matches: Vec<PatternMatch>,
    kinds: Option<&[String]>,
) -> Result<Vec<PatternMatch>> {
    let Some(kinds) = kinds else {
        return Ok(matches);
    };
    let mut wanted = Vec::new();
    for name in kinds {
        let kind = PatternKind::parse(name)
            .ok_or_else(|| anyhow::anyhow!("unknown pattern kind: {name}"))?;
        wanted.push(kind);
    }
    Ok(matches
        .into_iter()
        .filter(|m| wanted.contains(&m.kind))
        .collect())
}
