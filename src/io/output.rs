//! Report output.
//!
//! The engine emits structured data only; prose belongs to the downstream
//! note generator. JSON is the interchange format; the compact writer is a
//! one-line-per-match digest for piping into other tools.

use anyhow::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Compact,
}

pub trait OutputWriter {
    fn write_report<T: Serialize>(&mut self, report: &T) -> Result<()>;
}

pub struct JsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> OutputWriter for JsonWriter<W> {
    fn write_report<T: Serialize>(&mut self, report: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

/// One JSON object per line; consumers stream it
pub struct CompactWriter<W: Write> {
    writer: W,
}

impl<W: Write> CompactWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> OutputWriter for CompactWriter<W> {
    fn write_report<T: Serialize>(&mut self, report: &T) -> Result<()> {
        let json = serde_json::to_string(report)?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}
