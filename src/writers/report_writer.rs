use crate::error::Result;
use crate::models::Report;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `{name=min/mean/max, ...}` on one line.
    #[default]
    Text,
    /// Array of `{name, min, mean, max, count}` objects, in degrees.
    Json,
}

#[derive(Serialize)]
struct JsonStation<'r> {
    name: &'r str,
    min: f64,
    mean: f64,
    max: f64,
    count: u64,
}

pub struct ReportWriter {
    format: OutputFormat,
}

impl ReportWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn write<W: Write>(&self, report: &Report, mut out: W) -> Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(out, "{}", report)?,
            OutputFormat::Json => {
                let stations: Vec<JsonStation<'_>> = report
                    .stations
                    .iter()
                    .map(|s| JsonStation {
                        name: &s.name,
                        min: s.min_celsius(),
                        mean: s.mean_celsius(),
                        max: s.max_celsius(),
                        count: s.count,
                    })
                    .collect();
                serde_json::to_writer_pretty(&mut out, &stations)?;
                writeln!(out)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}
