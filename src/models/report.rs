use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::accumulator::format_tenths;

/// Final statistics for one station. Temperatures are in tenths of a degree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationSummary {
    pub name: String,
    pub min: i64,
    pub mean: i64,
    pub max: i64,
    pub count: u64,
}

impl StationSummary {
    pub fn min_celsius(&self) -> f64 {
        self.min as f64 / 10.0
    }

    pub fn mean_celsius(&self) -> f64 {
        self.mean as f64 / 10.0
    }

    pub fn max_celsius(&self) -> f64 {
        self.max as f64 / 10.0
    }
}

impl fmt::Display for StationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}/{}/{}",
            self.name,
            format_tenths(self.min),
            format_tenths(self.mean),
            format_tenths(self.max)
        )
    }
}

/// Stations in ordinal byte order of their names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub stations: Vec<StationSummary>,
}

impl Report {
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn total_records(&self) -> u64 {
        self.stations.iter().map(|s| s.count).sum()
    }

    pub fn get(&self, name: &str) -> Option<&StationSummary> {
        self.stations.iter().find(|s| s.name == name)
    }
}

/// `{a=min/mean/max, b=min/mean/max}`
impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, station) in self.stations.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", station)?;
        }
        f.write_str("}")
    }
}
