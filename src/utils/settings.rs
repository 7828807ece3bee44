use crate::error::Result;
use crate::readers::ReadStrategy;
use crate::utils::constants::{
    DEFAULT_READ_BUFFER_SIZE, DEFAULT_TABLE_CAPACITY, ENV_PREFIX, MAX_WORKERS,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Tunables for a run.
///
/// Sources are layered, later ones winning: built-in defaults, an optional
/// TOML file, `BRC_*` environment variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    #[validate(range(min = 1, max = 4096))]
    pub workers: usize,

    pub read_strategy: ReadStrategy,

    /// Window size for positioned reads.
    #[validate(range(min = 4096))]
    pub read_buffer_size: usize,

    /// Maximum number of distinct stations per table.
    #[validate(range(min = 1, max = 1_000_000))]
    pub table_capacity: usize,

    pub progress: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().clamp(1, MAX_WORKERS),
            read_strategy: ReadStrategy::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            table_capacity: DEFAULT_TABLE_CAPACITY,
            progress: false,
        }
    }
}

impl Settings {
    /// Defaults, then `config_file` if given, then the environment.
    ///
    /// The result is not validated yet, so that command-line overrides can
    /// still be applied.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn summary(&self) -> String {
        format!(
            "workers={}, strategy={}, read_buffer_size={}, table_capacity={}",
            self.workers, self.read_strategy, self.read_buffer_size, self.table_capacity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::{MAX_TABLE_CAPACITY, MIN_READ_BUFFER_SIZE};
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert!(settings.workers >= 1);
        assert_eq!(settings.read_strategy, ReadStrategy::Mmap);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut settings = Settings {
            workers: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        settings.workers = 4;
        settings.read_buffer_size = MIN_READ_BUFFER_SIZE - 1;
        assert!(settings.validate().is_err());

        settings.read_buffer_size = MIN_READ_BUFFER_SIZE;
        settings.table_capacity = MAX_TABLE_CAPACITY + 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "workers = 3").unwrap();
        writeln!(file, "read_strategy = \"read\"").unwrap();
        writeln!(file, "table_capacity = 500").unwrap();
        file.flush().unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.read_strategy, ReadStrategy::Read);
        assert_eq!(settings.table_capacity, 500);
        assert_eq!(settings.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        assert!(Settings::load(Some(Path::new("/no/such/brc.toml"))).is_err());
    }
}
