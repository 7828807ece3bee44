use crate::cli::args::{Cli, Commands};
use crate::error::{ProcessingError, Result};
use crate::processors::{FormatChecker, ParallelProcessor};
use crate::readers::open_source;
use crate::utils::progress::ProgressReporter;
use crate::utils::Settings;
use crate::writers::ReportWriter;
use std::io;
use tracing::{debug, info, warn};
use validator::Validate;

pub fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Process {
            input,
            workers,
            strategy,
            format,
            buffer_size,
            table_capacity,
            progress,
        } => {
            if let Some(workers) = workers {
                settings.workers = workers;
            }
            if let Some(strategy) = strategy {
                settings.read_strategy = strategy;
            }
            if let Some(buffer_size) = buffer_size {
                settings.read_buffer_size = buffer_size;
            }
            if let Some(table_capacity) = table_capacity {
                settings.table_capacity = table_capacity;
            }
            settings.progress |= progress;
            settings.validate()?;
            debug!("Settings: {}", settings.summary());

            let source = open_source(&input, settings.read_strategy)?;
            let progress =
                ProgressReporter::new(source.len(), "Aggregating measurements...", !settings.progress);

            let processor = ParallelProcessor::from_settings(&settings);
            let report = processor.process_source(source.as_ref(), Some(&progress))?;

            ReportWriter::new(format).write(&report, io::stdout().lock())?;
        }

        Commands::Plan { input, workers } => {
            if let Some(workers) = workers {
                settings.workers = workers;
            }
            settings.validate()?;

            let source = open_source(&input, settings.read_strategy)?;
            let plan = ParallelProcessor::from_settings(&settings).plan(source.as_ref())?;
            println!("{}", plan.summary());
        }

        Commands::Validate {
            input,
            max_violations,
        } => {
            info!("Validating {}", input.display());

            let checker = FormatChecker::new().with_max_violations(max_violations);
            let report = checker.check_path(&input)?;
            println!("{}", checker.generate_summary(&report));

            if !report.is_valid() {
                warn!("{} malformed record(s) found", report.violation_count);
                return Err(ProcessingError::InvalidFormat(format!(
                    "{} of {} records are malformed",
                    report.violation_count, report.total_records
                )));
            }
            println!("All records are well formed");
        }
    }

    Ok(())
}
