use crate::error::{ProcessingError, Result};
use crate::models::{ChunkPlan, KeyTable, Report};
use crate::processors::chunk_worker::{ChunkWorker, LeftoverClaim, PaddedLeftover};
use crate::processors::{ChunkPlanner, ResultAggregator};
use crate::readers::{open_source, ByteScanner, ByteSource, ReadStrategy};
use crate::utils::constants::{
    DEFAULT_READ_BUFFER_SIZE, DEFAULT_TABLE_CAPACITY, EXPECTED_ROW_COUNT,
};
use crate::utils::progress::ProgressReporter;
use crate::utils::Settings;
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

pub struct ParallelProcessor {
    workers: usize,
    table_capacity: usize,
    read_buffer_size: usize,
    scanner: ByteScanner,
}

impl ParallelProcessor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            table_capacity: DEFAULT_TABLE_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            scanner: ByteScanner::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.workers)
            .with_table_capacity(settings.table_capacity)
            .with_read_buffer_size(settings.read_buffer_size)
    }

    pub fn with_table_capacity(mut self, table_capacity: usize) -> Self {
        self.table_capacity = table_capacity;
        self
    }

    pub fn with_read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size;
        self
    }

    pub fn with_scanner(mut self, scanner: ByteScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn plan(&self, source: &dyn ByteSource) -> Result<ChunkPlan> {
        ChunkPlanner::new(self.workers)
            .with_scanner(self.scanner)
            .plan(source)
    }

    /// Open `path` with `strategy` and aggregate it.
    pub fn process_file(
        &self,
        path: &Path,
        strategy: ReadStrategy,
        progress: Option<&ProgressReporter>,
    ) -> Result<Report> {
        info!("Processing {} with the {} strategy", path.display(), strategy);
        let source = open_source(path, strategy)?;
        self.process_source(source.as_ref(), progress)
    }

    /// Aggregate every record of `source` into a sorted report.
    pub fn process_source(
        &self,
        source: &dyn ByteSource,
        progress: Option<&ProgressReporter>,
    ) -> Result<Report> {
        let started = Instant::now();
        debug!("Scanning with {}", self.scanner.level());

        let plan = self.plan(source)?;
        info!(
            "Split {} bytes into {} chunk(s) plus a {} byte leftover",
            plan.file_len(),
            plan.chunks.len(),
            plan.leftover.length
        );

        let leftover = PaddedLeftover::load(source, plan.leftover)?;
        let worker = ChunkWorker::new(
            source,
            self.scanner,
            self.table_capacity,
            self.read_buffer_size,
        );

        let tables = if plan.chunks.is_empty() {
            let mut table = worker.new_table();
            worker.scan_leftover(&mut table, &leftover)?;
            report_bytes(progress, plan.leftover.length);
            vec![table]
        } else {
            self.run_chunks(&worker, &plan, &leftover, progress)?
        };

        let aggregator = ResultAggregator::new(self.table_capacity);
        let merged = aggregator.reduce(tables)?;
        let report = aggregator.report(&merged);

        let total = report.total_records();
        info!(
            "Aggregated {} records across {} stations in {:.2?}",
            total,
            report.len(),
            started.elapsed()
        );
        if total != EXPECTED_ROW_COUNT {
            debug!(
                "Row count {} differs from the reference input size of {}",
                total, EXPECTED_ROW_COUNT
            );
        }

        if let Some(p) = progress {
            p.finish_with_message("Processing complete");
        }
        Ok(report)
    }

    fn run_chunks<'s>(
        &self,
        worker: &ChunkWorker<'s>,
        plan: &ChunkPlan,
        leftover: &PaddedLeftover,
        progress: Option<&ProgressReporter>,
    ) -> Result<Vec<KeyTable<'s>>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("brc-worker-{}", i))
            .build()
            .map_err(|e| ProcessingError::Config(format!("Failed to build thread pool: {}", e)))?;

        let claim = LeftoverClaim::new();

        pool.install(|| {
            plan.chunks
                .par_iter()
                .map(|&chunk| {
                    let mut table = worker.run(chunk)?;
                    report_bytes(progress, chunk.length);

                    if claim.try_claim() {
                        debug!("Worker that scanned {} takes the leftover", chunk);
                        worker.scan_leftover(&mut table, leftover)?;
                        report_bytes(progress, plan.leftover.length);
                    }
                    Ok(table)
                })
                .collect::<Result<Vec<_>>>()
        })
    }
}

fn report_bytes(progress: Option<&ProgressReporter>, bytes: u64) {
    if let Some(p) = progress {
        p.increment(bytes);
    }
}
