pub mod chunk_planner;
pub mod chunk_worker;
pub mod format_checker;
pub mod parallel_processor;
pub mod result_aggregator;

pub use chunk_planner::ChunkPlanner;
pub use chunk_worker::{scan_records, ChunkWorker, LeftoverClaim, PaddedLeftover};
pub use format_checker::{FormatChecker, FormatReport, FormatViolation, ViolationType};
pub use parallel_processor::ParallelProcessor;
pub use result_aggregator::ResultAggregator;
