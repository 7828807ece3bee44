pub mod accumulator;
pub mod chunk;
pub mod key_table;
pub mod report;
pub mod station_name;

pub use accumulator::{format_tenths, Accumulator};
pub use chunk::{Chunk, ChunkPlan};
pub use key_table::{KeyStorage, KeyTable};
pub use report::{Report, StationSummary};
pub use station_name::StationName;
