/// Record shape guarantees
pub const MAX_KEY_LEN: usize = 100;
/// `<key>;-99.9\r\n`
pub const MAX_RECORD_LEN: usize = MAX_KEY_LEN + 1 + 5 + 2;
/// Bytes the fixed-point decoder loads from the start of a value
pub const DECODER_WINDOW: usize = 8;

/// Vector scanning
pub const MAX_VECTOR_WIDTH: usize = 32;
pub const MAX_VECTOR_PROBES: usize = 4;

/// Size of the trailing region excluded from parallel chunks. Must cover the
/// longest record plus the decoder window so every in-chunk read stays in bounds.
pub const LEFTOVER_MIN_BYTES: usize = MAX_VECTOR_WIDTH * MAX_VECTOR_PROBES;

/// Files below this size are processed on a single worker
pub const SMALL_FILE_THRESHOLD: u64 = 4096;

/// Key table defaults
pub const DEFAULT_TABLE_CAPACITY: usize = 10_000;
pub const MAX_TABLE_CAPACITY: usize = 1_000_000;

/// Processing defaults
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB
pub const MIN_READ_BUFFER_SIZE: usize = 4096;
pub const MAX_WORKERS: usize = 4096;

/// Settings sources
pub const ENV_PREFIX: &str = "BRC";

/// Row count of the canonical challenge input
pub const EXPECTED_ROW_COUNT: u64 = 1_000_000_000;

const _: () = assert!(LEFTOVER_MIN_BYTES >= MAX_RECORD_LEN + DECODER_WINDOW);
