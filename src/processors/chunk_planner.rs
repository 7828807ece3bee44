//! Splits the input into per-worker chunks that start and end on record
//! boundaries.
//!
//! The last [`LEFTOVER_MIN_BYTES`] or so of the file are cut off as a separate
//! leftover region. Every record in the parallel body therefore has at least
//! that many readable bytes after it, which is enough for the word-wide
//! decoder and the vector probes to stay inside the input without checking
//! for the end of file on each record.

use crate::error::Result;
use crate::models::{Chunk, ChunkPlan};
use crate::readers::{ByteScanner, ByteSource};
use crate::utils::constants::{LEFTOVER_MIN_BYTES, SMALL_FILE_THRESHOLD};
use tracing::debug;

/// Bytes read per step when walking backwards to find the leftover start.
const BACKWARD_WINDOW: usize = 4096;

pub struct ChunkPlanner {
    workers: usize,
    scanner: ByteScanner,
}

impl ChunkPlanner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            scanner: ByteScanner::new(),
        }
    }

    pub fn with_scanner(mut self, scanner: ByteScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn plan(&self, source: &dyn ByteSource) -> Result<ChunkPlan> {
        let len = source.len();

        if len < SMALL_FILE_THRESHOLD {
            debug!("Input of {} bytes is below the split threshold", len);
            return Ok(whole_file_leftover(len));
        }

        let body_end = self.leftover_start(source, len)?;
        if body_end == 0 {
            debug!("No record boundary before the leftover region");
            return Ok(whole_file_leftover(len));
        }

        let mut chunks = Vec::with_capacity(self.workers);
        let mut previous = 0u64;
        for i in 1..self.workers as u64 {
            let target = ((body_end as u128 * i as u128) / self.workers as u128) as u64;
            if target <= previous {
                continue;
            }
            let boundary = self.next_record_start(source, target, body_end)?;
            if boundary > previous && boundary < body_end {
                chunks.push(Chunk::from_bounds(previous, boundary));
                previous = boundary;
            }
        }
        chunks.push(Chunk::from_bounds(previous, body_end));

        let plan = ChunkPlan {
            chunks,
            leftover: Chunk::from_bounds(body_end, len),
        };
        debug!(
            "Planned {} chunk(s) for {} worker(s), leftover {}",
            plan.chunks.len(),
            self.workers,
            plan.leftover
        );
        Ok(plan)
    }

    /// First record boundary at or before `len - LEFTOVER_MIN_BYTES`.
    fn leftover_start(&self, source: &dyn ByteSource, len: u64) -> Result<u64> {
        let cutoff = len.saturating_sub(LEFTOVER_MIN_BYTES as u64);
        let mut window = vec![0u8; BACKWARD_WINDOW];
        let mut end = cutoff;

        while end > 0 {
            let start = end.saturating_sub(BACKWARD_WINDOW as u64);
            let buf = &mut window[..(end - start) as usize];
            source.read_at(start, buf)?;
            if let Some(newline) = memchr::memrchr(b'\n', buf) {
                return Ok(start + newline as u64 + 1);
            }
            end = start;
        }
        Ok(0)
    }

    /// Offset just past the first `\n` at or after `target - 1`, capped at
    /// `limit`. A target that already follows a `\n` is kept.
    fn next_record_start(&self, source: &dyn ByteSource, target: u64, limit: u64) -> Result<u64> {
        let mut window = [0u8; LEFTOVER_MIN_BYTES];
        let mut from = target - 1;

        while from < limit {
            let length = (limit - from).min(LEFTOVER_MIN_BYTES as u64) as usize;
            let buf = &mut window[..length];
            source.read_at(from, buf)?;
            if let Some((offset, width)) = self.scanner.index_of_line_end(buf, 0) {
                return Ok(from + (offset + width) as u64);
            }
            from += length as u64;
        }
        Ok(limit)
    }
}

fn whole_file_leftover(len: u64) -> ChunkPlan {
    ChunkPlan {
        chunks: Vec::new(),
        leftover: Chunk::new(0, len),
    }
}
