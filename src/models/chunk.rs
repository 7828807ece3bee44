use serde::Serialize;
use std::fmt;

/// Contiguous byte range of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Chunk {
    pub start: u64,
    pub length: u64,
}

impl Chunk {
    pub fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    pub fn from_bounds(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self {
            start,
            length: end - start,
        }
    }

    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}) {} bytes", self.start, self.end(), self.length)
    }
}

/// Parallel chunks plus the trailing region scanned separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkPlan {
    pub chunks: Vec<Chunk>,
    pub leftover: Chunk,
}

impl ChunkPlan {
    pub fn file_len(&self) -> u64 {
        self.leftover.end()
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "Chunk plan: {} parallel chunk(s) over {} bytes",
            self.chunks.len(),
            self.file_len()
        )];
        for (i, chunk) in self.chunks.iter().enumerate() {
            lines.push(format!("  chunk {:>3}: {}", i, chunk));
        }
        lines.push(format!("  leftover:  {}", self.leftover));
        lines.join("\n")
    }
}
