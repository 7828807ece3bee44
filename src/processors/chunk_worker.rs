//! Per-worker scan loop: find the `;`, decode the value, update the table.

use crate::error::{ProcessingError, Result};
use crate::models::{Chunk, KeyStorage, KeyTable};
use crate::readers::{decode, ByteScanner, ByteSource};
use crate::utils::constants::LEFTOVER_MIN_BYTES;
use std::sync::atomic::{AtomicBool, Ordering};

/// Scan the records starting in `buffer[start..end)` and hand each key and
/// value to `sink`.
///
/// `start` must be a record boundary. The last record may run past `end`;
/// the returned cursor is just past it.
#[inline(always)]
pub fn scan_records<'b, F>(
    scanner: &ByteScanner,
    buffer: &'b [u8],
    start: usize,
    end: usize,
    mut sink: F,
) -> Result<usize>
where
    F: FnMut(&'b [u8], i32) -> Result<()>,
{
    let mut cursor = start;
    while cursor < end {
        let semicolon = scanner.index_of_delimiter(buffer, cursor).ok_or_else(|| {
            ProcessingError::InvalidFormat(format!(
                "record at buffer offset {} has no ';' delimiter",
                cursor
            ))
        })?;
        let (value, consumed) = decode(&buffer[semicolon + 1..]);
        sink(&buffer[cursor..semicolon], value)?;
        cursor = semicolon + 1 + consumed;
    }
    Ok(cursor)
}

/// Copy of the leftover region with a guaranteed final terminator and zero
/// padding behind it.
pub struct PaddedLeftover {
    bytes: Vec<u8>,
    records_end: usize,
}

impl PaddedLeftover {
    pub fn load(source: &dyn ByteSource, leftover: Chunk) -> Result<Self> {
        let mut bytes = vec![0u8; leftover.length as usize];
        source.read_at(leftover.start, &mut bytes)?;

        if bytes.last().is_some_and(|&b| b != b'\n') {
            bytes.push(b'\n');
        }
        let records_end = bytes.len();
        bytes.resize(records_end + LEFTOVER_MIN_BYTES, 0);

        Ok(Self { bytes, records_end })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the record data, excluding padding.
    pub fn records_len(&self) -> usize {
        self.records_end
    }

    pub fn is_empty(&self) -> bool {
        self.records_end == 0
    }
}

/// Lets exactly one worker take the leftover region.
#[derive(Debug, Default)]
pub struct LeftoverClaim {
    taken: AtomicBool,
}

impl LeftoverClaim {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` for the first caller only.
    pub fn try_claim(&self) -> bool {
        !self.taken.swap(true, Ordering::AcqRel)
    }

    pub fn is_claimed(&self) -> bool {
        self.taken.load(Ordering::Acquire)
    }
}

/// Scans one chunk of a shared source into a fresh [`KeyTable`].
pub struct ChunkWorker<'s> {
    source: &'s dyn ByteSource,
    scanner: ByteScanner,
    table_capacity: usize,
    read_buffer_size: usize,
}

impl<'s> ChunkWorker<'s> {
    pub fn new(
        source: &'s dyn ByteSource,
        scanner: ByteScanner,
        table_capacity: usize,
        read_buffer_size: usize,
    ) -> Self {
        Self {
            source,
            scanner,
            table_capacity,
            read_buffer_size,
        }
    }

    /// Empty table with the storage mode matching the source.
    pub fn new_table(&self) -> KeyTable<'s> {
        let storage = if self.source.mapped().is_some() {
            KeyStorage::Borrowed
        } else {
            KeyStorage::Owned
        };
        KeyTable::new(self.table_capacity, storage)
    }

    pub fn run(&self, chunk: Chunk) -> Result<KeyTable<'s>> {
        let source: &'s dyn ByteSource = self.source;
        let mut table = self.new_table();

        match source.mapped() {
            Some(bytes) => {
                scan_records(
                    &self.scanner,
                    bytes,
                    chunk.start as usize,
                    chunk.end() as usize,
                    |key, value| {
                        table.get_or_create(key)?.apply(value);
                        Ok(())
                    },
                )?;
            }
            None => self.run_windowed(chunk, &mut table)?,
        }

        Ok(table)
    }

    /// Positioned reads through one reusable buffer. Every record that starts
    /// in the logical part of a window ends inside the margin behind it.
    fn run_windowed(&self, chunk: Chunk, table: &mut KeyTable<'s>) -> Result<()> {
        let file_len = self.source.len();
        let margin = LEFTOVER_MIN_BYTES as u64;
        let mut buffer = vec![0u8; self.read_buffer_size + LEFTOVER_MIN_BYTES];
        let mut pos = chunk.start;

        while pos < chunk.end() {
            let logical = (self.read_buffer_size as u64).min(chunk.end() - pos);
            let to_read = (file_len - pos).min(logical + margin) as usize;
            let window = &mut buffer[..to_read];
            self.source.read_at(pos, window)?;

            let consumed = scan_records(&self.scanner, window, 0, logical as usize, |key, value| {
                table.get_or_create_transient(key)?.apply(value);
                Ok(())
            })?;
            pos += consumed as u64;
        }
        Ok(())
    }

    /// Fold the padded leftover copy into `table`.
    pub fn scan_leftover(&self, table: &mut KeyTable<'s>, leftover: &PaddedLeftover) -> Result<()> {
        scan_leftover(&self.scanner, table, leftover)
    }
}

pub fn scan_leftover(
    scanner: &ByteScanner,
    table: &mut KeyTable<'_>,
    leftover: &PaddedLeftover,
) -> Result<()> {
    scan_records(
        scanner,
        leftover.as_bytes(),
        0,
        leftover.records_len(),
        |key, value| {
            table.get_or_create_transient(key)?.apply(value);
            Ok(())
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::InMemorySource;
    use crate::utils::constants::DEFAULT_TABLE_CAPACITY;

    /// Positioned reads only, to drive the windowed path.
    struct UnmappedSource(InMemorySource);

    impl ByteSource for UnmappedSource {
        fn len(&self) -> u64 {
            self.0.len()
        }

        fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
            self.0.read_at(offset, buf)
        }
    }

    fn stats(table: &KeyTable<'_>, key: &str) -> (i32, i32, i64, u64) {
        let acc = table.get(key.as_bytes()).unwrap();
        (acc.min, acc.max, acc.sum, acc.count)
    }

    #[test]
    fn test_scan_records_newline_and_crlf() {
        let text = b"Hamburg;12.0\r\nBerlin;-3.5\nHamburg;8.4\n";
        let mut seen = Vec::new();
        let end = scan_records(&ByteScanner::new(), text, 0, text.len(), |key, value| {
            seen.push((String::from_utf8_lossy(key).into_owned(), value));
            Ok(())
        })
        .unwrap();

        assert_eq!(end, text.len());
        assert_eq!(
            seen,
            vec![
                ("Hamburg".to_string(), 120),
                ("Berlin".to_string(), -35),
                ("Hamburg".to_string(), 84),
            ]
        );
    }

    #[test]
    fn test_missing_delimiter_is_error() {
        let text = b"Hamburg 12.0\n";
        let result = scan_records(&ByteScanner::new(), text, 0, text.len(), |_, _| Ok(()));
        assert!(matches!(result, Err(ProcessingError::InvalidFormat(_))));
    }

    #[test]
    fn test_leftover_claim_is_taken_once() {
        let claim = LeftoverClaim::new();
        assert!(!claim.is_claimed());
        assert!(claim.try_claim());
        assert!(!claim.try_claim());
        assert!(claim.is_claimed());
    }

    #[test]
    fn test_padded_leftover_adds_terminator() {
        let source = InMemorySource::new(b"A;1.0\nB;2.5".to_vec());
        let leftover = PaddedLeftover::load(&source, Chunk::new(0, 11)).unwrap();

        assert_eq!(leftover.records_len(), 12);
        assert_eq!(&leftover.as_bytes()[..12], b"A;1.0\nB;2.5\n");
        assert_eq!(leftover.as_bytes().len(), 12 + LEFTOVER_MIN_BYTES);

        let mut table = KeyTable::new(16, KeyStorage::Owned);
        scan_leftover(&ByteScanner::new(), &mut table, &leftover).unwrap();
        assert_eq!(stats(&table, "B"), (25, 25, 25, 1));
    }

    #[test]
    fn test_mapped_and_windowed_runs_agree() {
        let mut text = String::new();
        for i in 0..2000 {
            text.push_str(&format!("station{};{}.{}\n", i % 37, (i % 150) as i32 - 75, i % 10));
        }
        text.push_str(&"x".repeat(200));
        let body_end = text.len() - 200;
        let chunk = Chunk::new(0, body_end as u64);

        let mapped = InMemorySource::new(text.clone().into_bytes());
        let unmapped = UnmappedSource(InMemorySource::new(text.into_bytes()));

        let scanner = ByteScanner::new();
        let a = ChunkWorker::new(&mapped, scanner, DEFAULT_TABLE_CAPACITY, 4096)
            .run(chunk)
            .unwrap();
        // tiny windows force many refills with records straddling them
        let b = ChunkWorker::new(&unmapped, scanner, DEFAULT_TABLE_CAPACITY, 64)
            .run(chunk)
            .unwrap();

        assert_eq!(a.storage(), KeyStorage::Borrowed);
        assert_eq!(b.storage(), KeyStorage::Owned);
        assert_eq!(a.len(), 37);
        assert_eq!(b.len(), 37);
        for (name, acc) in a.iter() {
            assert_eq!(b.get(name.as_bytes()), Some(acc), "station {}", name);
        }
    }

    #[test]
    fn test_capacity_exceeded_propagates() {
        let source = InMemorySource::new(b"a;1.0\nb;1.0\nc;1.0\n".to_vec());
        let worker = ChunkWorker::new(&source, ByteScanner::new(), 2, 4096);
        let result = worker.run(Chunk::new(0, 18));
        assert!(matches!(
            result,
            Err(ProcessingError::CapacityExceeded { .. })
        ));
    }
}
