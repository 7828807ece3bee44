//! Fixed-capacity hash table from station names to running statistics.
//!
//! Entries live in an index arena (`entries`), and a separate bucket array
//! holds 1-based indices into it, so `0` means an empty bucket. Collisions in
//! a bucket are chained through `Entry::next` (`-1` ends the chain). Entries
//! are appended and never removed, which makes iteration order the insertion
//! order.
//!
//! Key bytes are either borrowed from a persistent source buffer (a memory
//! mapping that outlives the table) or copied once into a private
//! append-only arena. The choice is fixed at construction with
//! [`KeyStorage`]; keys coming from transient read windows are always copied.

use crate::error::{ProcessingError, Result};
use crate::models::{Accumulator, StationName};

/// Where the table keeps the bytes of the keys it stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStorage {
    /// Keys point into the source buffer, which must outlive the table.
    Borrowed,
    /// Keys are copied into the table's own arena on first sight.
    Owned,
}

#[derive(Debug, Clone, Copy)]
enum StoredKey<'a> {
    Borrowed(&'a [u8]),
    Arena { offset: u32, len: u32 },
}

/// Key presented to the table, tagged with whether its bytes may be retained.
#[derive(Clone, Copy)]
enum KeyBytes<'a, 'k> {
    Persistent(&'a [u8]),
    Transient(&'k [u8]),
}

impl KeyBytes<'_, '_> {
    fn bytes(&self) -> &[u8] {
        match *self {
            KeyBytes::Persistent(bytes) => bytes,
            KeyBytes::Transient(bytes) => bytes,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<'a> {
    hash: u32,
    key: StoredKey<'a>,
    value: Accumulator,
    next: i32,
}

pub struct KeyTable<'a> {
    buckets: Vec<u32>,
    entries: Vec<Entry<'a>>,
    arena: Vec<u8>,
    storage: KeyStorage,
    limit: u32,
    size: u32,
    fast_mod_multiplier: u64,
}

impl<'a> KeyTable<'a> {
    /// Create a table holding at most `capacity` distinct keys.
    ///
    /// The bucket count is rounded up to a prime so that `hash % size`
    /// spreads the weak prefix hash.
    pub fn new(capacity: usize, storage: KeyStorage) -> Self {
        let limit = capacity.clamp(1, u32::MAX as usize) as u32;
        let size = next_prime(limit);
        Self {
            buckets: vec![0; size as usize],
            entries: Vec::with_capacity(limit as usize),
            arena: Vec::new(),
            storage,
            limit,
            size,
            fast_mod_multiplier: fast_mod_multiplier(size),
        }
    }

    pub fn storage(&self) -> KeyStorage {
        self.storage
    }

    /// Maximum number of distinct keys.
    pub fn capacity(&self) -> usize {
        self.limit as usize
    }

    pub fn bucket_count(&self) -> usize {
        self.size as usize
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accumulator for `key`, inserting an empty one on first sight.
    ///
    /// With [`KeyStorage::Borrowed`] the table keeps `key` itself, otherwise
    /// the bytes are copied into the arena.
    #[inline(always)]
    pub fn get_or_create(&mut self, key: &'a [u8]) -> Result<&mut Accumulator> {
        let hash = StationName::new(key).table_hash();
        let index = self.find_or_insert(hash, KeyBytes::Persistent(key))?;
        Ok(&mut self.entries[index].value)
    }

    /// Like [`KeyTable::get_or_create`] for keys in a buffer that will be
    /// overwritten; the bytes are always copied.
    #[inline(always)]
    pub fn get_or_create_transient(&mut self, key: &[u8]) -> Result<&mut Accumulator> {
        let hash = StationName::new(key).table_hash();
        let index = self.find_or_insert(hash, KeyBytes::Transient(key))?;
        Ok(&mut self.entries[index].value)
    }

    pub fn get(&self, key: &[u8]) -> Option<&Accumulator> {
        let hash = StationName::new(key).table_hash();
        self.find(hash, key).map(|index| &self.entries[index].value)
    }

    /// Fold every entry of `other` into this table, consuming it.
    pub fn merge_from(&mut self, other: KeyTable<'a>) -> Result<()> {
        let KeyTable { entries, arena, .. } = other;
        for entry in entries {
            let key = match entry.key {
                StoredKey::Borrowed(bytes) => KeyBytes::Persistent(bytes),
                StoredKey::Arena { offset, len } => {
                    KeyBytes::Transient(&arena[offset as usize..(offset + len) as usize])
                }
            };
            let index = self.find_or_insert(entry.hash, key)?;
            self.entries[index].value.merge(&entry.value);
        }
        Ok(())
    }

    /// All entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (StationName<'_>, &Accumulator)> + '_ {
        self.entries
            .iter()
            .map(|entry| (StationName::new(resolve(&self.arena, &entry.key)), &entry.value))
    }

    fn bucket_of(&self, hash: u32) -> usize {
        fast_mod(hash, self.size, self.fast_mod_multiplier) as usize
    }

    fn find(&self, hash: u32, key: &[u8]) -> Option<usize> {
        let mut i = self.buckets[self.bucket_of(hash)] as i32 - 1;
        while i >= 0 {
            let entry = &self.entries[i as usize];
            if entry.hash == hash && resolve(&self.arena, &entry.key) == key {
                return Some(i as usize);
            }
            i = entry.next;
        }
        None
    }

    #[inline(always)]
    fn find_or_insert(&mut self, hash: u32, key: KeyBytes<'a, '_>) -> Result<usize> {
        if let Some(index) = self.find(hash, key.bytes()) {
            return Ok(index);
        }
        self.insert(hash, key)
    }

    #[cold]
    fn insert(&mut self, hash: u32, key: KeyBytes<'a, '_>) -> Result<usize> {
        if self.entries.len() >= self.limit as usize {
            return Err(ProcessingError::CapacityExceeded {
                capacity: self.capacity(),
            });
        }

        let stored = match (key, self.storage) {
            (KeyBytes::Persistent(bytes), KeyStorage::Borrowed) => StoredKey::Borrowed(bytes),
            _ => {
                let bytes = key.bytes();
                let offset = self.arena.len() as u32;
                self.arena.extend_from_slice(bytes);
                StoredKey::Arena {
                    offset,
                    len: bytes.len() as u32,
                }
            }
        };

        let bucket = self.bucket_of(hash);
        let index = self.entries.len();
        self.entries.push(Entry {
            hash,
            key: stored,
            value: Accumulator::new(),
            next: self.buckets[bucket] as i32 - 1,
        });
        self.buckets[bucket] = index as u32 + 1;
        Ok(index)
    }
}

fn resolve<'s, 'a: 's>(arena: &'s [u8], key: &'s StoredKey<'a>) -> &'s [u8] {
    match *key {
        StoredKey::Borrowed(bytes) => bytes,
        StoredKey::Arena { offset, len } => &arena[offset as usize..(offset + len) as usize],
    }
}

const PRIMES: [u32; 72] = [
    3, 7, 11, 17, 23, 29, 37, 47, 59, 71, 89, 107, 131, 163, 197, 239, 293, 353, 431, 521, 631,
    761, 919, 1103, 1327, 1597, 1931, 2333, 2801, 3371, 4049, 4861, 5839, 7013, 8419, 10103,
    12143, 14591, 17519, 21023, 25229, 30293, 36353, 43627, 52361, 62851, 75431, 90523, 108631,
    130363, 156437, 187751, 225307, 270371, 324449, 389357, 467237, 560689, 672827, 807403,
    968897, 1162687, 1395263, 1674319, 2009191, 2411033, 2893249, 3471899, 4166287, 4999559,
    5999471, 7199369,
];

fn is_prime(candidate: u32) -> bool {
    if candidate & 1 == 0 {
        return candidate == 2;
    }
    let mut divisor = 3u32;
    while (divisor as u64) * (divisor as u64) <= candidate as u64 {
        if candidate % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    candidate > 1
}

fn next_prime(min: u32) -> u32 {
    if let Some(&prime) = PRIMES.iter().find(|&&prime| prime >= min) {
        return prime;
    }
    ((min | 1)..u32::MAX)
        .step_by(2)
        .find(|&candidate| is_prime(candidate))
        .unwrap_or(min)
}

fn fast_mod_multiplier(divisor: u32) -> u64 {
    u64::MAX / divisor as u64 + 1
}

/// `value % divisor` without a division, for a fixed divisor below 2^31.
#[inline(always)]
fn fast_mod(value: u32, divisor: u32, multiplier: u64) -> u32 {
    let lowbits = multiplier.wrapping_mul(value as u64);
    ((((lowbits >> 32) + 1) * divisor as u64) >> 32) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_count_rounds_to_prime() {
        let table = KeyTable::new(10_000, KeyStorage::Borrowed);
        assert_eq!(table.capacity(), 10_000);
        assert_eq!(table.bucket_count(), 10_103);
        assert!(table.is_empty());

        assert_eq!(next_prime(8_000_000), 8_000_009);
        assert!(is_prime(next_prime(8_000_000)));
    }

    #[test]
    fn test_fast_mod_matches_remainder() {
        for divisor in [3u32, 131, 10_103, 1_395_263] {
            let multiplier = fast_mod_multiplier(divisor);
            for value in [0u32, 1, 2, divisor - 1, divisor, 123_456_789, u32::MAX] {
                assert_eq!(fast_mod(value, divisor, multiplier), value % divisor);
            }
        }
    }

    #[test]
    fn test_get_or_create_accumulates() -> Result<()> {
        let source = b"Hamburg;Berlin;Hamburg".to_vec();
        let mut table = KeyTable::new(16, KeyStorage::Borrowed);

        table.get_or_create(&source[0..7])?.apply(120);
        table.get_or_create(&source[8..14])?.apply(-35);
        table.get_or_create(&source[15..22])?.apply(84);

        assert_eq!(table.len(), 2);
        let hamburg = table.get(b"Hamburg").unwrap();
        assert_eq!((hamburg.min, hamburg.max, hamburg.sum, hamburg.count), (84, 120, 204, 2));
        assert_eq!(table.get(b"Berlin").unwrap().count, 1);
        assert!(table.get(b"Munich").is_none());
        Ok(())
    }

    #[test]
    fn test_colliding_keys_stay_separate() -> Result<()> {
        // Same prefix and length gives the same hash
        let mut table = KeyTable::new(16, KeyStorage::Owned);
        table.get_or_create_transient(b"Port Said")?.apply(10);
        table.get_or_create_transient(b"Port Lous")?.apply(20);
        table.get_or_create_transient(b"Port Said")?.apply(30);

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(b"Port Said").unwrap().sum, 40);
        assert_eq!(table.get(b"Port Lous").unwrap().sum, 20);
        Ok(())
    }

    #[test]
    fn test_transient_keys_survive_buffer_reuse() -> Result<()> {
        let mut table = KeyTable::new(16, KeyStorage::Owned);
        let mut window = b"Oslo".to_vec();
        table.get_or_create_transient(&window)?.apply(5);
        window.copy_from_slice(b"Rome");
        table.get_or_create_transient(&window)?.apply(7);

        let names: Vec<String> = table.iter().map(|(name, _)| name.to_string()).collect();
        assert_eq!(names, vec!["Oslo", "Rome"]);
        Ok(())
    }

    #[test]
    fn test_capacity_exceeded_is_an_error() -> Result<()> {
        let mut table = KeyTable::new(3, KeyStorage::Owned);
        for key in [&b"a"[..], b"b", b"c"] {
            table.get_or_create_transient(key)?.apply(1);
        }

        let result = table.get_or_create_transient(b"d");
        assert!(matches!(
            result,
            Err(ProcessingError::CapacityExceeded { capacity: 3 })
        ));

        // Existing entries are untouched, and known keys still resolve
        assert_eq!(table.len(), 3);
        table.get_or_create_transient(b"a")?.apply(2);
        assert_eq!(table.get(b"a").unwrap().count, 2);
        Ok(())
    }

    #[test]
    fn test_capacity_is_the_requested_limit() -> Result<()> {
        // two keys fit even though the bucket count is the prime 3
        let mut table = KeyTable::new(2, KeyStorage::Owned);
        assert_eq!(table.bucket_count(), 3);
        table.get_or_create_transient(b"a")?.apply(1);
        table.get_or_create_transient(b"b")?.apply(1);

        assert!(matches!(
            table.get_or_create_transient(b"c"),
            Err(ProcessingError::CapacityExceeded { capacity: 2 })
        ));
        assert_eq!(table.len(), 2);
        Ok(())
    }

    #[test]
    fn test_merge_from_combines_and_inserts() -> Result<()> {
        let source = b"AlphaBetaGamma".to_vec();
        let mut left = KeyTable::new(16, KeyStorage::Borrowed);
        left.get_or_create(&source[0..5])?.apply(10);
        left.get_or_create(&source[5..9])?.apply(-20);

        let mut right = KeyTable::new(16, KeyStorage::Owned);
        right.get_or_create_transient(b"Beta")?.apply(40);
        right.get_or_create_transient(b"Gamma")?.apply(0);

        left.merge_from(right)?;

        assert_eq!(left.len(), 3);
        let beta = left.get(b"Beta").unwrap();
        assert_eq!((beta.min, beta.max, beta.sum, beta.count), (-20, 40, 20, 2));
        assert_eq!(left.get(b"Gamma").unwrap().count, 1);
        Ok(())
    }

    #[test]
    fn test_iter_is_insertion_order() -> Result<()> {
        let mut table = KeyTable::new(64, KeyStorage::Owned);
        for key in ["zeta", "alpha", "mu", "alpha"] {
            table.get_or_create_transient(key.as_bytes())?.apply(1);
        }
        let names: Vec<String> = table.iter().map(|(name, _)| name.to_string()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mu"]);
        Ok(())
    }
}
