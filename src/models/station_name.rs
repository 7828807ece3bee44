use std::borrow::Cow;
use std::fmt;

/// Prime multiplier spreading key lengths across buckets.
const LENGTH_MULTIPLIER: u32 = 820_243;

/// Borrowed view of a station name inside a source buffer or table arena.
///
/// The view never owns its bytes; it is valid for as long as the buffer it
/// was sliced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StationName<'a> {
    bytes: &'a [u8],
}

impl<'a> StationName<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Cheap hash over the leading bytes.
    ///
    /// Names of four or more bytes hash their first four bytes with the length
    /// folded in. Shorter names hash their first one or two bytes only, so
    /// `Ab` and `Abc` share a bucket. Names sharing a four byte prefix and a
    /// length (`Port ...`, `Saint ...`) collide too; the table resolves those
    /// by comparing full bytes.
    #[inline(always)]
    pub fn table_hash(&self) -> u32 {
        let bytes = self.bytes;
        match bytes.len() {
            0 => 0,
            1 => bytes[0] as u32,
            2 | 3 => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
            len => {
                let prefix = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                (len as u32).wrapping_mul(LENGTH_MULTIPLIER) ^ prefix
            }
        }
    }

    pub fn to_string_lossy(&self) -> Cow<'a, str> {
        String::from_utf8_lossy(self.bytes)
    }
}

impl fmt::Display for StationName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_lossy())
    }
}
