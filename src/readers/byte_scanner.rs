//! Vectorised search for record delimiters.
//!
//! A [`ByteScanner`] probes the CPU once and then compares up to
//! [`MAX_VECTOR_PROBES`] full-width vector loads against a broadcast needle.
//! Keys are at most 100 bytes, so four 32-byte probes cover any `;` search
//! that starts at a record boundary. When the probes find nothing, or fewer
//! than a full vector of bytes remain, the search resumes at the first
//! unprobed byte with `memchr`.
//!
//! Every vector load is bounds-checked against the slice, so the scanner never
//! reads outside it; the leftover region reserved by the chunk planner only
//! keeps the hot loop on the vector path.

use crate::utils::constants::MAX_VECTOR_PROBES;
use std::fmt;

/// SIMD capability used for scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdLevel {
    /// Plain `memchr`.
    Scalar,
    /// Eight bytes at a time in a general purpose register.
    Swar,
    /// x86_64 SSE2 (16 bytes).
    #[cfg(target_arch = "x86_64")]
    Sse2,
    /// x86_64 AVX2 (32 bytes).
    #[cfg(target_arch = "x86_64")]
    Avx2,
}

impl SimdLevel {
    /// Detect the widest level supported by the running CPU.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            // SSE2 is part of the x86_64 baseline
            if is_x86_feature_detected!("avx2") {
                SimdLevel::Avx2
            } else {
                SimdLevel::Sse2
            }
        }

        #[cfg(not(target_arch = "x86_64"))]
        {
            SimdLevel::Swar
        }
    }

    /// Every level usable on this CPU, narrowest first.
    pub fn available() -> Vec<SimdLevel> {
        let mut levels = vec![SimdLevel::Scalar, SimdLevel::Swar];
        #[cfg(target_arch = "x86_64")]
        {
            levels.push(SimdLevel::Sse2);
            if is_x86_feature_detected!("avx2") {
                levels.push(SimdLevel::Avx2);
            }
        }
        levels
    }

    /// Bytes compared per probe.
    pub fn width(&self) -> usize {
        match self {
            SimdLevel::Scalar => 1,
            SimdLevel::Swar => 8,
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Sse2 => 16,
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx2 => 32,
        }
    }
}

impl fmt::Display for SimdLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimdLevel::Scalar => "scalar",
            SimdLevel::Swar => "swar",
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Sse2 => "sse2",
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx2 => "avx2",
        };
        write!(f, "{} ({} bytes)", name, self.width())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteScanner {
    level: SimdLevel,
}

impl ByteScanner {
    pub fn new() -> Self {
        Self {
            level: SimdLevel::detect(),
        }
    }

    /// Force a level. The caller must make sure the CPU supports it; use
    /// [`SimdLevel::available`] to pick one.
    pub fn with_level(level: SimdLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> SimdLevel {
        self.level
    }

    /// Offset of the first `;` at or after `from`.
    #[inline(always)]
    pub fn index_of_delimiter(&self, buffer: &[u8], from: usize) -> Option<usize> {
        self.find(buffer, from, b';')
    }

    /// Offset and width of the first record terminator at or after `from`.
    ///
    /// A `\r\n` pair is reported at the `\r` with width 2.
    pub fn index_of_line_end(&self, buffer: &[u8], from: usize) -> Option<(usize, usize)> {
        let newline = self.find(buffer, from, b'\n')?;
        if newline > from && buffer[newline - 1] == b'\r' {
            Some((newline - 1, 2))
        } else {
            Some((newline, 1))
        }
    }

    #[inline(always)]
    fn find(&self, buffer: &[u8], from: usize, needle: u8) -> Option<usize> {
        if from >= buffer.len() {
            return None;
        }

        let probed = match self.level {
            SimdLevel::Scalar => Err(from),
            SimdLevel::Swar => swar::find(buffer, from, needle),
            // SAFETY: the level was detected on, or chosen for, this CPU
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Sse2 => unsafe { x86::find_sse2(buffer, from, needle) },
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx2 => unsafe { x86::find_avx2(buffer, from, needle) },
        };

        match probed {
            Ok(found) => Some(found),
            Err(resume) => memchr::memchr(needle, &buffer[resume..]).map(|i| resume + i),
        }
    }
}

impl Default for ByteScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Word-at-a-time search for targets without vector registers.
mod swar {
    use super::MAX_VECTOR_PROBES;

    const LSB_MASK: u64 = 0x0101_0101_0101_0101;
    const MSB_MASK: u64 = 0x8080_8080_8080_8080;

    /// `Ok(offset)` on a hit, `Err(resume_at)` otherwise.
    #[inline(always)]
    pub fn find(buffer: &[u8], from: usize, needle: u8) -> Result<usize, usize> {
        let repeat = LSB_MASK * needle as u64;
        let mut pos = from;
        // Twice the probes, to cover the same span as the 16-byte level
        for _ in 0..MAX_VECTOR_PROBES * 2 {
            let Some(window) = buffer.get(pos..).and_then(|rest| rest.first_chunk::<8>()) else {
                break;
            };
            let xored = u64::from_le_bytes(*window) ^ repeat;
            let matching = xored.wrapping_sub(LSB_MASK) & !xored & MSB_MASK;
            if matching != 0 {
                return Ok(pos + (matching.trailing_zeros() / 8) as usize);
            }
            pos += 8;
        }
        Err(pos)
    }
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::MAX_VECTOR_PROBES;
    use std::arch::x86_64::*;

    /// # Safety
    /// The CPU must support AVX2.
    #[target_feature(enable = "avx2")]
    pub unsafe fn find_avx2(buffer: &[u8], from: usize, needle: u8) -> Result<usize, usize> {
        let pattern = _mm256_set1_epi8(needle as i8);
        let mut pos = from;
        for _ in 0..MAX_VECTOR_PROBES {
            if pos + 32 > buffer.len() {
                break;
            }
            let chunk = _mm256_loadu_si256(buffer.as_ptr().add(pos) as *const __m256i);
            let mask = _mm256_movemask_epi8(_mm256_cmpeq_epi8(chunk, pattern)) as u32;
            if mask != 0 {
                return Ok(pos + mask.trailing_zeros() as usize);
            }
            pos += 32;
        }
        Err(pos)
    }

    /// # Safety
    /// The CPU must support SSE2 (always true on x86_64).
    #[target_feature(enable = "sse2")]
    pub unsafe fn find_sse2(buffer: &[u8], from: usize, needle: u8) -> Result<usize, usize> {
        let pattern = _mm_set1_epi8(needle as i8);
        let mut pos = from;
        for _ in 0..MAX_VECTOR_PROBES * 2 {
            if pos + 16 > buffer.len() {
                break;
            }
            let chunk = _mm_loadu_si128(buffer.as_ptr().add(pos) as *const __m128i);
            let mask = _mm_movemask_epi8(_mm_cmpeq_epi8(chunk, pattern)) as u32;
            if mask != 0 {
                return Ok(pos + mask.trailing_zeros() as usize);
            }
            pos += 16;
        }
        Err(pos)
    }
}
