//! Fixed-point decoding of `-?\d{1,2}\.\d` temperatures into tenths.
//!
//! The fast path loads eight bytes as a little-endian word and never loops:
//!
//! - the decimal point is the only byte among bytes 1..=3 with bit 4 clear
//!   (digits are `0x30..=0x39`, `.` is `0x2E`);
//! - byte 0 has bit 4 clear exactly when it is `-`, which gives the sign;
//! - shifting the word so the point lands on byte 3 lines the digits up at
//!   fixed positions, and one multiply folds them into `hundreds*100 +
//!   tens*10 + ones` in bits 32..42.
//!
//! The result is sign × magnitude, so `-0.0` decodes to `0`. Input that does
//! not have the guaranteed shape produces an unspecified value but never
//! panics, and the returned offset always advances by at least three bytes.

use crate::utils::constants::DECODER_WINDOW;

const DOT_BITS: i64 = 0x1010_1000;
const DIGIT_MASK: i64 = 0x0F_000F_0F00;
const MAGIC_MULTIPLIER: i64 = 0x640A_0001;

/// Decode the value starting at `bytes[0]`.
///
/// Returns the value in tenths and the offset just past the record
/// terminator (`\n` or `\r\n`), i.e. the start of the next record.
#[inline(always)]
pub fn decode(bytes: &[u8]) -> (i32, usize) {
    match bytes.first_chunk::<DECODER_WINDOW>() {
        Some(window) => decode_word(u64::from_le_bytes(*window)),
        None => decode_scalar(bytes),
    }
}

/// Branch-free decode of a value held in the low bytes of `word`.
#[inline(always)]
pub fn decode_word(word: u64) -> (i32, usize) {
    let word = word as i64;
    let negated = !word;
    let dot_pos = (negated & DOT_BITS).trailing_zeros() & 31;
    let signed = (negated << 59) >> 63;
    let remove_sign_mask = !(signed & 0xFF);
    let digits = ((word & remove_sign_mask) << (28 - dot_pos)) & DIGIT_MASK;
    let abs_value = (digits.wrapping_mul(MAGIC_MULTIPLIER) >> 32) & 0x3FF;
    let value = (abs_value ^ signed) - signed;

    let dot_index = (dot_pos / 8) as usize;
    let carriage_return = ((word >> ((dot_index + 2) * 8)) & 0xFF == b'\r' as i64) as usize;
    (value as i32, dot_index + 3 + carriage_return)
}

/// Straight-line decode for buffers shorter than the word window.
///
/// Also accepts a value with no terminator, as the very last record of a
/// file may have; the returned offset then points just past the fraction.
pub fn decode_scalar(bytes: &[u8]) -> (i32, usize) {
    let digit = |i: usize| bytes.get(i).map_or(0, |b| b.wrapping_sub(b'0') as i32);

    let negative = bytes.first() == Some(&b'-');
    let mut i = negative as usize;

    let mut magnitude = digit(i);
    i += 1;
    if bytes.get(i).is_some_and(|&b| b != b'.') {
        magnitude = magnitude * 10 + digit(i);
        i += 1;
    }
    // point, then fraction
    i += 1;
    magnitude = magnitude * 10 + digit(i);
    i += 1;

    if bytes.get(i) == Some(&b'\r') {
        i += 1;
    }
    if bytes.get(i) == Some(&b'\n') {
        i += 1;
    }

    (if negative { -magnitude } else { magnitude }, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format_value(tenths: i32) -> String {
        let sign = if tenths < 0 { "-" } else { "" };
        format!("{}{}.{}", sign, tenths.abs() / 10, tenths.abs() % 10)
    }

    #[test]
    fn test_decode_full_range_with_newline() {
        for tenths in -999..=999 {
            let text = format_value(tenths);
            let line = format!("{}\nNext;1.0\n", text);
            assert_eq!(
                decode(line.as_bytes()),
                (tenths, text.len() + 1),
                "value {}",
                text
            );
        }
    }

    #[test]
    fn test_decode_full_range_with_crlf() {
        for tenths in -999..=999 {
            let text = format_value(tenths);
            let line = format!("{}\r\nNext;1.0\r\n", text);
            assert_eq!(decode(line.as_bytes()), (tenths, text.len() + 2), "value {}", text);
        }
    }

    #[test]
    fn test_scalar_matches_word_path() {
        for tenths in -999..=999 {
            let text = format_value(tenths);
            for terminator in ["\n", "\r\n"] {
                let line = format!("{}{}", text, terminator);
                let mut padded = line.clone().into_bytes();
                padded.resize(16, 0);
                assert_eq!(decode_scalar(line.as_bytes()), decode(&padded));
            }
        }
    }

    #[test]
    fn test_negative_zero_is_zero() {
        assert_eq!(decode(b"-0.0\nA;1.0\n"), (0, 5));
        assert_eq!(decode_scalar(b"-0.0\n"), (0, 5));
    }

    #[test]
    fn test_missing_final_terminator() {
        assert_eq!(decode_scalar(b"-12.3"), (-123, 5));
        assert_eq!(decode_scalar(b"4.5"), (45, 3));
        assert_eq!(decode(b"4.5"), (45, 3));
    }

    #[test]
    fn test_malformed_input_still_advances() {
        let (_, consumed) = decode(b"abcdefgh");
        assert!(consumed >= 3);
        let (_, consumed) = decode_scalar(b"");
        assert!(consumed >= 3);
    }
}
