use serde::{Deserialize, Serialize};

/// Running statistics for one station, in tenths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulator {
    pub min: i32,
    pub max: i32,
    pub sum: i64,
    pub count: u64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    /// Empty accumulator, the identity for [`Accumulator::merge`].
    pub const fn new() -> Self {
        Self {
            min: i32::MAX,
            max: i32::MIN,
            sum: 0,
            count: 0,
        }
    }

    pub fn from_value(value: i32) -> Self {
        Self {
            min: value,
            max: value,
            sum: value as i64,
            count: 1,
        }
    }

    #[inline(always)]
    pub fn apply(&mut self, value: i32) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value as i64;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &Accumulator) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean in tenths, rounded half away from zero.
    pub fn mean_tenths(&self) -> i64 {
        debug_assert!(self.count > 0, "mean of an empty accumulator");
        let count = self.count.max(1) as i128;
        let sum = self.sum as i128;
        let rounded = (2 * sum.abs() + count) / (2 * count);
        (if sum < 0 { -rounded } else { rounded }) as i64
    }
}

/// Render a tenths value with exactly one decimal place.
pub fn format_tenths(tenths: i64) -> String {
    let sign = if tenths < 0 { "-" } else { "" };
    let magnitude = tenths.unsigned_abs();
    format!("{}{}.{}", sign, magnitude / 10, magnitude % 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_tracks_extremes() {
        let mut acc = Accumulator::new();
        for value in [120, -35, 84] {
            acc.apply(value);
        }

        assert_eq!(acc.min, -35);
        assert_eq!(acc.max, 120);
        assert_eq!(acc.sum, 169);
        assert_eq!(acc.count, 3);
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let mut acc = Accumulator::from_value(42);
        acc.merge(&Accumulator::new());
        assert_eq!(acc, Accumulator::from_value(42));

        let mut empty = Accumulator::new();
        empty.merge(&Accumulator::from_value(42));
        assert_eq!(empty, Accumulator::from_value(42));
    }

    #[test]
    fn test_mean_rounding() {
        let mut acc = Accumulator::from_value(120);
        acc.apply(84);
        assert_eq!(acc.mean_tenths(), 102);

        // 0.05 rounds away from zero on both sides
        let mut positive = Accumulator::from_value(0);
        positive.apply(1);
        assert_eq!(positive.mean_tenths(), 1);

        let mut negative = Accumulator::from_value(0);
        negative.apply(-1);
        assert_eq!(negative.mean_tenths(), -1);

        let mut thirds = Accumulator::from_value(1);
        thirds.apply(0);
        thirds.apply(0);
        assert_eq!(thirds.mean_tenths(), 0);
    }

    #[test]
    fn test_format_tenths() {
        assert_eq!(format_tenths(0), "0.0");
        assert_eq!(format_tenths(-5), "-0.5");
        assert_eq!(format_tenths(-35), "-3.5");
        assert_eq!(format_tenths(999), "99.9");
        assert_eq!(format_tenths(-999), "-99.9");
    }
}
