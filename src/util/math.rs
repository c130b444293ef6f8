
/// Square root rounded to the nearest integer.
#[must_use]
pub fn rounded_sqrt(value: u64) -> u32 {
    (value as f64).sqrt().round() as u32
}

/// Integer division rounding half up. `divisor` must be non-zero.
#[must_use]
pub fn div_round(dividend: u64, divisor: u64) -> u64 {
    (dividend + divisor / 2) / divisor
}

/// Exponential running average with a 1/8 update weight.
#[must_use]
pub fn running_average(average: i32, value: i32) -> i32 {
    (7 * average + value + 4).div_euclid(8)
}

/// Raw moments of two equally sized sample sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairMoments {
    pub count: u64,
    pub sum_a: u64,
    pub sum_b: u64,
    pub sum_aa: u64,
    pub sum_bb: u64,
    pub sum_ab: u64,
}

impl PairMoments {
    #[inline]
    pub fn push(&mut self, a: u8, b: u8) {
        let a = u64::from(a);
        let b = u64::from(b);
        self.count += 1;
        self.sum_a += a;
        self.sum_b += b;
        self.sum_aa += a * a;
        self.sum_bb += b * b;
        self.sum_ab += a * b;
    }

    /// Pearson correlation scaled to -100..=100.
    ///
    /// Two flat sets correlate perfectly; a flat set against a textured one
    /// does not correlate at all.
    #[must_use]
    pub fn correlation_percent(&self) -> i16 {
        if self.count == 0 {
            return 100;
        }
        let n = self.count as f64;
        let var_a = n * self.sum_aa as f64 - (self.sum_a as f64).powi(2);
        let var_b = n * self.sum_bb as f64 - (self.sum_b as f64).powi(2);
        match (var_a > 0.0, var_b > 0.0) {
            (false, false) => 100,
            (true, true) => {
                let cov = n * self.sum_ab as f64 - self.sum_a as f64 * self.sum_b as f64;
                let r = cov / (var_a.sqrt() * var_b.sqrt());
                (r * 100.0).round().clamp(-100.0, 100.0) as i16
            }
            _ => 0,
        }
    }
}
