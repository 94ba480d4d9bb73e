//! Deterministic random stream.
//!
//! Every random decision in a run flows through one [`RandomStream`]. The
//! generator is Mulberry32: a single `u32` of state, a fixed additive
//! increment per step and two xorshift-multiply mixing rounds. The algorithm
//! is frozen; a given seed and call sequence produce the same outputs on
//! every platform, which is what makes replays and checkpoints exact.
//!
//! The stream is not cryptographically secure.

// Float conversions below are intentional
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

use serde::{Deserialize, Serialize};

/// Additive increment applied to the state on every step.
const INCREMENT: u32 = 0x6D2B_79F5;

/// Scale mapping a `u32` onto `[0, 1)`.
const U32_SCALE: f64 = 4_294_967_296.0;

/// Seeded Mulberry32 number generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomStream {
    state: u32,
}

impl RandomStream {
    /// Create a stream from a seed.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Reset the stream to a raw state.
    ///
    /// Accepts either an original seed or a value previously returned by
    /// [`RandomStream::state`], so an owner can resume mid-stream.
    pub fn set_seed(&mut self, state: u32) {
        self.state = state;
    }

    /// Raw generator state.
    #[must_use]
    pub const fn state(&self) -> u32 {
        self.state
    }

    /// Advance one step and return the raw 32-bit output.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(INCREMENT);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Uniform float in `[0, 1)`.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> f64 {
        f64::from(self.next_u32()) / U32_SCALE
    }

    /// Uniform integer in `[min, max]`, both ends inclusive.
    ///
    /// Reversed bounds are swapped rather than rejected. The span is taken in
    /// `i128`, so any pair of `i64` bounds is accepted.
    pub fn next_int(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let (lo, hi) = (i128::from(lo), i128::from(hi));
        let span = (hi - lo + 1) as f64;
        let offset = (self.next() * span).floor() as i128;
        // Rounding of a span past 2^53 can land one step beyond `hi`.
        (lo + offset).min(hi) as i64
    }

    /// Uniform float in `[lo, hi)`.
    pub fn next_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next() * (hi - lo)
    }

    /// Fair coin flip.
    pub fn next_boolean(&mut self) -> bool {
        self.next() < 0.5
    }

    /// Returns `true` with probability `p`.
    ///
    /// Always consumes exactly one draw, including for `p <= 0` and `p >= 1`,
    /// so changing a probability never shifts the rest of the stream.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next() < p
    }

    /// Uniform index in `[0, len)`. Consumes one draw; `len` must be > 0.
    pub fn index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "index() over an empty range");
        ((self.next() * len as f64).floor() as usize).min(len.saturating_sub(1))
    }

    /// Choose an element uniformly. `None` for an empty slice (no draw).
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.index(items.len());
        items.get(idx)
    }
}

impl rand::RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        RandomStream::next_u32(self)
    }

    fn next_u64(&mut self) -> u64 {
        let high = u64::from(RandomStream::next_u32(self));
        let low = u64::from(RandomStream::next_u32(self));
        (high << 32) | low
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = RandomStream::next_u32(self).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl rand::SeedableRng for RandomStream {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_golden_sequence_seed_42() {
        let mut rng = RandomStream::new(42);
        let outputs: Vec<u32> = (0..10).map(|_| rng.next_u32()).collect();
        assert_eq!(
            outputs,
            vec![
                2_581_720_956,
                1_925_393_290,
                3_661_312_704,
                2_876_485_805,
                750_819_978,
                2_261_697_747,
                1_173_505_300,
                2_683_257_857,
                3_717_185_310,
                2_028_586_305,
            ]
        );
        assert_eq!(rng.state(), 1_135_788_988);
    }

    #[test]
    fn test_next_is_unit_interval() {
        let mut rng = RandomStream::new(42);
        let first = rng.next();
        assert!((first - 0.601_103_751_920_163_6).abs() < 1e-15);
        for _ in 0..10_000 {
            let v = rng.next();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_set_seed_resumes_mid_stream() {
        let mut a = RandomStream::new(7);
        for _ in 0..25 {
            a.next_u32();
        }
        let mut b = RandomStream::new(0);
        b.set_seed(a.state());
        for _ in 0..25 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_next_int_inclusive_bounds() {
        let mut rng = RandomStream::new(7);
        let rolls: Vec<i64> = (0..8).map(|_| rng.next_int(1, 6)).collect();
        assert_eq!(rolls, vec![1, 1, 6, 5, 4, 3, 3, 2]);

        let mut rng = RandomStream::new(99);
        for _ in 0..1000 {
            let v = rng.next_int(-3, 3);
            assert!((-3..=3).contains(&v));
        }
        assert_eq!(rng.next_int(5, 5), 5);
    }

    #[test]
    fn test_next_int_swaps_reversed_bounds() {
        let mut a = RandomStream::new(3);
        let mut b = RandomStream::new(3);
        assert_eq!(a.next_int(9, 2), b.next_int(2, 9));
    }

    #[test]
    fn test_next_int_extreme_bounds() {
        let mut rng = RandomStream::new(17);
        for _ in 0..1000 {
            assert!(rng.next_int(0, i64::MAX) >= 0);
            let _ = rng.next_int(i64::MIN, i64::MAX);
            assert!(rng.next_int(i64::MIN, -1) < 0);
        }
        assert_eq!(rng.next_int(i64::MAX, i64::MAX), i64::MAX);
        assert_eq!(rng.next_int(i64::MIN, i64::MIN), i64::MIN);

        let mut a = RandomStream::new(23);
        let mut b = RandomStream::new(23);
        assert_eq!(a.next_int(i64::MAX, i64::MIN), b.next_int(i64::MIN, i64::MAX));
    }

    #[test]
    fn test_pick() {
        let mut rng = RandomStream::new(11);
        let empty: [u8; 0] = [];
        let before = rng.state();
        assert!(rng.pick(&empty).is_none());
        assert_eq!(rng.state(), before);

        let items = ["a", "b", "c"];
        for _ in 0..100 {
            assert!(items.contains(rng.pick(&items).unwrap_or(&"missing")));
        }
    }

    #[test]
    fn test_chance_always_consumes_one_draw() {
        let mut a = RandomStream::new(5);
        let mut b = RandomStream::new(5);
        assert!(!a.chance(0.0));
        b.next();
        assert_eq!(a.state(), b.state());
        assert!(a.chance(1.0));
    }

    #[test]
    fn test_rngcore_interop() {
        let mut rng = RandomStream::new(42);
        let v: u32 = rng.gen_range(10..20);
        assert!((10..20).contains(&v));

        let mut bytes = [0u8; 7];
        rand::RngCore::fill_bytes(&mut rng, &mut bytes);
        assert!(bytes.iter().any(|&b| b != 0));
    }
}
