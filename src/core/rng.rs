// Copyright @yucwang 2026

use crate::math::constants::{Float, ONE_MINUS_EPSILON};

/// Host-side generator: draws the per-lane seeds handed to the seeding kernel.
pub struct LcgRng {
    state: u64,
}

impl LcgRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.state >> 32) as u32
    }
}

/// Per-lane generator state: two 32-bit words (xoroshiro64*).
///
/// The all-zero state is a fixed point of the generator, so a zeroed
/// buffer means "not seeded" and must not be consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RandomState {
    pub s0: u32,
    pub s1: u32,
}

impl RandomState {
    /// Expands one host draw into a full, non-zero lane state.
    pub fn from_draw(draw: u32) -> Self {
        let s0 = hash_u32(draw);
        let mut s1 = hash_u32(s0 ^ 0x9E37_79B9);
        if s0 == 0 && s1 == 0 {
            s1 = 1;
        }
        Self { s0, s1 }
    }

    pub fn is_seeded(&self) -> bool {
        self.s0 != 0 || self.s1 != 0
    }

    pub fn next_u32(&mut self) -> u32 {
        let s0 = self.s0;
        let mut s1 = self.s1;
        let result = s0.wrapping_mul(0x9E37_79BB);

        s1 ^= s0;
        self.s0 = s0.rotate_left(26) ^ s1 ^ (s1 << 9);
        self.s1 = s1.rotate_left(13);
        result
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_float(&mut self) -> Float {
        ((self.next_u32() >> 8) as Float * (1.0 / 16_777_216.0)).min(ONE_MINUS_EPSILON)
    }
}

// Integer hash with good avalanche (lowbias32).
fn hash_u32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_is_deterministic() {
        let mut a = LcgRng::new(42);
        let mut b = LcgRng::new(42);
        for _ in 0..64 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_random_state_never_zero_and_in_range() {
        for draw in [0u32, 1, 7, u32::MAX] {
            let mut state = RandomState::from_draw(draw);
            assert!(state.is_seeded());
            for _ in 0..1000 {
                let v = state.next_float();
                assert!((0.0..1.0).contains(&v));
            }
            assert!(state.is_seeded());
        }
        assert!(!RandomState::default().is_seeded());
    }

    #[test]
    fn test_random_state_mean_is_centered() {
        let mut state = RandomState::from_draw(1234);
        let n = 20000;
        let mean: f64 = (0..n).map(|_| state.next_float() as f64).sum::<f64>() / n as f64;
        assert!((mean - 0.5).abs() < 0.02);
    }
}
