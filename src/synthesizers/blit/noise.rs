const SEED: u64 = 22222;

/// White noise from a xoroshiro-style generator. Resets to the same sequence.
#[derive(Debug, Copy, Clone)]
pub struct NoiseGenerator {
    s0: u64,
    s1: u64,
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        let mut noise = Self { s0: 0, s1: 0 };
        noise.reset();
        noise
    }
}

impl NoiseGenerator {
    pub fn reset(&mut self) {
        self.s0 = 0xdeadbeef;
        self.s1 = SEED ^ 0xfeeddddd;
    }

    fn next(&mut self) -> u64 {
        let s0 = self.s0;
        let mut s1 = self.s1;
        let r = s0.wrapping_add(s1);

        s1 ^= s0;
        self.s0 = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.s1 = s1.rotate_left(37);
        r
    }

    /// Uniform sample in [-1, 1).
    pub fn next_value(&mut self) -> f32 {
        // The top 24 bits are the best ones and fit an f32 mantissa exactly.
        let bits = self.next() >> 40;
        bits as f32 / (1u32 << 23) as f32 - 1.0
    }
}
