//! The xorwow generator the fractal draws its displacements from.
//!
//! State is six signed 32-bit words. Right shifts are arithmetic and every
//! addition wraps, so the same sequence comes out of the host evaluator and
//! the WGSL fragment stage.

/// Priming steps taken after seeding, before the first sample is read.
pub const PRIMING_STEPS: usize = 15;

/// Increment of the Weyl word.
const WEYL_INCREMENT: i32 = 362_437;

/// Xorshift scrambling applied to seed words.
#[must_use]
pub const fn scramble(mut y: i32) -> i32 {
    y ^= y << 13;
    y ^= y >> 17;
    y ^= y << 5;
    y
}

/// Seeded xorwow state.
///
/// Iterating yields one raw sample per step (advance, then read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Xorwow {
    state: [i32; 6],
}

impl Xorwow {
    /// Seed from two words. `seed_a` fills the even words and `seed_b` the
    /// odd ones, each scrambled again before every store.
    #[must_use]
    pub fn new(seed_a: i32, seed_b: i32) -> Self {
        let mut a = seed_a;
        let mut b = seed_b;
        let mut state = [0; 6];
        for pair in state.chunks_exact_mut(2) {
            a = scramble(a);
            pair[0] = a;
            b = scramble(b);
            pair[1] = b;
        }

        let mut rng = Self { state };
        for _ in 0..PRIMING_STEPS {
            rng.advance();
        }
        rng
    }

    /// Step the state once.
    pub fn advance(&mut self) {
        let s = &mut self.state;
        let t = s[4] ^ (s[4] >> 2);
        s[4] = s[3];
        s[3] = s[2];
        s[2] = s[1];
        s[1] = s[0];
        s[0] = (s[0] ^ (s[0] << 4)) ^ (t ^ (t << 1));
        s[5] = s[5].wrapping_add(WEYL_INCREMENT);
    }

    /// Current output without stepping.
    #[must_use]
    pub const fn sample(&self) -> i32 {
        self.state[0].wrapping_add(self.state[5])
    }

    /// Advance, then read.
    pub fn next_sample(&mut self) -> i32 {
        self.advance();
        self.sample()
    }

    /// Next sample's magnitude scaled into `[0, 1]`.
    pub fn next_unit(&mut self) -> f32 {
        (self.next_sample() as f32).abs() / 2_147_483_648.0
    }

    /// Next sample shifted from the signed range into `[0, 1]`.
    pub fn next_uniform(&mut self) -> f32 {
        self.next_sample() as f32 / 4_294_967_296.0 + 0.5
    }
}

impl Iterator for Xorwow {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        Some(self.next_sample())
    }
}
