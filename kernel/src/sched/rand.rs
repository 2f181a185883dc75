/// Linear congruential generator behind the random policy
///
/// Not cryptographic. Two kernels seeded alike and asked in the same order
/// produce the same picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub const MULTIPLIER: u32 = 1664525;
    pub const INCREMENT: u32 = 1013904223;

    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        self.state
    }

    /// Value in `0..bound`; `bound` must be non-zero
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_u32() % bound as u32) as usize
    }
}
