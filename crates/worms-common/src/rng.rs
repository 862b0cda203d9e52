// rng.rs -- deterministic multiplicative generator shared by protocol state
//
// The sequence is part of the wire protocol: game ids and spawn positions
// are drawn from it, so the exact recurrence and the return-then-advance
// order must never change.

const MULTIPLIER: u64 = 279_410_273;
const MODULUS: u64 = 4_294_967_291;

/// Protocol random number generator.
///
/// `next_rand` returns the *current* state and then advances it by
/// `state <- state * 279410273 mod 4294967291`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn from_seed(seed: u32) -> Self {
        Self {
            state: u64::from(seed),
        }
    }

    pub fn next_rand(&mut self) -> u64 {
        let ret = self.state;
        self.state = self.state * MULTIPLIER % MODULUS;
        ret
    }
}
