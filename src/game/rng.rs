//! Session randomness for letter draws, shuffles and particle scatter.
//!
//! A small xorshift64 generator keeps draws cheap and, when built
//! `from_seed`, fully deterministic for tests. The session instance is
//! seeded once per page load from the platform entropy source so repeated
//! loads do not replay the same letter sequence.

use std::cell::RefCell;

// Seed of last resort when the entropy source fails; any nonzero value works.
const FALLBACK_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

pub struct Rng {
    state: u64,
}

impl Rng {
    /// A zero seed would lock xorshift at zero forever, so it is remapped.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            state: if seed == 0 { FALLBACK_SEED } else { seed },
        }
    }

    pub fn from_entropy() -> Self {
        let mut buf = [0u8; 8];
        match getrandom::getrandom(&mut buf) {
            Ok(()) => Self::from_seed(u64::from_le_bytes(buf)),
            Err(_) => Self::from_seed(FALLBACK_SEED),
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform integer in `[0, bound)`. Rejection sampling keeps small
    /// bounds (26 letters, 7 palette colors) free of modulo bias.
    pub fn gen_range(&mut self, bound: usize) -> usize {
        if bound <= 1 {
            return 0;
        }
        let b = bound as u64;
        let zone = u64::MAX - (u64::MAX % b);
        loop {
            let r = self.next_u64();
            if r < zone {
                return (r % b) as usize;
            }
        }
    }

    /// Uniform float in `[0, 1)` built from the top 53 bits.
    pub fn gen_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn gen_bool(&mut self) -> bool {
        self.next_u64() & 1 == 1
    }

    /// In-place Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.gen_range(i + 1);
            items.swap(i, j);
        }
    }
}

thread_local! {
    static SESSION_RNG: RefCell<Rng> = RefCell::new(Rng::from_entropy());
}

/// Runs `f` with the session generator. Wasm is single threaded, so the
/// thread local is a per-page singleton in practice.
pub fn with<T>(f: impl FnOnce(&mut Rng) -> T) -> T {
    SESSION_RNG.with(|cell| f(&mut cell.borrow_mut()))
}
