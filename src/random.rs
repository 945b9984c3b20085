use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// The single seeded random source of a run.
///
/// Every stochastic decision draws from one `RandomSource` that the engine
/// threads through by `&mut`, on the control thread only, so a run is
/// reproducible from its seed.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: ChaCha8Rng,
}

impl RandomSource {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Uniform integer in `0..n`. `n` must be positive.
    pub fn below(&mut self, n: usize) -> usize {
        debug_assert!(n > 0, "empty range");
        self.rng.random_range(0..n)
    }

    /// Uniform integer in `0..=n`.
    pub fn up_to(&mut self, n: usize) -> usize {
        self.rng.random_range(0..=n)
    }

    /// Uniform float in `[0, bound)`.
    pub fn below_f64(&mut self, bound: f64) -> f64 {
        self.rng.random::<f64>() * bound
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.below(items.len())])
        }
    }
}
