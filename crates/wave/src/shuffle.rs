//! Injected randomness
//!
//! Tie-breaking and pool shuffling go through a `Shuffler` so callers decide whether
//! results are random, reproducible from a seed, or left in query order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Mutex;

/// Source of random permutations
pub trait Shuffler: Send + Sync {
    /// Shuffle `len` positions, returning the new order as indices into the input
    fn permutation(&self, len: usize) -> Vec<usize>;
}

/// Reorder `items` by a permutation drawn from `shuffler`
pub fn shuffled<T>(shuffler: &dyn Shuffler, items: Vec<T>) -> Vec<T> {
    let order = shuffler.permutation(items.len());
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();

    order
        .into_iter()
        .filter_map(|index| slots.get_mut(index).and_then(Option::take))
        .collect()
}

/// Fresh randomness per call from the thread-local generator
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngShuffler;

impl Shuffler for ThreadRngShuffler {
    fn permutation(&self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut rand::thread_rng());
        order
    }
}

/// Reproducible sequence of permutations from a fixed seed
#[derive(Debug)]
pub struct SeededShuffler {
    rng: Mutex<StdRng>,
}

impl SeededShuffler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Shuffler for SeededShuffler {
    fn permutation(&self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        // A poisoned lock still holds a usable generator.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        order.shuffle(&mut *rng);
        order
    }
}

/// Keeps query order
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityShuffler;

impl Shuffler for IdentityShuffler {
    fn permutation(&self, len: usize) -> Vec<usize> {
        (0..len).collect()
    }
}
