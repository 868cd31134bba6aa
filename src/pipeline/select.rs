//! Candidate ordering: shuffle sources and repeat them to fill a grid.
//!
//! Randomness lives here, at the boundary, so the Composer stays
//! deterministic.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// A seeded RNG when `seed` is given, otherwise one seeded from the OS.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// A shuffled copy of `items`.
pub fn shuffled<T: Clone, R: Rng + ?Sized>(items: &[T], rng: &mut R) -> Vec<T> {
    let mut out = items.to_vec();
    out.shuffle(rng);
    out
}

/// Grow `items` to exactly `count` by appending reshuffled rounds of copies.
///
/// Returns `items` unchanged when it is empty or already long enough.
pub fn repeat_to_fill<T: Clone, R: Rng + ?Sized>(items: Vec<T>, count: usize, rng: &mut R) -> Vec<T> {
    if items.is_empty() || items.len() >= count {
        return items;
    }

    let originals = items.clone();
    let mut out = items;
    while out.len() < count {
        let mut round = originals.clone();
        round.shuffle(rng);
        round.truncate(count - out.len());
        out.extend(round);
    }
    out
}
