//! Epsilon-greedy action selection over a Q-table row.

use rand::seq::SliceRandom;
use rand::Rng;

use super::qtable::QTable;

/// Picks a uniformly random action with probability `epsilon`, otherwise a
/// greedy one.
#[derive(Debug, Clone, Copy)]
pub struct EpsilonGreedy {
    pub epsilon: f64,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn select<R: Rng + ?Sized>(&self, q: &QTable, state: usize, rng: &mut R) -> usize {
        if rng.gen::<f64>() < self.epsilon {
            rng.gen_range(0..q.n_actions())
        } else {
            greedy(q, state, rng)
        }
    }
}

/// A maximising action, chosen uniformly among ties so that a zero-initialised
/// table carries no directional bias.
pub fn greedy<R: Rng + ?Sized>(q: &QTable, state: usize, rng: &mut R) -> usize {
    let best = q.argmax_all(state);
    debug_assert!(!best.is_empty(), "Q row {state} has no maximum (NaN value?)");
    *best.choose(rng).unwrap_or(&0)
}
