//! Shortest-path oracle over the environment's transition model.
//!
//! `min_steps(s, g)` is the expected number of primitive actions an optimal
//! policy needs to get from `s` to `g`, counting the goal itself as one step:
//!
//! ```text
//! V_0(s)       = inf
//! V_d(g)       = 1                                   (d >= 1)
//! V_d(s)       = 1 + min_a sum_{s'} P(s'|s,a) V_{d-1}(s')
//! ```
//!
//! Values are computed one goal column at a time by depth-bounded value
//! iteration, stopping early at a fixed point, and cached in a dense
//! `[nS x nS]` table. The cache is only valid for the dynamics it was computed
//! under, so callers must [`invalidate`](MinStepsOracle::invalidate) it
//! whenever the goal moves.

use crate::env::Environment;

/// How a cached goal column was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnSolve {
    depth: usize,
    /// Smallest depth from which the column no longer changes.
    fixed_point: Option<usize>,
}

impl ColumnSolve {
    fn answers(&self, maxdepth: usize) -> bool {
        self.depth == maxdepth || self.fixed_point.is_some_and(|d| maxdepth >= d)
    }
}

/// Memoised minimum-step distances between every ordered pair of states.
#[derive(Debug, Clone)]
pub struct MinStepsOracle {
    n_states: usize,
    /// `cache[s * nS + goal]`.
    cache: Vec<f64>,
    solved: Vec<Option<ColumnSolve>>,
}

impl MinStepsOracle {
    pub fn new(n_states: usize) -> Self {
        let mut oracle = Self {
            n_states,
            cache: Vec::new(),
            solved: Vec::new(),
        };
        oracle.invalidate();
        oracle
    }

    /// Forget every computed distance, keeping only the diagonal seed of 1.
    pub fn invalidate(&mut self) {
        let n = self.n_states;
        self.cache = vec![f64::INFINITY; n * n];
        for s in 0..n {
            self.cache[s * n + s] = 1.0;
        }
        self.solved = vec![None; n];
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    /// Expected primitive steps from `s1` to `goal` within `maxdepth` actions.
    ///
    /// Returns `f64::INFINITY` when `maxdepth == 0` or the goal cannot be
    /// reached within the budget. Macro-actions are never considered.
    pub fn min_steps<E: Environment + ?Sized>(
        &mut self,
        env: &E,
        s1: usize,
        goal: usize,
        maxdepth: usize,
    ) -> f64 {
        if maxdepth == 0 {
            return f64::INFINITY;
        }
        let cached = self.cache[s1 * self.n_states + goal];
        if s1 == goal && cached.is_finite() {
            return cached;
        }
        if !self.solved[goal].is_some_and(|solve| solve.answers(maxdepth)) {
            self.solve_column(env, goal, maxdepth);
        }
        self.cache[s1 * self.n_states + goal]
    }

    /// `gamma^min_steps(s1, goal)`: the discounted return target for a round.
    ///
    /// Zero when the goal is unreachable.
    pub fn optimal_reward<E: Environment + ?Sized>(
        &mut self,
        env: &E,
        s1: usize,
        goal: usize,
        gamma: f64,
    ) -> f64 {
        let steps = self.min_steps(env, s1, goal, self.n_states);
        if steps.is_finite() {
            gamma.powf(steps)
        } else {
            0.0
        }
    }

    /// Distances from every state to `goal` under the default depth budget.
    pub fn distances_to<E: Environment + ?Sized>(&mut self, env: &E, goal: usize) -> Vec<f64> {
        let depth = self.n_states;
        (0..self.n_states)
            .map(|s| self.min_steps(env, s, goal, depth))
            .collect()
    }

    fn solve_column<E: Environment + ?Sized>(&mut self, env: &E, goal: usize, maxdepth: usize) {
        let n = self.n_states;
        let seed = self.cache[goal * n + goal];
        let mut previous = vec![f64::INFINITY; n];
        let mut fixed_point = None;

        for depth in 1..=maxdepth {
            let current: Vec<f64> = (0..n)
                .map(|s| {
                    if s == goal {
                        seed
                    } else {
                        1.0 + best_expectation(env, s, &previous)
                    }
                })
                .collect();
            if current == previous {
                fixed_point = Some(depth - 1);
                break;
            }
            previous = current;
        }

        for (s, value) in previous.into_iter().enumerate() {
            self.cache[s * n + goal] = value;
        }
        self.solved[goal] = Some(ColumnSolve {
            depth: maxdepth,
            fixed_point,
        });
        tracing::trace!(goal, maxdepth, ?fixed_point, "Solved min-steps column");
    }
}

/// `min_a sum_{s'} P(s'|s,a) * values[s']`.
fn best_expectation<E: Environment + ?Sized>(env: &E, state: usize, values: &[f64]) -> f64 {
    (0..env.n_actions())
        .map(|a| {
            env.transitions(state, a)
                .iter()
                .filter(|t| t.probability > 0.0)
                .map(|t| t.probability * values[t.next_state])
                .sum::<f64>()
        })
        .fold(f64::INFINITY, f64::min)
}
