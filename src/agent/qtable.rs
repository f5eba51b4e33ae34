//! Dense tabular action-value function.

use ordered_float::OrderedFloat;

/// `Q[state, action]` stored row-major, one row per state.
#[derive(Debug, Clone, PartialEq)]
pub struct QTable {
    n_states: usize,
    n_actions: usize,
    values: Vec<f64>,
}

impl QTable {
    /// An all-zero table of shape `[n_states, n_actions]`.
    pub fn zeros(n_states: usize, n_actions: usize) -> Self {
        Self {
            n_states,
            n_actions,
            values: vec![0.0; n_states * n_actions],
        }
    }

    pub fn n_states(&self) -> usize {
        self.n_states
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    pub fn get(&self, state: usize, action: usize) -> f64 {
        self.values[state * self.n_actions + action]
    }

    pub fn set(&mut self, state: usize, action: usize, value: f64) {
        self.values[state * self.n_actions + action] = value;
    }

    pub fn row(&self, state: usize) -> &[f64] {
        &self.values[state * self.n_actions..(state + 1) * self.n_actions]
    }

    /// `max_a Q[state, a]`.
    pub fn max(&self, state: usize) -> f64 {
        self.row(state)
            .iter()
            .copied()
            .map(OrderedFloat)
            .max()
            .map(|v| v.0)
            .unwrap_or(0.0)
    }

    /// Every action index attaining the row maximum.
    pub fn argmax_all(&self, state: usize) -> Vec<usize> {
        let best = self.max(state);
        self.row(state)
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == best)
            .map(|(a, _)| a)
            .collect()
    }

    /// Move `Q[state, action]` a fraction `alpha` of the way toward `target`.
    pub fn update(&mut self, state: usize, action: usize, target: f64, alpha: f64) {
        let q = self.get(state, action);
        self.set(state, action, q + alpha * (target - q));
    }

    /// Greedy value of each state, `max_a Q[s, a]`.
    pub fn state_values(&self) -> Vec<f64> {
        (0..self.n_states).map(|s| self.max(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_shape() {
        let q = QTable::zeros(3, 5);
        assert_eq!(q.row(2).len(), 5);
        assert!(q.state_values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_argmax_all_collects_ties() {
        let mut q = QTable::zeros(2, 4);
        q.set(1, 0, 0.5);
        q.set(1, 3, 0.5);
        q.set(1, 2, -1.0);
        assert_eq!(q.max(1), 0.5);
        assert_eq!(q.argmax_all(1), vec![0, 3]);
        assert_eq!(q.argmax_all(0), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_update_moves_toward_target() {
        let mut q = QTable::zeros(1, 1);
        q.update(0, 0, 1.0, 0.1);
        assert!((q.get(0, 0) - 0.1).abs() < 1e-12);
        q.update(0, 0, 1.0, 0.5);
        assert!((q.get(0, 0) - 0.55).abs() < 1e-12);
    }
}
