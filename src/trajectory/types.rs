//! Core trajectory data types.
//!
//! A [`Trajectory`] records every primitive step of one episode, including the
//! steps taken inside macro-actions, so its action trace is exactly what the
//! frequency table mines.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Single step
// ---------------------------------------------------------------------------

/// A single primitive step within a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// State the action was taken in.
    pub state: usize,
    /// Primitive action applied.
    pub action: usize,
    /// Reward of the transition.
    pub reward: f64,
    /// State after the transition.
    pub next_state: usize,
    /// Index into the round's action set of the group that issued this step.
    pub group: usize,
}

// ---------------------------------------------------------------------------
// Full trajectory
// ---------------------------------------------------------------------------

/// One complete episode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Ordered primitive steps.
    pub steps: Vec<Step>,
    /// `sum_i r_i * gamma^i` over the primitive steps.
    pub discounted_return: f64,
    /// Whether the episode ended in an absorbing state (as opposed to being
    /// truncated).
    pub reached_terminal: bool,
    /// Number of action-selection decisions (macros count once).
    pub decisions: usize,
}

impl Trajectory {
    /// The primitive action trace.
    pub fn actions(&self) -> Vec<usize> {
        self.steps.iter().map(|s| s.action).collect()
    }

    /// The visited states, starting with the initial one.
    pub fn states(&self) -> Vec<usize> {
        let mut states: Vec<usize> = self.steps.iter().map(|s| s.state).collect();
        if let Some(last) = self.steps.last() {
            states.push(last.next_state);
        }
        states
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Undiscounted sum of rewards.
    pub fn total_reward(&self) -> f64 {
        self.steps.iter().map(|s| s.reward).sum()
    }
}

/// `sum_i rewards[i] * gamma^i`.
pub fn discounted_cumulative(rewards: impl IntoIterator<Item = f64>, gamma: f64) -> f64 {
    let mut discount = 1.0;
    let mut total = 0.0;
    for r in rewards {
        total += r * discount;
        discount *= gamma;
    }
    total
}

// ---------------------------------------------------------------------------
// Returns window
// ---------------------------------------------------------------------------

/// Fixed-size sliding window of recent episode returns.
///
/// Starts full of zeros, so a round needs at least `capacity` good episodes
/// before the mean can reach a positive threshold.
#[derive(Debug, Clone)]
pub struct ReturnsWindow {
    returns: VecDeque<f64>,
    capacity: usize,
}

impl ReturnsWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            returns: std::iter::repeat(0.0).take(capacity).collect(),
            capacity,
        }
    }

    /// Append a return, evicting the oldest.
    pub fn push(&mut self, value: f64) {
        if self.returns.len() == self.capacity {
            self.returns.pop_front();
        }
        self.returns.push_back(value);
    }

    pub fn mean(&self) -> f64 {
        self.returns.iter().sum::<f64>() / self.returns.len() as f64
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(state: usize, action: usize, reward: f64, next_state: usize) -> Step {
        Step {
            state,
            action,
            reward,
            next_state,
            group: action,
        }
    }

    #[test]
    fn test_discounted_cumulative() {
        let g = 0.9;
        let value = discounted_cumulative([0.0, 0.0, 1.0], g);
        assert!((value - g * g).abs() < 1e-12);
        assert_eq!(discounted_cumulative(Vec::<f64>::new(), g), 0.0);
    }

    #[test]
    fn test_trajectory_accessors() {
        let trajectory = Trajectory {
            steps: vec![step(0, 1, 0.0, 1), step(1, 1, 1.0, 2)],
            discounted_return: 0.99,
            reached_terminal: true,
            decisions: 1,
        };
        assert_eq!(trajectory.actions(), vec![1, 1]);
        assert_eq!(trajectory.states(), vec![0, 1, 2]);
        assert_eq!(trajectory.total_reward(), 1.0);
        assert_eq!(trajectory.len(), 2);
        assert!(Trajectory::default().states().is_empty());
    }

    #[test]
    fn test_window_starts_with_zeros_and_slides() {
        let mut window = ReturnsWindow::new(4);
        assert_eq!(window.mean(), 0.0);
        window.push(1.0);
        assert!((window.mean() - 0.25).abs() < 1e-12);
        for _ in 0..4 {
            window.push(1.0);
        }
        assert!((window.mean() - 1.0).abs() < 1e-12);
        window.push(0.0);
        assert!((window.mean() - 0.75).abs() < 1e-12);
        assert_eq!(window.capacity(), 4);
    }
}
