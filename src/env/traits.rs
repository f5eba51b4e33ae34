//! Core environment traits and shared types.
//!
//! The trainer, episode runner and shortest-path oracle only ever talk to an
//! environment through [`Environment`] and [`GoalEnvironment`], so wrappers
//! such as [`TimeLimit`](super::TimeLimit) compose with any grid.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One possible outcome of taking an action in a state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub probability: f64,
    pub next_state: usize,
    pub reward: f64,
    pub terminal: bool,
}

/// What the environment reports after a single primitive step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub next_state: usize,
    pub reward: f64,
    /// The transition entered an absorbing state.
    pub terminal: bool,
    /// The episode was cut short by a step limit.
    pub truncated: bool,
}

impl StepOutcome {
    /// Whether the episode has ended for any reason.
    pub fn done(&self) -> bool {
        self.terminal || self.truncated
    }
}

/// A discrete, fully observable MDP with an explicit transition model.
pub trait Environment {
    /// Number of states `nS`.
    fn n_states(&self) -> usize;

    /// Number of primitive actions `nA`.
    fn n_actions(&self) -> usize;

    /// Start a new episode from a state drawn from the start distribution.
    fn reset(&mut self) -> usize;

    /// Start a new episode from a fixed state.
    fn reset_to(&mut self, state: usize);

    /// Apply a primitive action to the current state.
    fn step(&mut self, action: usize) -> Result<StepOutcome>;

    /// The current state.
    fn state(&self) -> usize;

    /// Full transition model for `(state, action)`. Probabilities sum to one.
    fn transitions(&self, state: usize, action: usize) -> &[Transition];

    /// Display glyph per primitive action.
    fn action_strings(&self) -> &[char];

    /// Human-readable picture of the current state.
    fn render(&self) -> String;
}

/// An environment whose single rewarding, absorbing goal can be moved.
pub trait GoalEnvironment: Environment {
    /// Map a grid coordinate to a state. Panics when out of range.
    fn encode(&self, row: usize, col: usize) -> usize;

    /// Map a state to its grid coordinate. Panics when out of range.
    fn decode(&self, state: usize) -> (usize, usize);

    /// Relocate the goal, rewriting the reward and terminal structure.
    fn set_goal(&mut self, goal: usize);

    /// The currently active goal.
    fn goal(&self) -> usize;

    /// Draw a goal from the start distribution using the environment's RNG.
    fn sample_goal(&mut self) -> usize;
}
