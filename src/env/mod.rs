//! Environment abstractions and the goal gridworld.
//!
//! - [`traits`] -- the [`Environment`] / [`GoalEnvironment`] contract the
//!   trainer consumes.
//! - [`gridworld`] -- a character-map [`Gridworld`] with a movable goal.
//! - [`time_limit`] -- the [`TimeLimit`] wrapper that truncates long episodes.

pub mod gridworld;
pub mod time_limit;
pub mod traits;

use anyhow::Result;

use crate::config::GridConfig;

pub use gridworld::Gridworld;
pub use time_limit::TimeLimit;
pub use traits::{Environment, GoalEnvironment, StepOutcome, Transition};

/// Build the step-limited gridworld described by `config`.
pub fn build_env(config: &GridConfig, seed: u64) -> Result<TimeLimit<Gridworld>> {
    let grid = Gridworld::new(config, seed)?;
    tracing::info!(
        states = grid.n_states(),
        actions = grid.n_actions(),
        max_episode_steps = config.max_episode_steps,
        "Built gridworld"
    );
    Ok(TimeLimit::new(grid, config.max_episode_steps))
}
