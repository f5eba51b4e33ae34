//! Episode records and the episode runner.
//!
//! This module provides:
//! - [`types::Step`], [`types::Trajectory`] -- what happened during an
//!   episode, one entry per primitive action.
//! - [`types::ReturnsWindow`] -- the sliding window of returns used to decide
//!   convergence.
//! - [`runner::EpisodeRunner`] -- drives one epsilon-greedy episode and
//!   applies the Q-learning updates.

pub mod runner;
pub mod types;

pub use runner::EpisodeRunner;
pub use types::{discounted_cumulative, ReturnsWindow, Step, Trajectory};
