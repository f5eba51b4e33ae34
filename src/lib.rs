//! gridskills: tabular Q-learning with mined macro-actions.
//!
//! An agent repeatedly learns to reach random goals in a gridworld. Action
//! subsequences from converged episodes are counted, and the ones that save
//! the most steps are offered as macro-actions in later rounds.

pub mod agent;
pub mod config;
pub mod env;
pub mod skill;
pub mod trajectory;
pub mod training;
