//! The tabular agent: a [`QTable`] plus [`EpsilonGreedy`] action selection.

pub mod policy;
pub mod qtable;

pub use policy::{greedy, EpsilonGreedy};
pub use qtable::QTable;
