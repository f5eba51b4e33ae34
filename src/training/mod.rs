//! Training rounds and the shortest-path oracle that sets their targets.
//!
//! - [`oracle::MinStepsOracle`] -- optimal step counts between states under
//!   the current goal.
//! - [`pipeline::Trainer`] -- the round loop: macro selection, episodes until
//!   the moving-average return converges, and frequency-table updates.

pub mod oracle;
pub mod pipeline;

pub use oracle::MinStepsOracle;
pub use pipeline::{RoundReport, RoundStatus, RunSummary, Trainer};
