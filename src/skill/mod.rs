//! Skill module: mined macro-actions.
//!
//! 1. **Types** ([`types`]) -- [`ActionGroup`] and the per-round [`ActionSet`].
//! 2. **Library** ([`library`]) -- the [`ActionFrequencyTable`] that counts
//!    contiguous action subsequences across converged episodes and ranks them
//!    by time saved.

pub mod library;
pub mod types;

pub use library::{ActionFrequencyTable, CountHistoryEntry, FrequencyEntry};
pub use types::{format_actions, ActionGroup, ActionSet, MIN_GROUP_LEN};
