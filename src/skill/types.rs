//! Action groups and the per-round augmented action set.
//!
//! An **action group** is either a single primitive action or a macro-action:
//! an ordered sequence of at least two primitives that was mined from earlier
//! episodes and is executed without re-selection once chosen.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Shortest primitive sequence that counts as a macro-action.
pub const MIN_GROUP_LEN: usize = 2;

/// One entry of the augmented action set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionGroup {
    Primitive(usize),
    Macro(Vec<usize>),
}

impl ActionGroup {
    /// The primitive actions this group applies, in order.
    pub fn primitives(&self) -> &[usize] {
        match self {
            ActionGroup::Primitive(a) => std::slice::from_ref(a),
            ActionGroup::Macro(seq) => seq,
        }
    }

    pub fn len(&self) -> usize {
        self.primitives().len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives().is_empty()
    }

    pub fn is_macro(&self) -> bool {
        matches!(self, ActionGroup::Macro(_))
    }

    /// Render the group with the environment's action glyphs.
    pub fn display(&self, glyphs: &[char]) -> String {
        format_actions(self.primitives(), glyphs)
    }
}

/// Join primitive actions as glyphs separated by spaces.
pub fn format_actions(actions: &[usize], glyphs: &[char]) -> String {
    actions
        .iter()
        .map(|&a| glyphs.get(a).map(|g| g.to_string()).unwrap_or_else(|| a.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The actions available during one training round.
///
/// Primitive `a` always sits at index `a`; the round's macro-actions follow in
/// selection order. Indices are stable for the lifetime of the set, which is
/// what the Q-table's columns are keyed by.
#[derive(Debug, Clone)]
pub struct ActionSet {
    groups: Vec<ActionGroup>,
    index: HashMap<Vec<usize>, usize>,
    max_group_len: usize,
    n_primitive: usize,
}

impl ActionSet {
    /// Primitives `0..n_primitive` followed by `macros`.
    ///
    /// Macros shorter than [`MIN_GROUP_LEN`], referring to unknown primitives,
    /// or duplicating an earlier entry are skipped.
    pub fn new(n_primitive: usize, macros: impl IntoIterator<Item = Vec<usize>>) -> Self {
        let mut set = Self {
            groups: Vec::new(),
            index: HashMap::new(),
            max_group_len: 1,
            n_primitive,
        };
        for a in 0..n_primitive {
            set.index.insert(vec![a], a);
            set.groups.push(ActionGroup::Primitive(a));
        }
        for seq in macros {
            if seq.len() < MIN_GROUP_LEN || seq.iter().any(|&a| a >= n_primitive) {
                tracing::warn!(?seq, "Ignoring invalid macro-action");
                continue;
            }
            if set.index.contains_key(&seq) {
                continue;
            }
            set.max_group_len = set.max_group_len.max(seq.len());
            set.index.insert(seq.clone(), set.groups.len());
            set.groups.push(ActionGroup::Macro(seq));
        }
        set
    }

    /// Only the primitive actions.
    pub fn primitives_only(n_primitive: usize) -> Self {
        Self::new(n_primitive, std::iter::empty())
    }

    /// Total number of actions (primitive + macro).
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn n_primitive(&self) -> usize {
        self.n_primitive
    }

    pub fn n_macros(&self) -> usize {
        self.groups.len() - self.n_primitive
    }

    /// Length of the longest group in the set.
    pub fn max_group_len(&self) -> usize {
        self.max_group_len
    }

    pub fn get(&self, index: usize) -> Option<&ActionGroup> {
        self.groups.get(index)
    }

    /// The action index of the group whose primitives are exactly `seq`.
    pub fn index_of(&self, seq: &[usize]) -> Option<usize> {
        self.index.get(seq).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionGroup> {
        self.groups.iter()
    }

    /// The macro-actions of the set, in index order.
    pub fn macros(&self) -> impl Iterator<Item = &[usize]> {
        self.groups[self.n_primitive..].iter().map(|g| g.primitives())
    }
}
