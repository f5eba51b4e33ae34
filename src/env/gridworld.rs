//! Character-map gridworld with a single relocatable goal.
//!
//! The map is a list of rows such as `"____#____"`. Every cell is a state,
//! numbered row-major. Moves are clipped at the border, and a move into a
//! blocked glyph leaves the agent where it was. Episodes start in a cell drawn
//! uniformly from the cells whose glyph is listed in `start_states`.
//!
//! Exactly one goal is active. Entering it yields reward 1 and ends the
//! episode; every action taken from the goal loops back to it with reward 0.

use anyhow::{bail, Context, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::traits::{Environment, GoalEnvironment, StepOutcome, Transition};
use crate::config::{ActionSpec, GridConfig};

const GOAL_GLYPH: char = 'G';

/// A deterministic gridworld whose reward structure follows a movable goal.
#[derive(Debug, Clone)]
pub struct Gridworld {
    desc: Vec<Vec<char>>,
    nrows: usize,
    ncols: usize,
    action_strings: Vec<char>,
    /// Transitions of the bare map, indexed by `state * nA + action`.
    base: Vec<Vec<Transition>>,
    /// Transitions with the current goal applied.
    model: Vec<Vec<Transition>>,
    start_distribution: WeightedIndex<f64>,
    state: usize,
    last_action: Option<usize>,
    goal: usize,
    /// Glyph that was under the goal before it was painted `G`.
    covered_glyph: char,
    rng: StdRng,
}

impl Gridworld {
    /// Build a gridworld from its configuration, seeding its private RNG.
    ///
    /// Fails when the map is empty or ragged, when there are no actions, or
    /// when no cell carries a start glyph.
    pub fn new(config: &GridConfig, seed: u64) -> Result<Self> {
        let desc: Vec<Vec<char>> = config.desc.iter().map(|row| row.chars().collect()).collect();
        let nrows = desc.len();
        if nrows == 0 {
            bail!("gridworld map has no rows");
        }
        let ncols = desc[0].len();
        if ncols == 0 {
            bail!("gridworld map has an empty first row");
        }
        if let Some((i, row)) = desc.iter().enumerate().find(|(_, row)| row.len() != ncols) {
            bail!(
                "gridworld row {i} has {} cells, expected {ncols}",
                row.len()
            );
        }

        let actions = config.actions.clone().unwrap_or_else(ActionSpec::compass);
        if actions.is_empty() {
            bail!("gridworld needs at least one action");
        }
        let n_actions = actions.len();

        let mut base = Vec::with_capacity(nrows * ncols * n_actions);
        for i in 0..nrows {
            for j in 0..ncols {
                for action in &actions {
                    let (r, c) = clip_move(i, j, action, nrows, ncols);
                    let (r, c) = if config.blocked_states.contains(desc[r][c]) {
                        (i, j)
                    } else {
                        (r, c)
                    };
                    base.push(vec![Transition {
                        probability: 1.0,
                        next_state: r * ncols + c,
                        reward: 0.0,
                        terminal: false,
                    }]);
                }
            }
        }

        let weights: Vec<f64> = desc
            .iter()
            .flatten()
            .map(|glyph| {
                if config.start_states.contains(*glyph) {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let start_distribution = WeightedIndex::new(&weights).with_context(|| {
            format!(
                "no cell of the map carries a start glyph from {:?}",
                config.start_states
            )
        })?;

        let mut env = Self {
            desc,
            nrows,
            ncols,
            action_strings: actions.iter().map(|a| a.glyph).collect(),
            model: base.clone(),
            base,
            start_distribution,
            state: 0,
            last_action: None,
            goal: 0,
            covered_glyph: ' ',
            rng: StdRng::seed_from_u64(seed),
        };
        env.covered_glyph = env.desc[0][0];

        let goal = env.sample_goal();
        env.set_goal(goal);
        env.reset();

        tracing::debug!(rows = nrows, cols = ncols, actions = n_actions, "Gridworld built");
        Ok(env)
    }

    /// Map shape as `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// The glyph currently displayed at a cell (the goal shows as `G`).
    pub fn glyph(&self, row: usize, col: usize) -> char {
        self.desc[row][col]
    }

    fn index(&self, state: usize, action: usize) -> usize {
        state * self.action_strings.len() + action
    }
}

fn clip_move(
    i: usize,
    j: usize,
    action: &ActionSpec,
    nrows: usize,
    ncols: usize,
) -> (usize, usize) {
    let r = (i as i64 + action.d_row).clamp(0, nrows as i64 - 1);
    let c = (j as i64 + action.d_col).clamp(0, ncols as i64 - 1);
    (r as usize, c as usize)
}

impl Environment for Gridworld {
    fn n_states(&self) -> usize {
        self.nrows * self.ncols
    }

    fn n_actions(&self) -> usize {
        self.action_strings.len()
    }

    fn reset(&mut self) -> usize {
        self.state = self.start_distribution.sample(&mut self.rng);
        self.last_action = None;
        self.state
    }

    fn reset_to(&mut self, state: usize) {
        assert!(state < self.n_states(), "state {state} out of range");
        self.state = state;
        self.last_action = None;
    }

    fn step(&mut self, action: usize) -> Result<StepOutcome> {
        if action >= self.n_actions() {
            bail!(
                "action {action} out of range for {} primitive actions",
                self.n_actions()
            );
        }
        let options = &self.model[self.index(self.state, action)];
        let chosen = if options.len() == 1 {
            options[0]
        } else {
            let dist = WeightedIndex::new(options.iter().map(|t| t.probability))
                .context("invalid transition probabilities")?;
            options[dist.sample(&mut self.rng)]
        };

        self.state = chosen.next_state;
        self.last_action = Some(action);
        Ok(StepOutcome {
            next_state: chosen.next_state,
            reward: chosen.reward,
            terminal: chosen.terminal,
            truncated: false,
        })
    }

    fn state(&self) -> usize {
        self.state
    }

    fn transitions(&self, state: usize, action: usize) -> &[Transition] {
        &self.model[self.index(state, action)]
    }

    fn action_strings(&self) -> &[char] {
        &self.action_strings
    }

    fn render(&self) -> String {
        let (row, col) = self.decode(self.state);
        let mut out = String::new();
        for (i, cells) in self.desc.iter().enumerate() {
            for (j, glyph) in cells.iter().enumerate() {
                if (i, j) == (row, col) {
                    out.push_str(&format!("\x1b[1;44m{glyph}\x1b[0m"));
                } else {
                    out.push(*glyph);
                }
            }
            out.push('\n');
        }
        if let Some(action) = self.last_action {
            out.push_str(&format!("({}) ({row}, {col})\n", self.action_strings[action]));
        }
        out
    }
}

impl GoalEnvironment for Gridworld {
    fn encode(&self, row: usize, col: usize) -> usize {
        assert!(row < self.nrows, "row {row} out of range");
        assert!(col < self.ncols, "col {col} out of range");
        row * self.ncols + col
    }

    fn decode(&self, state: usize) -> (usize, usize) {
        assert!(state < self.n_states(), "state {state} out of range");
        (state / self.ncols, state % self.ncols)
    }

    fn set_goal(&mut self, goal: usize) {
        let (row, col) = self.decode(goal);
        let (old_row, old_col) = self.decode(self.goal);
        self.desc[old_row][old_col] = self.covered_glyph;
        self.covered_glyph = self.desc[row][col];
        self.desc[row][col] = GOAL_GLYPH;
        self.goal = goal;

        let n_actions = self.n_actions();
        self.model = self
            .base
            .iter()
            .enumerate()
            .map(|(idx, options)| {
                if idx / n_actions == goal {
                    return vec![Transition {
                        probability: 1.0,
                        next_state: goal,
                        reward: 0.0,
                        terminal: true,
                    }];
                }
                options
                    .iter()
                    .map(|t| Transition {
                        reward: if t.next_state == goal { 1.0 } else { 0.0 },
                        terminal: t.next_state == goal,
                        ..*t
                    })
                    .collect()
            })
            .collect();
    }

    fn goal(&self) -> usize {
        self.goal
    }

    fn sample_goal(&mut self) -> usize {
        self.start_distribution.sample(&mut self.rng)
    }
}
