use serde::{Deserialize, Serialize};

/// Complete configuration for a gridskills experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub grid: GridConfig,
    pub trainer: TrainerConfig,
    /// Seed shared by the environment and the trainer RNGs (default: 0).
    #[serde(default)]
    pub seed: u64,
}

/// Gridworld layout and episode limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// One string per map row. Every row must have the same number of cells.
    pub desc: Vec<String>,
    /// Glyphs of cells an episode may start in (default: "_").
    pub start_states: String,
    /// Glyphs of cells the agent cannot enter (default: "#").
    pub blocked_states: String,
    /// Maximum primitive steps before an episode is truncated (default: 15).
    pub max_episode_steps: usize,
    /// Optional custom action set. Uses the four compass moves when `None`.
    #[serde(default)]
    pub actions: Option<Vec<ActionSpec>>,
}

/// A primitive action: a displacement on the grid plus its display glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub d_row: i64,
    pub d_col: i64,
    pub glyph: char,
}

impl ActionSpec {
    pub const fn new(d_row: i64, d_col: i64, glyph: char) -> Self {
        Self { d_row, d_col, glyph }
    }

    /// Right, down, left, up.
    pub fn compass() -> Vec<ActionSpec> {
        vec![
            ActionSpec::new(0, 1, '▶'),
            ActionSpec::new(1, 0, '▼'),
            ActionSpec::new(0, -1, '◀'),
            ActionSpec::new(-1, 0, '▲'),
        ]
    }
}

/// Q-learning and convergence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Q-learning step size (default: 0.1).
    pub alpha: f64,
    /// Discount factor (default: 0.99).
    pub gamma: f64,
    /// Exploration rate for epsilon-greedy selection (default: 0.1).
    pub epsilon: f64,
    /// Number of macro-actions selected at the start of each round (default: 5).
    pub n_action_groups: usize,
    /// Exponent of the convergence slack `gamma^slack_factor` (default: 1).
    pub slack_factor: u32,
    /// Episodes after which a round is abandoned as non-converged (default: 100_000).
    pub max_episodes_per_round: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            desc: [
                "____#____",
                "_________",
                "____#____",
                "#_#####_#",
                "____#____",
                "_________",
                "____#____",
            ]
            .iter()
            .map(|row| row.to_string())
            .collect(),
            start_states: "_".into(),
            blocked_states: "#".into(),
            max_episode_steps: 15,
            actions: None,
        }
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.99,
            epsilon: 0.1,
            n_action_groups: 5,
            slack_factor: 1,
            max_episodes_per_round: 100_000,
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            trainer: TrainerConfig::default(),
            seed: 0,
        }
    }
}

impl TrainerConfig {
    /// The multiplicative tolerance applied to the optimal return.
    pub fn slack(&self) -> f64 {
        self.gamma.powi(self.slack_factor as i32)
    }
}
