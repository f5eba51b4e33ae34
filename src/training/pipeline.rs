//! Goal-directed training rounds with mined macro-actions.
//!
//! Each round walks through the same phases:
//!
//! ```text
//! Round
//! ─────────────────────────────────────
//! 1. Select macro-actions: top-K subsequences of the frequency table
//! 2. Initialise: zero Q [nS, nA + K], reset env, sample + set goal,
//!    invalidate oracle, compute optimal steps / return
//! 3. Repeat:
//!      a. run an episode from the round's start state
//!      b. push its return into a window of the last nS returns
//!      c. stop once mean(window) >= optimal_return * gamma^slack_factor
//! 4. Unless running the baseline, count the final trace's subsequences
//! ```
//!
//! [`Trainer::train`] repeats rounds and reports how many episodes each one
//! needed, which is the learning curve compared between baseline and
//! experiment runs.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::QTable;
use crate::config::{ExperimentConfig, TrainerConfig};
use crate::env::GoalEnvironment;
use crate::skill::{format_actions, ActionFrequencyTable, ActionSet};
use crate::trajectory::{EpisodeRunner, ReturnsWindow, Trajectory};

use super::oracle::MinStepsOracle;

// ---------------------------------------------------------------------------
// Round reports
// ---------------------------------------------------------------------------

/// How a training round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// The moving-average return met the threshold.
    Converged,
    /// `max_episodes_per_round` episodes ran without converging.
    EpisodeLimit,
    /// The oracle found no path from the start to the goal.
    Unreachable,
}

/// Everything recorded about one training round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundReport {
    /// Zero-based round index within this trainer.
    pub round: usize,
    pub start: usize,
    pub goal: usize,
    /// Oracle step count, `None` when the goal is unreachable.
    pub optimal_steps: Option<f64>,
    /// `gamma^optimal_steps`.
    pub optimal_reward: f64,
    /// `optimal_reward * slack`, the bar the moving average must clear.
    pub threshold: f64,
    /// Episodes run in this round.
    pub episodes: usize,
    /// Shortest primitive trace seen in the round.
    pub min_trace_len: Option<usize>,
    /// Mean of the returns window when the round ended.
    pub final_mean_return: f64,
    pub status: RoundStatus,
    /// Primitive action trace of the last episode. It reaches the goal but
    /// may be longer than `min_trace_len` when that episode explored.
    pub actions: Vec<usize>,
    /// Macro-actions available during the round.
    pub macro_actions: Vec<Vec<usize>>,
}

impl RoundReport {
    pub fn converged(&self) -> bool {
        self.status == RoundStatus::Converged
    }
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// Owns the environment, the frequency table and the oracle across rounds.
pub struct Trainer<E> {
    env: E,
    config: TrainerConfig,
    runner: EpisodeRunner,
    frequencies: ActionFrequencyTable,
    oracle: MinStepsOracle,
    rng: StdRng,
    render: bool,
    reports: Vec<RoundReport>,
}

impl<E: GoalEnvironment> Trainer<E> {
    /// Create a trainer whose action-selection RNG is seeded with `seed`.
    pub fn new(env: E, config: TrainerConfig, seed: u64) -> Self {
        let oracle = MinStepsOracle::new(env.n_states());
        Self {
            runner: EpisodeRunner::from_config(&config),
            env,
            config,
            frequencies: ActionFrequencyTable::new(),
            oracle,
            rng: StdRng::seed_from_u64(seed),
            render: false,
            reports: Vec::new(),
        }
    }

    /// Start from a previously accumulated frequency table.
    pub fn with_frequencies(mut self, frequencies: ActionFrequencyTable) -> Self {
        self.frequencies = frequencies;
        self
    }

    /// Print every step, pausing for `delay` whenever an episode ends.
    pub fn with_render(mut self, delay: Duration) -> Self {
        self.runner = self.runner.with_render(delay);
        self.render = true;
        self
    }

    // ------------------------------------------------------------------
    // Training
    // ------------------------------------------------------------------

    /// Run `iterations` rounds and return the episodes each one needed.
    ///
    /// With `baseline` set the frequency table is never updated, so every
    /// round uses primitive actions only.
    pub fn train(&mut self, iterations: usize, baseline: bool) -> Result<Vec<usize>> {
        info!(iterations, baseline, "Starting training");
        let mut times = Vec::with_capacity(iterations);

        for _ in 0..iterations {
            let report = self.train_round()?;
            times.push(report.episodes);

            if !baseline && report.converged() && !report.actions.is_empty() {
                self.frequencies.record_trace(report.round, &report.actions);
            }
        }

        let total: usize = times.iter().sum();
        info!(
            iterations,
            baseline,
            total_episodes = total,
            distinct_subsequences = self.frequencies.len(),
            "Training finished"
        );
        Ok(times)
    }

    /// One round towards a freshly sampled goal.
    pub fn train_round(&mut self) -> Result<RoundReport> {
        let start = self.env.reset();
        let goal = self.env.sample_goal();
        self.train_goal(start, goal)
    }

    /// One round from `start` towards `goal` with the current macro-actions.
    pub fn train_goal(&mut self, start: usize, goal: usize) -> Result<RoundReport> {
        let round = self.reports.len();

        // Phase 1: macro-action selection.
        let actions = ActionSet::new(self.env.n_actions(), self.select_macro_actions());

        // Phase 2: round initialisation.
        let n_states = self.env.n_states();
        let mut q = QTable::zeros(n_states, actions.len());
        self.env.set_goal(goal);
        self.oracle.invalidate();
        self.env.reset_to(start);

        let steps = self.oracle.min_steps(&self.env, start, goal, n_states);
        let optimal_reward =
            self.oracle.optimal_reward(&self.env, start, goal, self.config.gamma);
        let threshold = optimal_reward * self.config.slack();

        info!(
            round,
            start = ?self.env.decode(start),
            goal = ?self.env.decode(goal),
            optimal_steps = steps,
            macros = actions.n_macros(),
            "Starting round"
        );
        if self.render {
            println!("{}", self.env.render());
        }

        let mut report = RoundReport {
            round,
            start,
            goal,
            optimal_steps: steps.is_finite().then_some(steps),
            optimal_reward,
            threshold,
            episodes: 0,
            min_trace_len: None,
            final_mean_return: 0.0,
            status: RoundStatus::Converged,
            actions: Vec::new(),
            macro_actions: actions.macros().map(|m| m.to_vec()).collect(),
        };

        if start == goal {
            debug!(round, "Start is the goal, nothing to learn");
            self.reports.push(report.clone());
            return Ok(report);
        }
        if !steps.is_finite() {
            warn!(round, start, goal, "Goal unreachable from start, abandoning round");
            report.status = RoundStatus::Unreachable;
            self.reports.push(report.clone());
            return Ok(report);
        }

        // Phase 3: episodes until the moving average clears the threshold.
        let mut window = ReturnsWindow::new(n_states);
        let mut last = Trajectory::default();
        report.status = RoundStatus::EpisodeLimit;

        for episode in 1..=self.config.max_episodes_per_round {
            last = self
                .runner
                .run(&mut self.env, start, &mut q, &actions, &mut self.rng)?;
            report.episodes = episode;

            if report.min_trace_len.map_or(true, |m| last.len() < m) {
                debug!(round, episode, len = last.len(), "New shortest trace");
                report.min_trace_len = Some(last.len());
            }

            window.push(last.discounted_return);
            self.env.reset_to(start);

            if window.mean() >= threshold {
                report.status = RoundStatus::Converged;
                break;
            }
        }

        report.final_mean_return = window.mean();
        report.actions = last.actions();

        match report.status {
            RoundStatus::Converged => info!(
                round,
                episodes = report.episodes,
                final_actions = %format_actions(&report.actions, self.env.action_strings()),
                "Round converged"
            ),
            _ => warn!(
                round,
                episodes = report.episodes,
                mean_return = report.final_mean_return,
                threshold,
                "Round hit the episode limit without converging"
            ),
        }

        self.reports.push(report.clone());
        Ok(report)
    }

    /// The round's macro-actions: the top `n_action_groups` by time saved.
    pub fn select_macro_actions(&self) -> Vec<Vec<usize>> {
        let glyphs = self.env.action_strings();
        for (seq, saved) in self.frequencies.ranked().iter().rev().take(10) {
            debug!(saved, actions = %format_actions(seq, glyphs), "Candidate macro-action");
        }
        self.frequencies.top_k(self.config.n_action_groups)
    }

    // ------------------------------------------------------------------
    // Oracle access
    // ------------------------------------------------------------------

    /// Oracle step count from `s1` to `goal` under the current dynamics.
    pub fn min_steps(&mut self, s1: usize, goal: usize) -> f64 {
        let depth = self.env.n_states();
        self.oracle.min_steps(&self.env, s1, goal, depth)
    }

    pub fn optimal_reward(&mut self, s1: usize, goal: usize) -> f64 {
        self.oracle.optimal_reward(&self.env, s1, goal, self.config.gamma)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn frequencies(&self) -> &ActionFrequencyTable {
        &self.frequencies
    }

    pub fn reports(&self) -> &[RoundReport] {
        &self.reports
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Learning curves of one experiment invocation, as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub config: ExperimentConfig,
    pub iterations: usize,
    /// Episodes-to-converge per round without macro-actions.
    pub baseline: Option<Vec<usize>>,
    /// Episodes-to-converge per round with mined macro-actions.
    pub experiment: Option<Vec<usize>>,
    pub baseline_rounds: Vec<RoundReport>,
    pub experiment_rounds: Vec<RoundReport>,
}

impl RunSummary {
    pub fn new(config: ExperimentConfig, iterations: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            config,
            iterations,
            baseline: None,
            experiment: None,
            baseline_rounds: Vec::new(),
            experiment_rounds: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::config::{ActionSpec, GridConfig};
    use crate::env::{build_env, Environment, Gridworld, TimeLimit};

    fn corridor_config(desc: &str, start_states: &str) -> GridConfig {
        GridConfig {
            desc: vec![desc.into()],
            start_states: start_states.into(),
            blocked_states: "#".into(),
            max_episode_steps: 20,
            actions: Some(vec![ActionSpec::new(0, -1, '◀'), ActionSpec::new(0, 1, '▶')]),
        }
    }

    fn trainer_config() -> TrainerConfig {
        TrainerConfig {
            alpha: 0.1,
            gamma: 0.99,
            epsilon: 0.1,
            n_action_groups: 5,
            slack_factor: 1,
            max_episodes_per_round: 5_000,
        }
    }

    fn corridor_trainer(
        desc: &str,
        start_states: &str,
        seed: u64,
    ) -> Trainer<TimeLimit<Gridworld>> {
        let env = build_env(&corridor_config(desc, start_states), seed).unwrap();
        Trainer::new(env, trainer_config(), seed)
    }

    fn bfs(env: &TimeLimit<Gridworld>, from: usize, to: usize) -> usize {
        let mut dist = vec![usize::MAX; env.n_states()];
        let mut queue = VecDeque::from([from]);
        dist[from] = 0;
        while let Some(s) = queue.pop_front() {
            for a in 0..env.n_actions() {
                for t in env.transitions(s, a) {
                    if dist[t.next_state] == usize::MAX {
                        dist[t.next_state] = dist[s] + 1;
                        queue.push_back(t.next_state);
                    }
                }
            }
        }
        dist[to]
    }

    fn replay(env: &mut TimeLimit<Gridworld>, start: usize, actions: &[usize]) -> usize {
        env.reset_to(start);
        let mut state = start;
        for &a in actions {
            state = env.step(a).unwrap().next_state;
        }
        state
    }

    #[test]
    fn test_corridor_converges_for_every_pair() {
        let mut trainer = corridor_trainer("_____", "_", 0);
        for start in 0..5 {
            for goal in 0..5 {
                let report = trainer.train_goal(start, goal).unwrap();
                assert!(report.converged(), "{start} -> {goal}: {:?}", report.status);
                assert!(report.episodes <= 5_000);

                let distance = bfs(trainer.env(), start, goal);
                assert_eq!(report.optimal_steps, Some(distance as f64 + 1.0));
                if start == goal {
                    assert_eq!(report.episodes, 0);
                    assert!(report.actions.is_empty());
                    continue;
                }
                assert!(report.actions.len() >= distance);
                assert_eq!(report.min_trace_len, Some(distance), "{start} -> {goal}");
                let end = replay(&mut trainer.env, start, &report.actions);
                assert_eq!(end, goal, "{start} -> {goal}");
            }
        }
        assert_eq!(trainer.reports().len(), 25);
    }

    #[test]
    fn test_reported_trace_is_last_episode() {
        // The reported trace comes from the last episode of the window, so it
        // may include exploratory detours. It always ends at the goal, and the
        // shortest trace of the round matches the true distance.
        for seed in 1..4 {
            let mut trainer = corridor_trainer("_____", "_", seed);
            for (start, goal) in [(1, 0), (0, 4), (4, 1), (2, 3)] {
                let report = trainer.train_goal(start, goal).unwrap();
                assert!(report.converged());
                let distance = bfs(trainer.env(), start, goal);
                assert!(report.actions.len() >= distance);
                assert_eq!(report.min_trace_len, Some(distance), "seed {seed}: {start} -> {goal}");
                let end = replay(&mut trainer.env, start, &report.actions);
                assert_eq!(end, goal, "seed {seed}: {start} -> {goal}");
            }
        }
    }

    #[test]
    fn test_baseline_never_counts() {
        let mut trainer = corridor_trainer("S___S", "S", 3);
        let times = trainer.train(6, true).unwrap();
        assert_eq!(times.len(), 6);
        assert!(trainer.frequencies().is_empty());
        assert_eq!(trainer.frequencies().total_count(), 0);
        assert!(trainer.reports().iter().all(|r| r.macro_actions.is_empty()));
    }

    #[test]
    fn test_experiment_populates_table() {
        let mut trainer = corridor_trainer("S___S", "S", 3);
        let times = trainer.train(20, false).unwrap();
        assert_eq!(times.len(), 20);

        let learned: Vec<&RoundReport> = trainer
            .reports()
            .iter()
            .filter(|r| r.converged() && r.actions.len() >= 2)
            .collect();
        assert!(!learned.is_empty());
        assert!(!trainer.frequencies().is_empty());

        let expected: usize = learned
            .iter()
            .map(|r| r.actions.len() * (r.actions.len() - 1) / 2)
            .sum();
        assert_eq!(trainer.frequencies().total_count(), expected as u64);

        // Rounds after the first learned trace get macro-actions.
        let first = learned[0].round;
        assert!(trainer
            .reports()
            .iter()
            .filter(|r| r.round > first)
            .all(|r| !r.macro_actions.is_empty()));
    }

    #[test]
    fn test_seeded_frequencies_become_macros() {
        let mut table = ActionFrequencyTable::new();
        table.record_trace(0, &[1, 1, 1]);
        let mut trainer = corridor_trainer("_____", "_", 2).with_frequencies(table);
        let report = trainer.train_goal(0, 4).unwrap();
        // [1, 1] saves 2, [1, 1, 1] saves 2: both make the top five.
        assert_eq!(report.macro_actions, vec![vec![1, 1], vec![1, 1, 1]]);
        assert!(report.converged());
    }

    #[test]
    fn test_unreachable_goal_reported() {
        let mut trainer = corridor_trainer("__#__", "_", 1);
        let report = trainer.train_goal(0, 4).unwrap();
        assert_eq!(report.status, RoundStatus::Unreachable);
        assert_eq!(report.episodes, 0);
        assert_eq!(report.optimal_steps, None);
        assert_eq!(report.optimal_reward, 0.0);
    }

    #[test]
    fn test_episode_limit_reported() {
        let env = build_env(&corridor_config("_____", "_"), 0).unwrap();
        let mut config = trainer_config();
        config.max_episodes_per_round = 3;
        let mut trainer = Trainer::new(env, config, 0);
        let report = trainer.train_goal(0, 4).unwrap();
        // The window holds five returns and starts at zero, so three episodes
        // can never clear a threshold of 0.99^6.
        assert_eq!(report.status, RoundStatus::EpisodeLimit);
        assert_eq!(report.episodes, 3);
    }

    #[test]
    fn test_oracle_accessors_follow_goal() {
        let mut trainer = corridor_trainer("_____", "_", 0);
        trainer.train_goal(2, 2).unwrap();
        assert_eq!(trainer.min_steps(0, 2), 3.0);
        let reward = trainer.optimal_reward(4, 2);
        assert!((reward - 0.99f64.powi(3)).abs() < 1e-12);
    }

    #[test]
    fn test_round_report_serializes() {
        let mut trainer = corridor_trainer("_____", "_", 0);
        let report = trainer.train_goal(0, 1).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        let back: RoundReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status, report.status);
        assert_eq!(back.actions, report.actions);
        assert!(json.contains("\"converged\""));
    }
}
