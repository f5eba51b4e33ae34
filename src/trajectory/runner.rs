//! Episode execution with macro-actions and multi-step credit assignment.
//!
//! The [`EpisodeRunner`] drives one episode by repeatedly:
//!   1. choosing an action index epsilon-greedily from the Q-table,
//!   2. applying the chosen group's primitives one at a time,
//!   3. after every primitive, updating the Q-value of every action group
//!      whose primitives match a suffix of the trace so far,
//!   4. stopping as soon as the environment reports the episode is over.
//!
//! Step 3 lets a single transition train every macro-action that could have
//! produced it as its last step, with the bootstrap discounted by the group's
//! length.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use rand::Rng;

use crate::agent::{EpsilonGreedy, QTable};
use crate::config::TrainerConfig;
use crate::env::Environment;
use crate::skill::ActionSet;
use crate::trajectory::types::{discounted_cumulative, Step, Trajectory};

/// Runs single episodes of option-augmented tabular Q-learning.
#[derive(Debug, Clone)]
pub struct EpisodeRunner {
    alpha: f64,
    gamma: f64,
    policy: EpsilonGreedy,
    /// When set, every step is printed and terminal steps pause for this long.
    render_delay: Option<Duration>,
}

impl EpisodeRunner {
    pub fn new(alpha: f64, gamma: f64, epsilon: f64) -> Self {
        Self {
            alpha,
            gamma,
            policy: EpsilonGreedy::new(epsilon),
            render_delay: None,
        }
    }

    pub fn from_config(config: &TrainerConfig) -> Self {
        Self::new(config.alpha, config.gamma, config.epsilon)
    }

    /// Print each step, pausing for `delay` on terminal steps.
    pub fn with_render(mut self, delay: Duration) -> Self {
        self.render_delay = Some(delay);
        self
    }

    /// Override the exploration rate.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.policy = EpsilonGreedy::new(epsilon);
        self
    }

    /// Run one episode from `start`, updating `q` in place.
    ///
    /// `q` must have one column per entry of `actions`. The episode ends when
    /// the environment reports `done`, including mid-way through a macro.
    pub fn run<E, R>(
        &self,
        env: &mut E,
        start: usize,
        q: &mut QTable,
        actions: &ActionSet,
        rng: &mut R,
    ) -> Result<Trajectory>
    where
        E: Environment + ?Sized,
        R: Rng + ?Sized,
    {
        if q.n_actions() != actions.len() {
            bail!(
                "Q-table has {} action columns but the action set has {} entries",
                q.n_actions(),
                actions.len()
            );
        }
        if q.n_states() != env.n_states() {
            bail!(
                "Q-table has {} rows but the environment has {} states",
                q.n_states(),
                env.n_states()
            );
        }

        env.reset_to(start);
        self.render(env, false);

        let mut steps: Vec<Step> = Vec::new();
        let mut trace: Vec<usize> = Vec::new();
        let mut decisions = 0;
        let mut state = start;

        loop {
            let chosen = self.policy.select(q, state, rng);
            let group = actions
                .get(chosen)
                .with_context(|| format!("action index {chosen} missing from action set"))?;
            decisions += 1;

            for &action in group.primitives() {
                let outcome = env.step(action)?;
                steps.push(Step {
                    state,
                    action,
                    reward: outcome.reward,
                    next_state: outcome.next_state,
                    group: chosen,
                });
                trace.push(action);
                self.assign_credit(q, actions, &steps, &trace, outcome.reward, outcome.done());

                self.render(env, outcome.done());
                state = outcome.next_state;

                if outcome.done() {
                    let discounted_return =
                        discounted_cumulative(steps.iter().map(|s| s.reward), self.gamma);
                    return Ok(Trajectory {
                        steps,
                        discounted_return,
                        reached_terminal: outcome.terminal,
                        decisions,
                    });
                }
            }
        }
    }

    /// Update every group that ends with the latest primitive.
    ///
    /// For a suffix of length `j` matching group `a`, started in state `s0`:
    /// `Q[s0, a] += alpha * (r + (1 - done) * gamma^j * max Q[s2] - Q[s0, a])`.
    fn assign_credit(
        &self,
        q: &mut QTable,
        actions: &ActionSet,
        steps: &[Step],
        trace: &[usize],
        reward: f64,
        done: bool,
    ) {
        let n = trace.len();
        let s2 = steps[n - 1].next_state;
        for j in 1..=n.min(actions.max_group_len()) {
            let Some(index) = actions.index_of(&trace[n - j..]) else {
                continue;
            };
            let s0 = steps[n - j].state;
            let bootstrap = if done {
                0.0
            } else {
                self.gamma.powi(j as i32) * q.max(s2)
            };
            q.update(s0, index, reward + bootstrap, self.alpha);
        }
    }

    fn render<E: Environment + ?Sized>(&self, env: &E, done: bool) {
        if let Some(delay) = self.render_delay {
            println!("{}", env.render());
            if done {
                std::thread::sleep(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionSpec, GridConfig};
    use crate::env::{GoalEnvironment, Gridworld, TimeLimit};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const LEFT: usize = 0;
    const RIGHT: usize = 1;

    fn corridor(max_steps: usize) -> TimeLimit<Gridworld> {
        let config = GridConfig {
            desc: vec!["_____".into()],
            start_states: "_".into(),
            blocked_states: "#".into(),
            max_episode_steps: max_steps,
            actions: Some(vec![ActionSpec::new(0, -1, '◀'), ActionSpec::new(0, 1, '▶')]),
        };
        TimeLimit::new(Gridworld::new(&config, 0).unwrap(), max_steps)
    }

    #[test]
    fn test_episode_ends_at_goal_with_discounted_return() {
        let mut env = corridor(50);
        env.set_goal(4);
        let actions = ActionSet::primitives_only(2);
        let mut q = QTable::zeros(5, 2);
        // Make "right" strictly preferred everywhere.
        for s in 0..5 {
            q.set(s, RIGHT, 1e-3);
        }
        let runner = EpisodeRunner::new(0.1, 0.9, 0.0);
        let mut rng = StdRng::seed_from_u64(0);
        let trajectory = runner.run(&mut env, 0, &mut q, &actions, &mut rng).unwrap();

        assert_eq!(trajectory.actions(), vec![RIGHT; 4]);
        assert!(trajectory.reached_terminal);
        assert!((trajectory.discounted_return - 0.9f64.powi(3)).abs() < 1e-12);
        assert_eq!(trajectory.states(), vec![0, 1, 2, 3, 4]);
        // The final transition earned reward 1 without bootstrap.
        assert!((q.get(3, RIGHT) - (1e-3 + 0.1 * (1.0 - 1e-3))).abs() < 1e-12);
    }

    #[test]
    fn test_truncated_episode_stops_at_limit() {
        let mut env = corridor(6);
        env.set_goal(4);
        let actions = ActionSet::primitives_only(2);
        let mut q = QTable::zeros(5, 2);
        for s in 0..5 {
            q.set(s, LEFT, 1e-3);
        }
        let runner = EpisodeRunner::new(0.1, 0.9, 0.0);
        let mut rng = StdRng::seed_from_u64(0);
        let trajectory = runner.run(&mut env, 0, &mut q, &actions, &mut rng).unwrap();

        assert_eq!(trajectory.len(), 6);
        assert!(!trajectory.reached_terminal);
        assert_eq!(trajectory.discounted_return, 0.0);
    }

    #[test]
    fn test_macro_matches_its_primitives() {
        let actions = ActionSet::new(2, vec![vec![RIGHT, RIGHT]]);
        let macro_index = actions.index_of(&[RIGHT, RIGHT]).unwrap();

        let mut macro_env = corridor(50);
        macro_env.set_goal(4);
        let mut q = QTable::zeros(5, 3);
        for s in 0..5 {
            q.set(s, macro_index, 1e-3);
        }
        let runner = EpisodeRunner::new(0.1, 0.9, 0.0);
        let mut rng = StdRng::seed_from_u64(0);
        let with_macro = runner.run(&mut macro_env, 0, &mut q, &actions, &mut rng).unwrap();

        let mut plain_env = corridor(50);
        plain_env.set_goal(4);
        plain_env.reset_to(0);
        let mut plain_states = vec![0];
        for _ in 0..4 {
            plain_states.push(plain_env.step(RIGHT).unwrap().next_state);
        }

        assert_eq!(with_macro.states(), plain_states);
        assert_eq!(with_macro.actions(), vec![RIGHT; 4]);
        assert_eq!(with_macro.decisions, 2);
        assert!(with_macro.steps.iter().all(|s| s.group == macro_index));
    }

    #[test]
    fn test_macro_cut_short_when_episode_ends() {
        let actions = ActionSet::new(2, vec![vec![RIGHT, RIGHT, RIGHT]]);
        let macro_index = actions.index_of(&[RIGHT, RIGHT, RIGHT]).unwrap();
        let mut env = corridor(50);
        env.set_goal(2);
        let mut q = QTable::zeros(5, 3);
        q.set(0, macro_index, 1.0);
        let runner = EpisodeRunner::new(0.1, 0.9, 0.0);
        let mut rng = StdRng::seed_from_u64(0);
        let trajectory = runner.run(&mut env, 0, &mut q, &actions, &mut rng).unwrap();
        assert_eq!(trajectory.actions(), vec![RIGHT, RIGHT]);
        assert!(trajectory.reached_terminal);
    }

    #[test]
    fn test_credit_reaches_every_matching_group() {
        // Macro [R, R] and primitive R both end with the goal-reaching step.
        let actions = ActionSet::new(2, vec![vec![RIGHT, RIGHT]]);
        let macro_index = actions.index_of(&[RIGHT, RIGHT]).unwrap();
        let mut env = corridor(50);
        env.set_goal(2);
        let mut q = QTable::zeros(5, 3);
        for s in 0..5 {
            q.set(s, RIGHT, 1e-3);
        }
        let runner = EpisodeRunner::new(0.5, 0.9, 0.0);
        let mut rng = StdRng::seed_from_u64(0);
        runner.run(&mut env, 0, &mut q, &actions, &mut rng).unwrap();

        // Two primitive steps 0 -> 1 -> 2. The second step completes [R, R]
        // started in state 0, so the macro's Q at state 0 learns reward 1.
        assert!((q.get(0, macro_index) - 0.5).abs() < 1e-12);
        assert!((q.get(1, RIGHT) - (1e-3 + 0.5 * (1.0 - 1e-3))).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_mismatched_q_table() {
        let mut env = corridor(10);
        let actions = ActionSet::new(2, vec![vec![0, 1]]);
        let mut q = QTable::zeros(5, 2);
        let runner = EpisodeRunner::new(0.1, 0.9, 0.1);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(runner.run(&mut env, 0, &mut q, &actions, &mut rng).is_err());
    }
}
