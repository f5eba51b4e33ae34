//! Step-limit wrapper that truncates episodes.

use anyhow::Result;

use super::traits::{Environment, GoalEnvironment, StepOutcome, Transition};

/// Ends every episode after `max_steps` primitive steps.
///
/// A truncated step reports `truncated = true` so the episode runner stops even
/// when the goal is never reached.
#[derive(Debug, Clone)]
pub struct TimeLimit<E> {
    env: E,
    max_steps: usize,
    elapsed: usize,
}

impl<E> TimeLimit<E> {
    pub fn new(env: E, max_steps: usize) -> Self {
        Self {
            env,
            max_steps,
            elapsed: 0,
        }
    }

    pub fn inner(&self) -> &E {
        &self.env
    }

    pub fn inner_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Steps taken since the last reset.
    pub fn elapsed(&self) -> usize {
        self.elapsed
    }
}

impl<E: Environment> Environment for TimeLimit<E> {
    fn n_states(&self) -> usize {
        self.env.n_states()
    }

    fn n_actions(&self) -> usize {
        self.env.n_actions()
    }

    fn reset(&mut self) -> usize {
        self.elapsed = 0;
        self.env.reset()
    }

    fn reset_to(&mut self, state: usize) {
        self.elapsed = 0;
        self.env.reset_to(state);
    }

    fn step(&mut self, action: usize) -> Result<StepOutcome> {
        let mut outcome = self.env.step(action)?;
        self.elapsed += 1;
        if self.elapsed >= self.max_steps && !outcome.terminal {
            outcome.truncated = true;
        }
        Ok(outcome)
    }

    fn state(&self) -> usize {
        self.env.state()
    }

    fn transitions(&self, state: usize, action: usize) -> &[Transition] {
        self.env.transitions(state, action)
    }

    fn action_strings(&self) -> &[char] {
        self.env.action_strings()
    }

    fn render(&self) -> String {
        self.env.render()
    }
}

impl<E: GoalEnvironment> GoalEnvironment for TimeLimit<E> {
    fn encode(&self, row: usize, col: usize) -> usize {
        self.env.encode(row, col)
    }

    fn decode(&self, state: usize) -> (usize, usize) {
        self.env.decode(state)
    }

    fn set_goal(&mut self, goal: usize) {
        self.env.set_goal(goal)
    }

    fn goal(&self) -> usize {
        self.env.goal()
    }

    fn sample_goal(&mut self) -> usize {
        self.env.sample_goal()
    }
}
