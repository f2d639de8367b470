//! Environment.
use super::Action;
use crate::record::Record;
use anyhow::Result;

/// Represents an action, observation and reward tuple `(a_t, o_t+1, r_t)`
/// with some additional information.
#[derive(Debug, Clone)]
pub struct Step {
    /// Observation after the action.
    pub obs: Vec<f32>,

    /// Reward of the transition.
    pub reward: f32,

    /// Flag denoting if the episode is done.
    pub is_done: bool,

    /// Information defined by the environment.
    pub info: Record,
}

impl Step {
    /// Constructs a [`Step`] with an empty info.
    pub fn new(obs: Vec<f32>, reward: f32, is_done: bool) -> Self {
        Self {
            obs,
            reward,
            is_done,
            info: Record::empty(),
        }
    }
}

/// Represents an environment, typically an MDP of a control problem.
///
/// Observations are fixed-dimension vectors. Environments do not reset
/// themselves; the trainer calls [`Env::reset`] at the start of each episode.
pub trait Env {
    /// Dimension of observations.
    fn obs_dim(&self) -> usize;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Performs an environment step.
    fn step(&mut self, act: &Action) -> Result<Step>;

    /// Renders the current state. Does nothing by default.
    fn render(&mut self) -> Result<()> {
        Ok(())
    }
}
