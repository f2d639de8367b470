//! Post-processing of actions for exploration.
//!
//! Continuous actions are perturbed with Gaussian noise during exploration
//! and always clipped to `[-1, 1]`. Discrete actions are replaced by a
//! uniformly random one with an exponentially decaying probability.
use crate::{error::OcrlError, Action};
use anyhow::Result;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Clips each element of a continuous action to `[-1, 1]`.
pub fn clip(act: Vec<f32>) -> Vec<f32> {
    act.into_iter().map(|a| a.clamp(-1.0, 1.0)).collect()
}

/// Gaussian noise with a fixed standard deviation added to continuous actions.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    normal: Normal<f32>,
}

impl GaussianNoise {
    /// Constructs the explorer.
    ///
    /// Fails if `std` is negative or not finite.
    pub fn new(std: f32) -> Result<Self> {
        if !(std >= 0.0) {
            return Err(invalid_std(std, "must be non-negative"));
        }
        let normal = Normal::new(0f32, std).map_err(|e| invalid_std(std, e))?;
        Ok(Self { normal })
    }

    /// Standard deviation of the noise.
    pub fn std(&self) -> f32 {
        self.normal.std_dev()
    }

    /// Returns the clipped action with noise added.
    pub fn action(&self, act: Vec<f32>, rng: &mut impl Rng) -> Vec<f32> {
        clip(act.into_iter().map(|a| a + self.normal.sample(rng)).collect())
    }
}

fn invalid_std(v: f32, reason: impl fmt::Display) -> anyhow::Error {
    OcrlError::InvalidConfig(format!("noise std {}: {}", v, reason)).into()
}

/// Configuration of [`EpsilonGreedy`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedyConfig {
    /// Probability of a random action at step 0.
    pub eps_start: f64,

    /// Probability of a random action as the step count goes to infinity.
    pub eps_end: f64,

    /// Time constant of the decay in environment steps.
    pub eps_decay: f64,
}

impl Default for EpsilonGreedyConfig {
    fn default() -> Self {
        Self {
            eps_start: 0.9,
            eps_end: 0.05,
            eps_decay: 2000.0,
        }
    }
}

impl EpsilonGreedyConfig {
    /// Sets the starting probability.
    pub fn eps_start(mut self, v: f64) -> Self {
        self.eps_start = v;
        self
    }

    /// Sets the final probability.
    pub fn eps_end(mut self, v: f64) -> Self {
        self.eps_end = v;
        self
    }

    /// Sets the decay time constant.
    pub fn eps_decay(mut self, v: f64) -> Self {
        self.eps_decay = v;
        self
    }
}

/// Epsilon-greedy explorer for discrete actions.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    config: EpsilonGreedyConfig,
}

impl EpsilonGreedy {
    /// Constructs the explorer.
    pub fn new(config: EpsilonGreedyConfig) -> Self {
        Self { config }
    }

    /// Probability of taking a random action after `steps` environment steps.
    ///
    /// `eps_end + (eps_start - eps_end) * exp(-steps / eps_decay)`
    pub fn threshold(&self, steps: usize) -> f64 {
        let c = &self.config;
        c.eps_end + (c.eps_start - c.eps_end) * (-(steps as f64) / c.eps_decay).exp()
    }

    /// Returns a random action in `0..action_num` with probability
    /// [`EpsilonGreedy::threshold`], otherwise `greedy`.
    pub fn action(
        &self,
        greedy: usize,
        action_num: usize,
        steps: usize,
        rng: &mut impl Rng,
    ) -> usize {
        if rng.gen::<f64>() < self.threshold(steps) {
            rng.gen_range(0..action_num)
        } else {
            greedy
        }
    }
}

/// Applies exploration to an action of either kind.
#[derive(Debug, Clone)]
pub struct Explorer {
    noise: GaussianNoise,
    eps_greedy: EpsilonGreedy,
}

impl Explorer {
    /// Constructs the explorer.
    pub fn new(noise: GaussianNoise, eps_greedy: EpsilonGreedy) -> Self {
        Self { noise, eps_greedy }
    }

    /// Returns the explored action.
    pub fn explore(
        &self,
        act: Action,
        action_num: usize,
        steps: usize,
        rng: &mut impl Rng,
    ) -> Action {
        match act {
            Action::Continuous(a) => Action::Continuous(self.noise.action(a, rng)),
            Action::Discrete(a) => {
                Action::Discrete(self.eps_greedy.action(a, action_num, steps, rng))
            }
        }
    }

    /// Returns the action used in evaluation, without exploration.
    pub fn exploit(&self, act: Action) -> Action {
        match act {
            Action::Continuous(a) => Action::Continuous(clip(a)),
            act => act,
        }
    }
}
