//! Configuration of [`SerialTrainer`](super::SerialTrainer).
use crate::{error::OcrlError, explorer::EpsilonGreedyConfig, ActionType};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`SerialTrainer`](super::SerialTrainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct TrainerConfig {
    /// Number of transitions in a mini-batch.
    pub batch_size: usize,

    /// Number of transitions collected before learning starts.
    pub buffer_warm_size: usize,

    /// Capacity of the transition buffer.
    pub buffer_max_size: usize,

    /// Factor applied to rewards before they are stored.
    pub reward_scale: f32,

    /// Number of training episodes, excluding warm-up episodes.
    pub max_train_episode: usize,

    /// Maximum number of steps in an episode.
    pub episode_length: usize,

    /// Standard deviation of the exploration noise of continuous actions.
    pub noise: f32,

    /// Action space of the environment.
    pub action_type: ActionType,

    /// Schedule of epsilon-greedy exploration of discrete actions.
    pub epsilon: EpsilonGreedyConfig,

    /// Interval of learning steps in environment steps within an episode.
    pub learning_interval: usize,

    /// Number of training episodes between evaluations.
    pub eval_interval: usize,

    /// Number of episodes in an evaluation.
    pub num_eval_episode: usize,

    /// If `true`, the environment is rendered in evaluation episodes.
    pub is_render: bool,

    /// Random seed of exploration and buffer sampling.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            buffer_warm_size: 1000,
            buffer_max_size: 100_000,
            reward_scale: 1.0,
            max_train_episode: 1000,
            episode_length: 200,
            noise: 0.1,
            action_type: ActionType::Continuous,
            epsilon: EpsilonGreedyConfig::default(),
            learning_interval: 5,
            eval_interval: 50,
            num_eval_episode: 1,
            is_render: false,
            seed: 42,
        }
    }
}

fn invalid(msg: String) -> Result<()> {
    Err(OcrlError::InvalidConfig(msg).into())
}

impl TrainerConfig {
    /// Sets the mini-batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the warm-up size of the buffer.
    pub fn buffer_warm_size(mut self, v: usize) -> Self {
        self.buffer_warm_size = v;
        self
    }

    /// Sets the capacity of the buffer.
    pub fn buffer_max_size(mut self, v: usize) -> Self {
        self.buffer_max_size = v;
        self
    }

    /// Sets the reward scale.
    pub fn reward_scale(mut self, v: f32) -> Self {
        self.reward_scale = v;
        self
    }

    /// Sets the number of training episodes.
    pub fn max_train_episode(mut self, v: usize) -> Self {
        self.max_train_episode = v;
        self
    }

    /// Sets the maximum length of episodes.
    pub fn episode_length(mut self, v: usize) -> Self {
        self.episode_length = v;
        self
    }

    /// Sets the standard deviation of the exploration noise.
    pub fn noise(mut self, v: f32) -> Self {
        self.noise = v;
        self
    }

    /// Sets the action type.
    pub fn action_type(mut self, v: ActionType) -> Self {
        self.action_type = v;
        self
    }

    /// Sets the epsilon-greedy schedule.
    pub fn epsilon(mut self, v: EpsilonGreedyConfig) -> Self {
        self.epsilon = v;
        self
    }

    /// Sets the learning interval.
    pub fn learning_interval(mut self, v: usize) -> Self {
        self.learning_interval = v;
        self
    }

    /// Sets the number of training episodes between evaluations.
    pub fn eval_interval(mut self, v: usize) -> Self {
        self.eval_interval = v;
        self
    }

    /// Sets the number of evaluation episodes.
    pub fn num_eval_episode(mut self, v: usize) -> Self {
        self.num_eval_episode = v;
        self
    }

    /// Enables rendering in evaluation.
    pub fn is_render(mut self, v: bool) -> Self {
        self.is_render = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Checks the consistency of the values.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_max_size == 0 {
            return invalid("buffer_max_size must be positive".to_string());
        }
        if self.buffer_warm_size >= self.buffer_max_size {
            return invalid(format!(
                "buffer_warm_size ({}) must be less than buffer_max_size ({})",
                self.buffer_warm_size, self.buffer_max_size
            ));
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be positive".to_string());
        }
        if self.episode_length == 0 {
            return invalid("episode_length must be positive".to_string());
        }
        if self.learning_interval == 0 {
            return invalid("learning_interval must be positive".to_string());
        }
        if self.eval_interval == 0 {
            return invalid("eval_interval must be positive".to_string());
        }
        if !(self.noise >= 0.0 && self.noise.is_finite()) {
            return invalid(format!("noise must be non-negative, got {}", self.noise));
        }
        if !(self.epsilon.eps_decay > 0.0) {
            return invalid(format!(
                "eps_decay must be positive, got {}",
                self.epsilon.eps_decay
            ));
        }
        if let ActionType::Discrete { action_num: 0 } = self.action_type {
            return invalid("action_num must be positive".to_string());
        }
        Ok(())
    }

    /// Loads [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
