//! Ring buffer of transitions.
use super::{ReplayBufferConfig, TransitionBatch};
use crate::error::OcrlError;
use anyhow::Result;
use rand::{rngs::StdRng, RngCore, SeedableRng};

/// A transition `(o_t, a_t, r_t, o_t+1, done)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Observation.
    pub obs: Vec<f32>,

    /// Action.
    pub act: Vec<f32>,

    /// Scaled reward.
    pub reward: f32,

    /// Next observation.
    pub next_obs: Vec<f32>,

    /// Done flag.
    pub is_done: bool,
}

/// A fixed-capacity circular store of transitions.
///
/// When the buffer is full, a new transition overwrites the oldest one.
pub struct ReplayBuffer {
    capacity: usize,
    obs_dim: usize,
    act_dim: usize,
    i: usize,
    size: usize,
    obs: Vec<f32>,
    act: Vec<f32>,
    reward: Vec<f32>,
    next_obs: Vec<f32>,
    is_done: Vec<i8>,
    rng: StdRng,
}

fn check_dim(what: &str, expected: usize, actual: usize) -> Result<(), OcrlError> {
    if expected == actual {
        Ok(())
    } else {
        Err(OcrlError::DimensionMismatch {
            what: what.to_string(),
            expected,
            actual,
        })
    }
}

impl ReplayBuffer {
    /// Builds an empty buffer.
    pub fn build(config: &ReplayBufferConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(OcrlError::InvalidConfig("capacity must be positive".to_string()).into());
        }
        let capacity = config.capacity;

        Ok(Self {
            capacity,
            obs_dim: config.obs_dim,
            act_dim: config.act_dim,
            i: 0,
            size: 0,
            obs: vec![0.; capacity * config.obs_dim],
            act: vec![0.; capacity * config.act_dim],
            reward: vec![0.; capacity],
            next_obs: vec![0.; capacity * config.obs_dim],
            is_done: vec![0; capacity],
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    /// Appends a transition, overwriting the oldest one if the buffer is full.
    pub fn store(
        &mut self,
        obs: &[f32],
        act: &[f32],
        reward: f32,
        next_obs: &[f32],
        is_done: bool,
    ) -> Result<()> {
        check_dim("obs", self.obs_dim, obs.len())?;
        check_dim("act", self.act_dim, act.len())?;
        check_dim("next_obs", self.obs_dim, next_obs.len())?;

        let (o, a) = (self.i * self.obs_dim, self.i * self.act_dim);
        self.obs[o..o + self.obs_dim].copy_from_slice(obs);
        self.act[a..a + self.act_dim].copy_from_slice(act);
        self.next_obs[o..o + self.obs_dim].copy_from_slice(next_obs);
        self.reward[self.i] = reward;
        self.is_done[self.i] = is_done as i8;

        self.i = (self.i + 1) % self.capacity;
        self.size = (self.size + 1).min(self.capacity);

        Ok(())
    }

    /// Appends a [`Transition`].
    pub fn push(&mut self, tr: &Transition) -> Result<()> {
        self.store(&tr.obs, &tr.act, tr.reward, &tr.next_obs, tr.is_done)
    }

    /// Samples `n` transitions uniformly with replacement.
    pub fn sample_batch(&mut self, n: usize) -> Result<TransitionBatch> {
        if self.size == 0 {
            return Err(OcrlError::EmptyBuffer.into());
        }
        let ixs = (0..n)
            .map(|_| (self.rng.next_u32() as usize) % self.size)
            .collect::<Vec<_>>();

        Ok(TransitionBatch {
            obs: Self::gather(&self.obs, &ixs, self.obs_dim),
            act: Self::gather(&self.act, &ixs, self.act_dim),
            reward: ixs.iter().map(|&ix| self.reward[ix]).collect(),
            next_obs: Self::gather(&self.next_obs, &ixs, self.obs_dim),
            is_done: ixs.iter().map(|&ix| self.is_done[ix]).collect(),
            obs_dim: self.obs_dim,
            act_dim: self.act_dim,
        })
    }

    fn gather(data: &[f32], ixs: &[usize], dim: usize) -> Vec<f32> {
        ixs.iter()
            .flat_map(|&ix| data[ix * dim..(ix + 1) * dim].iter().copied())
            .collect()
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if no transition is stored.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Maximum number of transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the stored transitions, oldest first.
    pub fn transitions(&self) -> Vec<Transition> {
        let start = if self.size < self.capacity { 0 } else { self.i };
        (0..self.size)
            .map(|k| {
                let ix = (start + k) % self.capacity;
                let (o, a) = (ix * self.obs_dim, ix * self.act_dim);
                Transition {
                    obs: self.obs[o..o + self.obs_dim].to_vec(),
                    act: self.act[a..a + self.act_dim].to_vec(),
                    reward: self.reward[ix],
                    next_obs: self.next_obs[o..o + self.obs_dim].to_vec(),
                    is_done: self.is_done[ix] != 0,
                }
            })
            .collect()
    }
}
