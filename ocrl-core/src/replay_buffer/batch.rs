/// A mini-batch of transitions.
///
/// Observations and actions are flattened in row-major order, i.e.,
/// `obs[i * obs_dim..(i + 1) * obs_dim]` is the observation of the `i`-th
/// sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBatch {
    /// Observations.
    pub obs: Vec<f32>,

    /// Actions.
    pub act: Vec<f32>,

    /// Scaled rewards.
    pub reward: Vec<f32>,

    /// Next observations.
    pub next_obs: Vec<f32>,

    /// Done flags.
    pub is_done: Vec<i8>,

    /// Dimension of observations.
    pub obs_dim: usize,

    /// Dimension of actions.
    pub act_dim: usize,
}

impl TransitionBatch {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch has no samples.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}
