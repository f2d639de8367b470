use super::Action;
use crate::{record::Record, replay_buffer::TransitionBatch};
use anyhow::Result;

/// An RL algorithm trained from batches of transitions.
///
/// Computing an update and applying it are separate steps so that the
/// payload returned by [`Algorithm::get_remote_update_info`] can be applied
/// later with [`Algorithm::remote_update`]. Applying the payload once on an
/// unchanged parameter set has the same effect as [`Algorithm::local_update`].
pub trait Algorithm {
    /// Payload carrying everything needed to apply an update.
    type UpdateInfo;

    /// Returns the action of the policy for the given observation, without
    /// exploration noise.
    fn predict(&mut self, obs: &[f32]) -> Result<Action>;

    /// Computes an update from a batch and returns diagnostics with the
    /// update payload. Parameters are not modified.
    ///
    /// `iteration` is the 1-based index of the learning step.
    fn get_remote_update_info(
        &mut self,
        batch: &TransitionBatch,
        iteration: usize,
    ) -> Result<(Record, Self::UpdateInfo)>;

    /// Applies an update computed by [`Algorithm::get_remote_update_info`].
    fn remote_update(&mut self, info: Self::UpdateInfo) -> Result<()>;

    /// Computes and applies an update.
    fn local_update(&mut self, batch: &TransitionBatch, iteration: usize) -> Result<Record> {
        let (record, info) = self.get_remote_update_info(batch, iteration)?;
        self.remote_update(info)?;
        Ok(record)
    }

    /// Names of the hyper-parameters that may be adjusted between runs.
    fn adjustable_parameters(&self) -> &'static [&'static str] {
        &[]
    }
}
