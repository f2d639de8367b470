#![warn(missing_docs)]
//! Training loop and experience management for off-policy reinforcement
//! learning on optimal control problems.
//!
//! A [`SerialTrainer`] runs episodes of an [`Env`], stores transitions in a
//! [`ReplayBuffer`](replay_buffer::ReplayBuffer) and periodically asks an
//! [`Algorithm`] to learn from sampled mini-batches.
pub mod config;
pub mod error;
pub mod explorer;
pub mod record;
pub mod registry;
pub mod replay_buffer;

mod base;
pub use base::{Action, ActionType, Algorithm, Env, Step};

mod trainer;
pub use trainer::{SerialTrainer, TrainerConfig, TrainerState};
