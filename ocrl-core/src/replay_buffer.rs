//! Fixed-capacity transition buffer.
mod base;
mod batch;
mod config;
pub use base::{ReplayBuffer, Transition};
pub use batch::TransitionBatch;
pub use config::ReplayBufferConfig;
