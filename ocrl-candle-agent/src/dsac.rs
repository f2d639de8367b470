//! Distributional soft actor-critic (DSAC).
//!
//! The critic models the return of a state-action pair as a Gaussian whose
//! mean and log standard deviation are the two outputs of the network. The
//! critic loss bounds the sampled TD error to stabilize the variance update,
//! and the policy, temperature and target network are updated every
//! `delay_update` learning steps.
mod approx;
mod base;
mod config;
mod ent_coef;
mod loss;
pub use approx::{ActionDist, ApproxContainer, CriticRole};
pub use base::{AppliedUpdate, Dsac, DsacUpdateInfo};
pub use config::DsacConfig;
pub use ent_coef::Temperature;
pub use loss::{bounded_critic_loss, compute_target_q, gaussian_nll, TargetQ};
