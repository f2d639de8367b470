//! Core functionalities.
mod action;
mod algorithm;
mod env;
pub use action::{Action, ActionType};
pub use algorithm::Algorithm;
pub use env::{Env, Step};
