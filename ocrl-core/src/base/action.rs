//! Actions.
use serde::{Deserialize, Serialize};

/// Kind of the action space of an environment.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub enum ActionType {
    /// Real-valued actions normalized to `[-1, 1]`.
    Continuous,

    /// Actions taking values in `0..action_num`.
    Discrete {
        /// Number of actions.
        action_num: usize,
    },
}

/// An action taken in an environment.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Continuous action.
    Continuous(Vec<f32>),

    /// Discrete action.
    Discrete(usize),
}

impl Action {
    /// Returns the representation of the action stored in a buffer.
    pub fn to_vec(&self) -> Vec<f32> {
        match self {
            Self::Continuous(a) => a.clone(),
            Self::Discrete(a) => vec![*a as f32],
        }
    }

    /// Returns `true` if the action is continuous.
    pub fn is_continuous(&self) -> bool {
        matches!(self, Self::Continuous(_))
    }
}
