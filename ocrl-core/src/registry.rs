//! Name-based lookup of components.
//!
//! Component names given in a configuration are resolved once at setup.
//! Buffers, trainers and algorithms are closed sets parsed into enums with
//! [`FromStr`]; environments are registered at startup in a [`Registry`].
use crate::{
    error::OcrlError,
    replay_buffer::{ReplayBuffer, ReplayBufferConfig},
};
use anyhow::Result;
use std::{collections::HashMap, fmt, str::FromStr};

fn unknown(kind: &str, name: &str) -> OcrlError {
    OcrlError::UnknownComponent {
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

/// Kinds of transition buffers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BufferKind {
    /// Uniformly sampled ring buffer, [`ReplayBuffer`].
    ReplayBuffer,
}

impl BufferKind {
    /// Builds the buffer.
    pub fn build(&self, config: &ReplayBufferConfig) -> Result<ReplayBuffer> {
        match self {
            Self::ReplayBuffer => ReplayBuffer::build(config),
        }
    }
}

impl FromStr for BufferKind {
    type Err = OcrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replay_buffer" => Ok(Self::ReplayBuffer),
            _ => Err(unknown("buffer", s)),
        }
    }
}

/// Kinds of trainers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrainerKind {
    /// Off-policy serial trainer, [`SerialTrainer`](crate::SerialTrainer).
    OffSerialTrainer,
}

impl FromStr for TrainerKind {
    type Err = OcrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off_serial_trainer" => Ok(Self::OffSerialTrainer),
            _ => Err(unknown("trainer", s)),
        }
    }
}

/// Kinds of algorithms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlgorithmKind {
    /// Distributional soft actor-critic.
    Dsac,
}

impl FromStr for AlgorithmKind {
    type Err = OcrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dsac" => Ok(Self::Dsac),
            _ => Err(unknown("algorithm", s)),
        }
    }
}

type Constructor<T> = Box<dyn Fn() -> Result<T>>;

/// Constructors registered by name.
pub struct Registry<T> {
    kind: String,
    constructors: HashMap<String, Constructor<T>>,
}

impl<T> Registry<T> {
    /// Creates an empty registry of the given kind of components.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            constructors: HashMap::new(),
        }
    }

    /// Registers a constructor, replacing the one of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn() -> Result<T> + 'static,
    {
        self.constructors.insert(name.into(), Box::new(f));
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Constructs the component registered as `name`.
    pub fn create(&self, name: &str) -> Result<T> {
        match self.constructors.get(name) {
            Some(f) => f(),
            None => Err(unknown(&self.kind, name).into()),
        }
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.constructors.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &names)
            .finish()
    }
}
