//! Configuration of an experiment.
use crate::{
    registry::{AlgorithmKind, BufferKind, TrainerKind},
    TrainerConfig,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Names of the components of an experiment and the trainer settings.
///
/// Component names are resolved by [`ExperimentConfig::validate`], so an
/// unknown name is reported before anything is built.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ExperimentConfig {
    /// Identifier of the environment.
    pub env_id: String,

    /// Name of the algorithm.
    pub algorithm: String,

    /// Name of the transition buffer.
    pub buffer_name: String,

    /// Name of the trainer.
    pub trainer: String,

    /// Settings of the trainer.
    #[serde(default)]
    pub trainer_config: TrainerConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            env_id: String::new(),
            algorithm: "DSAC".to_string(),
            buffer_name: "replay_buffer".to_string(),
            trainer: "off_serial_trainer".to_string(),
            trainer_config: TrainerConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Sets the environment identifier.
    pub fn env_id(mut self, v: impl Into<String>) -> Self {
        self.env_id = v.into();
        self
    }

    /// Sets the algorithm name.
    pub fn algorithm(mut self, v: impl Into<String>) -> Self {
        self.algorithm = v.into();
        self
    }

    /// Sets the buffer name.
    pub fn buffer_name(mut self, v: impl Into<String>) -> Self {
        self.buffer_name = v.into();
        self
    }

    /// Sets the trainer name.
    pub fn trainer(mut self, v: impl Into<String>) -> Self {
        self.trainer = v.into();
        self
    }

    /// Sets the trainer configuration.
    pub fn trainer_config(mut self, v: TrainerConfig) -> Self {
        self.trainer_config = v;
        self
    }

    /// Resolves the component names and checks the trainer configuration.
    pub fn validate(&self) -> Result<(AlgorithmKind, BufferKind, TrainerKind)> {
        let algorithm = self.algorithm.parse::<AlgorithmKind>()?;
        let buffer = self.buffer_name.parse::<BufferKind>()?;
        let trainer = self.trainer.parse::<TrainerKind>()?;
        self.trainer_config.validate()?;
        Ok((algorithm, buffer, trainer))
    }

    /// Loads [`ExperimentConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ExperimentConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::OcrlError;
    use tempdir::TempDir;

    #[test]
    fn test_validate_names() -> Result<()> {
        let config = ExperimentConfig::default().env_id("veh3dofconti");
        assert_eq!(
            config.validate()?,
            (
                AlgorithmKind::Dsac,
                BufferKind::ReplayBuffer,
                TrainerKind::OffSerialTrainer
            )
        );

        let err = config
            .clone()
            .buffer_name("prioritized_replay_buffer")
            .validate()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OcrlError>(),
            Some(OcrlError::UnknownComponent { kind, .. }) if kind == "buffer"
        ));

        let err = config
            .trainer_config(TrainerConfig::default().batch_size(0))
            .validate()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OcrlError>(),
            Some(OcrlError::InvalidConfig(_))
        ));
        Ok(())
    }

    #[test]
    fn test_serde_experiment_config() -> Result<()> {
        let config = ExperimentConfig::default()
            .env_id("veh3dofconti")
            .trainer_config(TrainerConfig::default().max_train_episode(10));
        let dir = TempDir::new("experiment_config")?;
        let path = dir.path().join("experiment.yaml");
        config.save(&path)?;
        assert_eq!(ExperimentConfig::load(&path)?, config);
        Ok(())
    }
}
