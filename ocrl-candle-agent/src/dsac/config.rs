//! Configuration of DSAC agent.
use crate::{opt::OptimizerConfig, Device};
use anyhow::Result;
use ocrl_core::error::OcrlError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Dsac`](super::Dsac).
///
/// `Q` and `P` are the configurations of the critic and the policy networks.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DsacConfig<Q, P> {
    /// Configuration of the critic network.
    pub critic_config: Option<Q>,

    /// Configuration of the policy network.
    pub actor_config: Option<P>,

    /// Discount factor.
    pub gamma: f64,

    /// Rate of the soft update of the target critic.
    pub tau: f64,

    /// If `true`, the temperature is learned.
    pub auto_alpha: bool,

    /// Temperature, or its initial value if `auto_alpha` is `true`.
    pub alpha: f64,

    /// Bound of the sampled TD error used in the critic loss.
    pub td_bound: f64,

    /// If `false`, the critic is trained with the Gaussian negative
    /// log-likelihood of the TD target.
    pub bound: bool,

    /// Interval of the policy, temperature and target updates in learning steps.
    pub delay_update: usize,

    /// Target entropy. Defaults to `-action_dim`.
    pub target_entropy: Option<f64>,

    /// Optimizer of the critic.
    pub value_opt_config: OptimizerConfig,

    /// Optimizer of the policy.
    pub policy_opt_config: OptimizerConfig,

    /// Optimizer of the temperature.
    pub alpha_opt_config: OptimizerConfig,

    /// Lower bound of the log standard deviation of the policy.
    pub min_log_std: f64,

    /// Upper bound of the log standard deviation of the policy.
    pub max_log_std: f64,

    /// Random seed of parameter initialization and sampling.
    pub seed: u64,

    /// Device of the networks.
    pub device: Device,
}

impl<Q, P> Default for DsacConfig<Q, P> {
    fn default() -> Self {
        Self {
            critic_config: None,
            actor_config: None,
            gamma: 0.99,
            tau: 0.005,
            auto_alpha: true,
            alpha: 0.2,
            td_bound: 10.0,
            bound: true,
            delay_update: 2,
            target_entropy: None,
            value_opt_config: OptimizerConfig::default(),
            policy_opt_config: OptimizerConfig::default(),
            alpha_opt_config: OptimizerConfig::default(),
            min_log_std: -20.0,
            max_log_std: 2.0,
            seed: 42,
            device: Device::Cpu,
        }
    }
}

fn invalid(msg: String) -> Result<()> {
    Err(OcrlError::InvalidConfig(msg).into())
}

impl<Q, P> DsacConfig<Q, P>
where
    Q: DeserializeOwned + Serialize,
    P: DeserializeOwned + Serialize,
{
    /// Sets the configuration of the critic network.
    pub fn critic_config(mut self, v: Q) -> Self {
        self.critic_config = Some(v);
        self
    }

    /// Sets the configuration of the policy network.
    pub fn actor_config(mut self, v: P) -> Self {
        self.actor_config = Some(v);
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the soft update rate.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Enables learning of the temperature.
    pub fn auto_alpha(mut self, v: bool) -> Self {
        self.auto_alpha = v;
        self
    }

    /// Sets the (initial) temperature.
    pub fn alpha(mut self, v: f64) -> Self {
        self.alpha = v;
        self
    }

    /// Sets the bound of the TD error.
    pub fn td_bound(mut self, v: f64) -> Self {
        self.td_bound = v;
        self
    }

    /// Enables the bounded critic loss.
    pub fn bound(mut self, v: bool) -> Self {
        self.bound = v;
        self
    }

    /// Sets the interval of delayed updates.
    pub fn delay_update(mut self, v: usize) -> Self {
        self.delay_update = v;
        self
    }

    /// Sets the target entropy.
    pub fn target_entropy(mut self, v: f64) -> Self {
        self.target_entropy = Some(v);
        self
    }

    /// Sets the learning rate of the critic.
    pub fn value_learning_rate(mut self, v: f64) -> Self {
        self.value_opt_config = self.value_opt_config.learning_rate(v);
        self
    }

    /// Sets the learning rate of the policy.
    pub fn policy_learning_rate(mut self, v: f64) -> Self {
        self.policy_opt_config = self.policy_opt_config.learning_rate(v);
        self
    }

    /// Sets the learning rate of the temperature.
    pub fn alpha_learning_rate(mut self, v: f64) -> Self {
        self.alpha_opt_config = self.alpha_opt_config.learning_rate(v);
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Checks the consistency of the values.
    pub fn validate(&self) -> Result<()> {
        if self.delay_update == 0 {
            return invalid("delay_update must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.tau) {
            return invalid(format!("tau must be in [0, 1], got {}", self.tau));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid(format!("gamma must be in [0, 1], got {}", self.gamma));
        }
        if !(self.td_bound > 0.0) {
            return invalid(format!("td_bound must be positive, got {}", self.td_bound));
        }
        if !(self.alpha > 0.0) {
            return invalid(format!("alpha must be positive, got {}", self.alpha));
        }
        if !(self.min_log_std < self.max_log_std) {
            return invalid(format!(
                "min_log_std ({}) must be less than max_log_std ({})",
                self.min_log_std, self.max_log_std
            ));
        }
        if self.critic_config.is_none() {
            return invalid("critic_config is not set".to_string());
        }
        if self.actor_config.is_none() {
            return invalid("actor_config is not set".to_string());
        }
        Ok(())
    }

    /// Constructs [`DsacConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DsacConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mlp::MlpConfig;
    use tempdir::TempDir;

    type Config = DsacConfig<MlpConfig, MlpConfig>;

    fn config() -> Config {
        Config::default()
            .critic_config(MlpConfig::new(3, vec![8], 2, false))
            .actor_config(MlpConfig::new(2, vec![8], 1, false))
    }

    #[test]
    fn test_serde_dsac_config() -> Result<()> {
        let config = config().delay_update(4).value_learning_rate(1e-3);
        let dir = TempDir::new("dsac_config")?;
        let path = dir.path().join("dsac_config.yaml");
        config.save(&path)?;
        let config_ = Config::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(config().validate().is_ok());

        let cases = vec![
            config().delay_update(0),
            config().tau(1.5),
            config().gamma(-0.1),
            config().td_bound(0.0),
            config().alpha(0.0),
            Config::default(),
        ];
        for config in cases {
            let err = config.validate().unwrap_err();
            assert!(matches!(
                err.downcast_ref::<OcrlError>(),
                Some(OcrlError::InvalidConfig(_))
            ));
        }
    }
}
