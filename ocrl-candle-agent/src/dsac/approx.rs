//! Networks of DSAC and their optimizers.
use super::{DsacConfig, Temperature};
use crate::{
    model::{SubModel1, SubModel2},
    opt::Optimizer,
    util::{detached_tensors, init_varmap, randn, snapshot, track},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use rand::{rngs::StdRng, SeedableRng};

const EPSILON: f64 = 1e-6;

/// Which copy of the critic to evaluate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CriticRole {
    /// The trained critic.
    Live,

    /// The trained critic evaluated on detached weights. Gradients do not
    /// reach the critic parameters.
    Frozen,

    /// The target critic.
    Target,
}

/// Parameters of the tanh-squashed Gaussian action distribution.
pub struct ActionDist {
    /// Mean of the pre-squash Gaussian, `(batch_size, action_dim)`.
    pub mean: Tensor,

    /// Clamped log standard deviation of the pre-squash Gaussian.
    pub log_std: Tensor,
}

impl ActionDist {
    /// Standard deviation of the pre-squash Gaussian.
    pub fn std(&self) -> Result<Tensor> {
        Ok(self.log_std.exp()?)
    }

    /// The action without sampling, `tanh(mean)`.
    pub fn mode(&self) -> Result<Tensor> {
        Ok(self.mean.tanh()?)
    }
}

/// Owns the critic, its target copy, the policy and the temperature of DSAC,
/// together with their optimizers.
///
/// The target critic is initialized as an independent copy of the critic and
/// only changes through [`ApproxContainer::soft_update_target`].
pub struct ApproxContainer<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: Clone,
{
    q: Q,
    q_config: Q::Config,
    q_varmap: VarMap,
    q_target: Q,
    q_target_varmap: VarMap,
    policy: P,
    policy_varmap: VarMap,
    pub(super) temperature: Temperature,
    pub(super) q_opt: Optimizer,
    pub(super) policy_opt: Optimizer,
    min_log_std: f64,
    max_log_std: f64,
    device: Device,
    rng: StdRng,
}

impl<Q, P> ApproxContainer<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: Clone,
{
    /// Builds the networks with parameters drawn from a generator seeded
    /// with `config.seed`.
    pub fn build(config: &DsacConfig<Q::Config, P::Config>) -> Result<Self> {
        let device = config.device.build()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let q_config = config
            .critic_config
            .clone()
            .context("critic_config is not set.")?;
        let p_config = config
            .actor_config
            .clone()
            .context("actor_config is not set.")?;

        let q_varmap = VarMap::new();
        let q = Q::build(
            VarBuilder::from_varmap(&q_varmap, DType::F32, &device),
            q_config.clone(),
        )?;
        init_varmap(&q_varmap, &mut rng)?;

        let q_target_varmap = snapshot(&q_varmap)?;
        let q_target = Q::build(
            VarBuilder::from_varmap(&q_target_varmap, DType::F32, &device),
            q_config.clone(),
        )?;

        let policy_varmap = VarMap::new();
        let policy = P::build(
            VarBuilder::from_varmap(&policy_varmap, DType::F32, &device),
            p_config,
        )?;
        init_varmap(&policy_varmap, &mut rng)?;

        let temperature = match config.auto_alpha {
            true => Temperature::auto(config.alpha, &config.alpha_opt_config, &device)?,
            false => Temperature::fixed(config.alpha, &device)?,
        };
        let q_opt = config.value_opt_config.build(q_varmap.all_vars())?;
        let policy_opt = config.policy_opt_config.build(policy_varmap.all_vars())?;
        info!(
            "Built DSAC networks: {} critic variables, {} policy variables",
            q_varmap.all_vars().len(),
            policy_varmap.all_vars().len()
        );

        Ok(Self {
            q,
            q_config,
            q_varmap,
            q_target,
            q_target_varmap,
            policy,
            policy_varmap,
            temperature,
            q_opt,
            policy_opt,
            min_log_std: config.min_log_std,
            max_log_std: config.max_log_std,
            device,
            rng,
        })
    }

    /// Device of the networks.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Variables of the critic.
    pub fn critic_varmap(&self) -> &VarMap {
        &self.q_varmap
    }

    /// Variables of the target critic.
    pub fn target_varmap(&self) -> &VarMap {
        &self.q_target_varmap
    }

    /// Variables of the policy.
    pub fn policy_varmap(&self) -> &VarMap {
        &self.policy_varmap
    }

    /// The temperature.
    pub fn temperature(&self) -> &Temperature {
        &self.temperature
    }

    /// Forward pass of the policy.
    pub fn predict_action(&self, obs: &Tensor) -> Result<ActionDist> {
        let (mean, log_std) = self.policy.forward(obs)?;
        let log_std = log_std.clamp(self.min_log_std, self.max_log_std)?;
        Ok(ActionDist { mean, log_std })
    }

    /// Draws a reparameterized action and its log-density.
    ///
    /// The action is `tanh(mean + std * z)` with `z ~ N(0, I)`; the
    /// log-density includes the correction of the squash. Both outputs carry
    /// gradients to the policy parameters.
    pub fn sample_action(&mut self, dist: &ActionDist) -> Result<(Tensor, Tensor)> {
        let z = randn(dist.mean.shape().clone(), &mut self.rng, &self.device)?;
        let std = dist.std()?;
        let act = ((&std * &z)? + &dist.mean)?.tanh()?;

        let half_log_2pi = 0.5 * (2.0 * std::f64::consts::PI).ln();
        let gauss = ((((z.sqr()? * -0.5)? - &dist.log_std)? - half_log_2pi)?).sum(D::Minus1)?;
        let squash = ((1.0 - act.sqr()?)? + EPSILON)?.log()?.sum(D::Minus1)?;
        let logp = (gauss - squash)?;

        Ok((act, logp))
    }

    /// Builds the critic on detached copies of its weights.
    fn frozen_critic(&self) -> Result<Q> {
        let vb = VarBuilder::from_tensors(
            detached_tensors(&self.q_varmap)?,
            DType::F32,
            &self.device,
        );
        Q::build(vb, self.q_config.clone())
    }

    /// Evaluates the distributional critic.
    ///
    /// Returns the mean and the standard deviation of the return with a
    /// sample `mean + z * std`. `z` is drawn from `N(0, 1)` clamped to
    /// `[-2, 2]`, or from its negative half if `use_min_branch` is `true`.
    pub fn evaluate_state_action(
        &mut self,
        obs: &Tensor,
        act: &Tensor,
        which_critic: CriticRole,
        use_min_branch: bool,
    ) -> Result<(Tensor, Tensor, Tensor)> {
        let out = match which_critic {
            CriticRole::Live => self.q.forward(obs, act)?,
            CriticRole::Target => self.q_target.forward(obs, act)?,
            CriticRole::Frozen => self.frozen_critic()?.forward(obs, act)?,
        };
        let n_out = out.dim(D::Minus1)?;
        let mean = out.narrow(D::Minus1, 0, 1)?.squeeze(D::Minus1)?;
        let std = out
            .narrow(D::Minus1, n_out - 1, 1)?
            .squeeze(D::Minus1)?
            .exp()?;

        let z = randn(mean.shape().clone(), &mut self.rng, &self.device)?;
        let z = match use_min_branch {
            true => z.abs()?.neg()?,
            false => z.clamp(-2f32, 2f32)?,
        };
        let sample = (&mean + (&z * &std)?)?;

        Ok((mean, std, sample))
    }

    /// `target <- polyak * target + (1 - polyak) * critic` for every critic parameter.
    pub fn soft_update_target(&self, polyak: f64) -> Result<()> {
        track(&self.q_target_varmap, &self.q_varmap, 1.0 - polyak)
    }
}
