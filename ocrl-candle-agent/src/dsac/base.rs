use super::{
    bounded_critic_loss, compute_target_q, gaussian_nll, ApproxContainer, CriticRole, DsacConfig,
};
use crate::{
    model::{SubModel1, SubModel2},
    util::{mean_scalar, OutDim},
};
use anyhow::Result;
use candle_core::{backprop::GradStore, Tensor};
use log::trace;
use ocrl_core::{
    error::OcrlError,
    record::{Record, RecordValue},
    replay_buffer::TransitionBatch,
    Action, Algorithm,
};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Instant;

/// Gradients computed by [`Dsac::compute_gradient`], applied later with
/// [`Dsac::apply_update`].
pub struct DsacUpdateInfo {
    q_grads: GradStore,
    policy_grads: GradStore,
    alpha_grads: Option<GradStore>,
    iteration: usize,
}

impl DsacUpdateInfo {
    /// The learning step the gradients were computed for.
    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

/// Which parts of the model an applied update changed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AppliedUpdate {
    /// The critic took an optimizer step.
    pub critic: bool,

    /// The policy took an optimizer step.
    pub policy: bool,

    /// The temperature took an optimizer step.
    pub alpha: bool,

    /// The target critic was soft-updated.
    pub target: bool,
}

struct BatchTensors {
    obs: Tensor,
    act: Tensor,
    reward: Tensor,
    next_obs: Tensor,
    done: Tensor,
}

/// Distributional soft actor-critic (DSAC) agent.
pub struct Dsac<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: Clone,
{
    networks: ApproxContainer<Q, P>,
    gamma: f64,
    tau: f64,
    td_bound: f64,
    bound: bool,
    delay_update: usize,
    target_entropy: f64,
    act_dim: usize,
}

impl<Q, P> Dsac<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`Dsac`] agent.
    pub fn build(config: DsacConfig<Q::Config, P::Config>) -> Result<Self> {
        config.validate()?;
        let act_dim = config
            .actor_config
            .as_ref()
            .map(|c| c.get_out_dim())
            .unwrap_or_default();
        let networks = ApproxContainer::build(&config)?;

        Ok(Self {
            networks,
            gamma: config.gamma,
            tau: config.tau,
            td_bound: config.td_bound,
            bound: config.bound,
            delay_update: config.delay_update,
            target_entropy: config.target_entropy.unwrap_or(-(act_dim as f64)),
            act_dim,
        })
    }
}

impl<Q, P> Dsac<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: Clone,
{
    /// The networks.
    pub fn networks(&self) -> &ApproxContainer<Q, P> {
        &self.networks
    }

    /// The networks as mutable reference.
    pub fn networks_mut(&mut self) -> &mut ApproxContainer<Q, P> {
        &mut self.networks
    }

    fn batch_tensors(&self, batch: &TransitionBatch) -> Result<BatchTensors> {
        if batch.act_dim != self.act_dim {
            return Err(OcrlError::DimensionMismatch {
                what: "act".to_string(),
                expected: self.act_dim,
                actual: batch.act_dim,
            }
            .into());
        }
        let device = self.networks.device();
        let n = batch.len();
        let done = batch.is_done.iter().map(|d| *d as f32).collect::<Vec<_>>();

        Ok(BatchTensors {
            obs: Tensor::from_slice(&batch.obs, (n, batch.obs_dim), device)?,
            act: Tensor::from_slice(&batch.act, (n, batch.act_dim), device)?,
            reward: Tensor::from_slice(&batch.reward, (n,), device)?,
            next_obs: Tensor::from_slice(&batch.next_obs, (n, batch.obs_dim), device)?,
            done: Tensor::from_vec(done, (n,), device)?,
        })
    }

    /// Returns the critic loss with the mean and standard deviation of the
    /// critic at the stored actions.
    fn compute_loss_q(&mut self, b: &BatchTensors, alpha: f64) -> Result<(Tensor, Tensor, Tensor)> {
        let next_dist = self.networks.predict_action(&b.next_obs)?;
        let (next_act, next_logp) = self.networks.sample_action(&next_dist)?;

        let (q, q_std, _) =
            self.networks
                .evaluate_state_action(&b.obs, &b.act, CriticRole::Live, false)?;
        let (q_next, _, q_next_sample) = self.networks.evaluate_state_action(
            &b.next_obs,
            &next_act.detach(),
            CriticRole::Target,
            false,
        )?;
        let target = compute_target_q(
            &b.reward,
            &b.done,
            &q.detach(),
            &q_next.detach(),
            &q_next_sample.detach(),
            &next_logp.detach(),
            self.gamma,
            alpha,
            self.td_bound,
        )?;

        let loss = match self.bound {
            true => bounded_critic_loss(&q, &q_std, &target)?,
            false => gaussian_nll(&q, &q_std, &target.mean)?,
        };

        Ok((loss, q.detach(), q_std.detach()))
    }

    /// Computes the gradients of the critic, policy and temperature losses
    /// without changing any parameter.
    pub fn compute_gradient(
        &mut self,
        batch: &TransitionBatch,
        iteration: usize,
    ) -> Result<(Record, DsacUpdateInfo)> {
        let start = Instant::now();
        let b = self.batch_tensors(batch)?;
        let alpha = self.networks.temperature().alpha()?;

        trace!("policy forward");
        let dist = self.networks.predict_action(&b.obs)?;
        let policy_mean = mean_scalar(&dist.mode()?)?;
        let policy_std = mean_scalar(&dist.std()?)?;
        let (new_act, new_logp) = self.networks.sample_action(&dist)?;

        trace!("critic loss");
        let (loss_q, q, q_std) = self.compute_loss_q(&b, alpha)?;
        let q_grads = loss_q.backward()?;

        trace!("policy loss");
        let (q_new, _, _) =
            self.networks
                .evaluate_state_action(&b.obs, &new_act, CriticRole::Frozen, false)?;
        let loss_policy = ((&new_logp * alpha)? - q_new)?.mean_all()?;
        let policy_grads = loss_policy.backward()?;
        let entropy = -mean_scalar(&new_logp.detach())?;

        let mut record = Record::from_slice(&[
            ("critic_avg_q", RecordValue::Scalar(mean_scalar(&q)?)),
            ("critic_avg_std", RecordValue::Scalar(mean_scalar(&q_std)?)),
            ("loss_critic", RecordValue::Scalar(loss_q.to_scalar::<f32>()?)),
            ("loss_actor", RecordValue::Scalar(loss_policy.to_scalar::<f32>()?)),
            ("policy_mean", RecordValue::Scalar(policy_mean)),
            ("policy_std", RecordValue::Scalar(policy_std)),
            ("entropy", RecordValue::Scalar(entropy)),
            ("alpha", RecordValue::Scalar(alpha as f32)),
        ]);

        let alpha_grads = match self.networks.temperature().is_auto() {
            true => {
                trace!("temperature loss");
                let (loss_alpha, grads) = self
                    .networks
                    .temperature()
                    .gradient(&new_logp, self.target_entropy)?;
                record.insert("loss_alpha", RecordValue::Scalar(loss_alpha));
                Some(grads)
            }
            false => None,
        };

        let alg_time = start.elapsed().as_secs_f32() * 1000.0;
        record.insert("alg_time_ms", RecordValue::Scalar(alg_time));

        Ok((
            record,
            DsacUpdateInfo {
                q_grads,
                policy_grads,
                alpha_grads,
                iteration,
            },
        ))
    }

    /// Applies gradients computed by [`Dsac::compute_gradient`].
    ///
    /// The critic is always updated. The policy, the temperature and the
    /// target critic are updated when the iteration is a multiple of
    /// `delay_update`.
    pub fn apply_update(&mut self, info: DsacUpdateInfo) -> Result<AppliedUpdate> {
        let mut applied = AppliedUpdate::default();

        self.networks.q_opt.step(&info.q_grads)?;
        applied.critic = true;

        if info.iteration % self.delay_update == 0 {
            self.networks.policy_opt.step(&info.policy_grads)?;
            applied.policy = true;

            if let Some(grads) = &info.alpha_grads {
                self.networks.temperature.step(grads)?;
                applied.alpha = true;
            }

            self.networks.soft_update_target(1.0 - self.tau)?;
            applied.target = true;
        }

        Ok(applied)
    }
}

impl<Q, P> Algorithm for Dsac<Q, P>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: Clone,
    P: SubModel1<Input = Tensor, Output = (Tensor, Tensor)>,
    P::Config: Clone,
{
    type UpdateInfo = DsacUpdateInfo;

    fn predict(&mut self, obs: &[f32]) -> Result<Action> {
        let obs = Tensor::from_slice(obs, (1, obs.len()), self.networks.device())?;
        let act = self.networks.predict_action(&obs)?.mode()?;
        Ok(Action::Continuous(act.squeeze(0)?.to_vec1::<f32>()?))
    }

    fn get_remote_update_info(
        &mut self,
        batch: &TransitionBatch,
        iteration: usize,
    ) -> Result<(Record, DsacUpdateInfo)> {
        self.compute_gradient(batch, iteration)
    }

    fn remote_update(&mut self, info: DsacUpdateInfo) -> Result<()> {
        self.apply_update(info)?;
        Ok(())
    }

    fn adjustable_parameters(&self) -> &'static [&'static str] {
        &[
            "gamma",
            "tau",
            "auto_alpha",
            "alpha",
            "td_bound",
            "bound",
            "delay_update",
        ]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        mlp::{Mlp, Mlp2, MlpConfig},
        util::varmap_values,
    };
    use candle_core::Device;
    use candle_nn::VarMap;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashMap;

    const OBS_DIM: usize = 3;
    const ACT_DIM: usize = 2;

    type Agent = Dsac<Mlp, Mlp2>;

    fn config() -> DsacConfig<MlpConfig, MlpConfig> {
        DsacConfig::default()
            .critic_config(MlpConfig::new(OBS_DIM + ACT_DIM, vec![16, 16], 2, false))
            .actor_config(MlpConfig::new(OBS_DIM, vec![16, 16], ACT_DIM, false))
            .value_learning_rate(1e-2)
            .policy_learning_rate(1e-2)
            .alpha_learning_rate(1e-2)
            .seed(13)
    }

    fn batch(n: usize, seed: u64) -> TransitionBatch {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut uniform = |len: usize, scale: f32| {
            (0..len)
                .map(|_| rng.gen_range(-scale..scale))
                .collect::<Vec<f32>>()
        };
        TransitionBatch {
            obs: uniform(n * OBS_DIM, 1.0),
            act: uniform(n * ACT_DIM, 1.0),
            reward: uniform(n, 2.0),
            next_obs: uniform(n * OBS_DIM, 1.0),
            is_done: (0..n).map(|i| (i % 7 == 0) as i8).collect(),
            obs_dim: OBS_DIM,
            act_dim: ACT_DIM,
        }
    }

    fn assert_close(a: &HashMap<String, Vec<f32>>, b: &HashMap<String, Vec<f32>>, tol: f32) {
        assert_eq!(a.len(), b.len());
        for (k, va) in a.iter() {
            for (x, y) in va.iter().zip(b[k].iter()) {
                assert!((x - y).abs() <= tol, "{}: {} != {}", k, x, y);
            }
        }
    }

    fn differs(a: &HashMap<String, Vec<f32>>, b: &HashMap<String, Vec<f32>>) -> bool {
        a.iter()
            .any(|(k, va)| va.iter().zip(b[k].iter()).any(|(x, y)| x != y))
    }

    /// Number of variables of `varmap` having an entry in `grads`.
    fn n_grads(varmap: &VarMap, grads: &GradStore) -> usize {
        varmap
            .all_vars()
            .iter()
            .filter(|v| grads.get(v.as_tensor()).is_some())
            .count()
    }

    #[test]
    fn test_gradient_isolation() -> Result<()> {
        let mut agent = Agent::build(config())?;
        let (_, info) = agent.compute_gradient(&batch(16, 7), 1)?;
        let networks = agent.networks();
        let critic = networks.critic_varmap();
        let target = networks.target_varmap();
        let policy = networks.policy_varmap();
        let temperature = networks.temperature().varmap();

        // The critic loss reaches the critic only.
        assert!(n_grads(critic, &info.q_grads) > 0);
        assert_eq!(n_grads(target, &info.q_grads), 0);
        assert_eq!(n_grads(policy, &info.q_grads), 0);
        assert_eq!(n_grads(temperature, &info.q_grads), 0);

        // The policy loss does not reach any critic.
        assert!(n_grads(policy, &info.policy_grads) > 0);
        assert_eq!(n_grads(critic, &info.policy_grads), 0);
        assert_eq!(n_grads(target, &info.policy_grads), 0);
        assert_eq!(n_grads(temperature, &info.policy_grads), 0);

        let alpha_grads = info.alpha_grads.as_ref().unwrap();
        assert_eq!(n_grads(temperature, alpha_grads), 1);
        assert_eq!(n_grads(critic, alpha_grads), 0);
        assert_eq!(n_grads(policy, alpha_grads), 0);
        assert_eq!(n_grads(target, alpha_grads), 0);
        Ok(())
    }

    #[test]
    fn test_target_starts_as_copy() -> Result<()> {
        let agent = Agent::build(config())?;
        let live = varmap_values(agent.networks().critic_varmap())?;
        let target = varmap_values(agent.networks().target_varmap())?;
        assert_close(&live, &target, 0.0);
        Ok(())
    }

    #[test]
    fn test_delay_update_cadence() -> Result<()> {
        let mut agent = Agent::build(config().delay_update(4))?;
        let batch = batch(32, 0);
        let mut delayed = vec![];

        for iteration in 1..=10 {
            let critic = varmap_values(agent.networks().critic_varmap())?;
            let target = varmap_values(agent.networks().target_varmap())?;
            let policy = varmap_values(agent.networks().policy_varmap())?;
            let alpha = agent.networks().temperature().alpha()?;

            let (_, info) = agent.compute_gradient(&batch, iteration)?;
            let applied = agent.apply_update(info)?;

            assert!(applied.critic);
            assert!(differs(
                &critic,
                &varmap_values(agent.networks().critic_varmap())?
            ));
            assert_eq!(applied.policy, applied.target);
            assert_eq!(applied.policy, applied.alpha);
            assert_eq!(
                applied.policy,
                differs(&policy, &varmap_values(agent.networks().policy_varmap())?)
            );
            assert_eq!(
                applied.target,
                differs(&target, &varmap_values(agent.networks().target_varmap())?)
            );
            assert_eq!(applied.alpha, agent.networks().temperature().alpha()? != alpha);
            if applied.policy {
                delayed.push(iteration);
            }
        }

        assert_eq!(delayed, vec![4, 8]);
        Ok(())
    }

    #[test]
    fn test_soft_update() -> Result<()> {
        let mut agent = Agent::build(config().delay_update(100))?;
        let (_, info) = agent.compute_gradient(&batch(16, 1), 1)?;
        agent.apply_update(info)?;

        let live = varmap_values(agent.networks().critic_varmap())?;
        let old = varmap_values(agent.networks().target_varmap())?;
        assert!(differs(&live, &old));

        // tau = 0.1
        agent.networks().soft_update_target(0.9)?;
        let new = varmap_values(agent.networks().target_varmap())?;
        let expected = old
            .iter()
            .map(|(k, v)| {
                let blended = v
                    .iter()
                    .zip(live[k].iter())
                    .map(|(t, l)| 0.9 * t + 0.1 * l)
                    .collect::<Vec<_>>();
                (k.clone(), blended)
            })
            .collect::<HashMap<_, _>>();
        assert_close(&new, &expected, 1e-6);
        assert_close(&live, &varmap_values(agent.networks().critic_varmap())?, 0.0);
        Ok(())
    }

    #[test]
    fn test_remote_update_equals_local_update() -> Result<()> {
        let mut a1 = Agent::build(config())?;
        let mut a2 = Agent::build(config())?;
        let batch = batch(32, 2);

        let r1 = a1.local_update(&batch, 2)?;
        let (r2, info) = a2.get_remote_update_info(&batch, 2)?;
        assert_eq!(info.iteration(), 2);
        a2.remote_update(info)?;

        assert_eq!(r1.get_scalar("loss_critic")?, r2.get_scalar("loss_critic")?);
        for (v1, v2) in [
            (a1.networks().critic_varmap(), a2.networks().critic_varmap()),
            (a1.networks().policy_varmap(), a2.networks().policy_varmap()),
            (a1.networks().target_varmap(), a2.networks().target_varmap()),
        ] {
            assert_close(&varmap_values(v1)?, &varmap_values(v2)?, 0.0);
        }
        Ok(())
    }

    #[test]
    fn test_record_keys() -> Result<()> {
        let mut agent = Agent::build(config())?;
        let (record, _) = agent.compute_gradient(&batch(8, 3), 1)?;
        for key in [
            "critic_avg_q",
            "critic_avg_std",
            "loss_critic",
            "loss_actor",
            "policy_mean",
            "policy_std",
            "entropy",
            "alpha",
            "loss_alpha",
            "alg_time_ms",
        ] {
            assert!(record.get_scalar(key)?.is_finite(), "{}", key);
        }
        assert!((record.get_scalar("alpha")? - 0.2).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_fixed_alpha_unbounded() -> Result<()> {
        let mut agent = Agent::build(config().auto_alpha(false).bound(false).delay_update(1))?;
        for iteration in 1..=3 {
            let (record, info) = agent.compute_gradient(&batch(16, iteration as u64), iteration)?;
            assert!(record.get_scalar("loss_alpha").is_err());
            assert!(record.get_scalar("loss_critic")?.is_finite());
            let applied = agent.apply_update(info)?;
            assert!(applied.policy && applied.target && !applied.alpha);
        }
        assert_eq!(agent.networks().temperature().alpha()?, 0.2);
        Ok(())
    }

    #[test]
    fn test_predict_in_range() -> Result<()> {
        let mut agent = Agent::build(config())?;
        match agent.predict(&[0.5, -0.5, 3.0])? {
            Action::Continuous(a) => {
                assert_eq!(a.len(), ACT_DIM);
                assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
            }
            act => panic!("unexpected action {:?}", act),
        }
        Ok(())
    }

    #[test]
    fn test_sample_action() -> Result<()> {
        let mut agent = Agent::build(config())?;
        let obs = Tensor::from_slice(&batch(5, 4).obs, (5, OBS_DIM), &Device::Cpu)?;
        let networks = agent.networks_mut();
        let dist = networks.predict_action(&obs)?;
        let (act, logp) = networks.sample_action(&dist)?;

        assert_eq!(act.dims(), &[5, ACT_DIM]);
        assert_eq!(logp.dims(), &[5]);
        let act = act.flatten_all()?.to_vec1::<f32>()?;
        assert!(act.iter().all(|v| v.abs() <= 1.0));
        assert!(logp.to_vec1::<f32>()?.iter().all(|v| v.is_finite()));
        Ok(())
    }

    #[test]
    fn test_use_min_branch() -> Result<()> {
        let mut agent = Agent::build(config())?;
        let b = batch(64, 5);
        let obs = Tensor::from_slice(&b.obs, (64, OBS_DIM), &Device::Cpu)?;
        let act = Tensor::from_slice(&b.act, (64, ACT_DIM), &Device::Cpu)?;
        let networks = agent.networks_mut();

        let (mean, std, sample) =
            networks.evaluate_state_action(&obs, &act, CriticRole::Live, true)?;
        let (mean, std, sample) = (
            mean.to_vec1::<f32>()?,
            std.to_vec1::<f32>()?,
            sample.to_vec1::<f32>()?,
        );
        assert!(mean.iter().zip(sample.iter()).all(|(m, s)| s <= m));

        let (mean2, std2, sample2) =
            networks.evaluate_state_action(&obs, &act, CriticRole::Target, false)?;
        let (mean2, std2, sample2) = (
            mean2.to_vec1::<f32>()?,
            std2.to_vec1::<f32>()?,
            sample2.to_vec1::<f32>()?,
        );
        assert_eq!(mean, mean2);
        assert_eq!(std, std2);
        for i in 0..64 {
            assert!((sample2[i] - mean2[i]).abs() <= 2.0 * std2[i] + 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_action_dim_mismatch() -> Result<()> {
        let mut agent = Agent::build(config())?;
        let mut b = batch(4, 6);
        b.act_dim = 1;
        b.act.truncate(4);
        let err = agent.compute_gradient(&b, 1).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<OcrlError>(),
            Some(OcrlError::DimensionMismatch { expected: 2, actual: 1, .. })
        ));
        Ok(())
    }
}
