//! TD targets and critic losses of DSAC.
use anyhow::Result;
use candle_core::Tensor;

/// TD targets of the critic.
pub struct TargetQ {
    /// `r + (1 - done) * gamma * (q_next - alpha * logp_next)`.
    pub mean: Tensor,

    /// `q + clip(target_sample - q, -td_bound, td_bound)`, where
    /// `target_sample` is the target computed with a sampled next return.
    pub bound: Tensor,
}

/// Computes the TD targets. The returned tensors are detached.
///
/// All inputs have shape `(batch_size,)`; `done` holds `0.0` or `1.0`.
#[allow(clippy::too_many_arguments)]
pub fn compute_target_q(
    reward: &Tensor,
    done: &Tensor,
    q: &Tensor,
    q_next: &Tensor,
    q_next_sample: &Tensor,
    logp_next: &Tensor,
    gamma: f64,
    alpha: f64,
    td_bound: f64,
) -> Result<TargetQ> {
    let discount = ((1.0 - done)? * gamma)?;
    let entropy_bonus = (logp_next * alpha)?;
    let mean = (reward + (&discount * (q_next - &entropy_bonus)?)?)?;
    let sample = (reward + (&discount * (q_next_sample - &entropy_bonus)?)?)?;
    let difference = (sample - q)?.clamp(-td_bound, td_bound)?;
    let bound = (q + difference)?;

    Ok(TargetQ {
        mean: mean.detach(),
        bound: bound.detach(),
    })
}

/// Critic loss with the bounded TD error.
///
/// `mean((q - target)^2 / (2 sg(std)^2) + (sg(q) - target_bound)^2 / (2 std^2) + log(std))`
///
/// The first term trains the mean with a fixed variance, the second the
/// variance with the bounded target.
pub fn bounded_critic_loss(q: &Tensor, q_std: &Tensor, target: &TargetQ) -> Result<Tensor> {
    let var_fixed = (q_std.detach().sqr()? * 2.0)?;
    let var = (q_std.sqr()? * 2.0)?;
    let term_mean = ((q - &target.mean)?.sqr()? / var_fixed)?;
    let term_std = ((q.detach() - &target.bound)?.sqr()? / var)?;
    let loss = ((term_mean + term_std)? + q_std.log()?)?;
    Ok(loss.mean_all()?)
}

/// Negative log-likelihood of `target` under `N(q, q_std)`, averaged over the batch.
pub fn gaussian_nll(q: &Tensor, q_std: &Tensor, target: &Tensor) -> Result<Tensor> {
    let z = ((target - q)? / q_std)?;
    let half_log_2pi = 0.5 * (2.0 * std::f64::consts::PI).ln();
    let nll = (((z.sqr()? * 0.5)? + q_std.log()?)? + half_log_2pi)?;
    Ok(nll.mean_all()?)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::randn;
    use candle_core::Device;
    use rand::{rngs::StdRng, SeedableRng};

    fn t(v: &[f32]) -> Tensor {
        Tensor::from_slice(v, (v.len(),), &Device::Cpu).unwrap()
    }

    fn to_vec(t: &Tensor) -> Vec<f32> {
        t.to_vec1::<f32>().unwrap()
    }

    #[test]
    fn test_target_q() -> Result<()> {
        let target = compute_target_q(
            &t(&[1.0, 1.0]),
            &t(&[0.0, 1.0]),
            &t(&[0.0, 0.0]),
            &t(&[2.0, 2.0]),
            &t(&[4.0, 4.0]),
            &t(&[0.5, 0.5]),
            0.5,
            0.2,
            100.0,
        )?;
        // 1 + 0.5 * (2 - 0.1), done cuts the bootstrap.
        let mean = to_vec(&target.mean);
        assert!((mean[0] - 1.95).abs() < 1e-6);
        assert!((mean[1] - 1.0).abs() < 1e-6);
        let bound = to_vec(&target.bound);
        assert!((bound[0] - 2.95).abs() < 1e-6);
        assert!((bound[1] - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_target_bound_property() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(7);
        let dev = Device::Cpu;
        let n = 256;
        let b = 1.5;
        let q = (randn(n, &mut rng, &dev)? * 5.0)?;
        let q_next = randn(n, &mut rng, &dev)?;
        let q_next_sample = (randn(n, &mut rng, &dev)? * 20.0)?;
        let logp = randn(n, &mut rng, &dev)?;
        let reward = (randn(n, &mut rng, &dev)? * 3.0)?;
        let done = Tensor::zeros(n, candle_core::DType::F32, &dev)?;

        let target =
            compute_target_q(&reward, &done, &q, &q_next, &q_next_sample, &logp, 0.99, 0.2, b)?;
        let diff = to_vec(&(&target.bound - &q)?.abs()?);
        assert!(diff.iter().all(|d| *d <= b as f32 + 1e-5));
        assert!(diff.iter().any(|d| (*d - b as f32).abs() < 1e-5));
        Ok(())
    }

    #[test]
    fn test_bounded_loss_value() -> Result<()> {
        let q = t(&[1.0]);
        let q_std = t(&[2.0]);
        let target = TargetQ {
            mean: t(&[3.0]),
            bound: t(&[5.0]),
        };
        // 4 / 8 + 16 / 8 + ln 2
        let loss = bounded_critic_loss(&q, &q_std, &target)?.to_scalar::<f32>()?;
        assert!((loss - (2.5 + 2f32.ln())).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn test_gaussian_nll_value() -> Result<()> {
        let loss = gaussian_nll(&t(&[0.0, 0.0]), &t(&[1.0, 1.0]), &t(&[0.0, 2.0]))?
            .to_scalar::<f32>()?;
        let half_log_2pi = 0.5 * (2.0 * std::f32::consts::PI).ln();
        assert!((loss - (half_log_2pi + 1.0)).abs() < 1e-5);
        Ok(())
    }
}
