//! Temperature of DSAC.
use crate::opt::{Optimizer, OptimizerConfig};
use anyhow::Result;
use candle_core::{backprop::GradStore, DType, Device, Tensor};
use candle_nn::{init::Init, VarBuilder, VarMap};

/// The temperature `alpha` weighting the entropy bonus.
///
/// With automatic tuning the temperature is parameterized by a learned
/// `log_alpha`, initialized to `ln(alpha)`. Otherwise it is a constant.
pub struct Temperature {
    varmap: VarMap,
    log_alpha: Tensor,
    alpha: f64,
    opt: Option<Optimizer>,
}

impl Temperature {
    /// Constructs a constant temperature.
    pub fn fixed(alpha: f64, device: &Device) -> Result<Self> {
        Self::build(alpha, None, device)
    }

    /// Constructs a learned temperature.
    pub fn auto(alpha: f64, opt_config: &OptimizerConfig, device: &Device) -> Result<Self> {
        Self::build(alpha, Some(opt_config), device)
    }

    fn build(alpha: f64, opt_config: Option<&OptimizerConfig>, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let log_alpha = vb.get_with_hints(1, "log_alpha", Init::Const(alpha.ln()))?;
        let opt = match opt_config {
            Some(config) => Some(config.build(varmap.all_vars())?),
            None => None,
        };

        Ok(Self {
            varmap,
            log_alpha,
            alpha,
            opt,
        })
    }

    /// Returns `true` if the temperature is learned.
    pub fn is_auto(&self) -> bool {
        self.opt.is_some()
    }

    /// Returns the current temperature.
    pub fn alpha(&self) -> Result<f64> {
        match self.opt {
            Some(_) => Ok(self.log_alpha.exp()?.to_vec1::<f32>()?[0] as f64),
            None => Ok(self.alpha),
        }
    }

    /// Returns the loss `-log_alpha * mean(sg(logp) + target_entropy)`.
    pub fn loss(&self, logp: &Tensor, target_entropy: f64) -> Result<Tensor> {
        let m = (logp.detach() + target_entropy)?.mean_all()?;
        Ok((self.log_alpha.broadcast_mul(&m)? * -1.0)?.sum_all()?)
    }

    /// Returns the gradient of [`Temperature::loss`].
    pub fn gradient(&self, logp: &Tensor, target_entropy: f64) -> Result<(f32, GradStore)> {
        let loss = self.loss(logp, target_entropy)?;
        let grads = loss.backward()?;
        Ok((loss.to_scalar::<f32>()?, grads))
    }

    /// Applies a gradient. Does nothing for a constant temperature.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        if let Some(opt) = &mut self.opt {
            opt.step(grads)?;
        }
        Ok(())
    }

    /// Variables of the temperature.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }
}
