use super::{create_linear_layers, mlp_forward, MlpConfig};
use crate::model::SubModel2;
use anyhow::Result;
use candle_core::{Device, Module, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// Multilayer perceptron with ReLU activation function.
///
/// As a [`SubModel2`], the two inputs are concatenated along the last axis,
/// which is how a critic takes an observation and an action. A
/// distributional critic has `out_dim = 2`, the mean and the log standard
/// deviation of the return.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
    head: Linear,
}

fn build(vs: VarBuilder, config: MlpConfig) -> Result<Mlp> {
    let device = vs.device().clone();
    let layers = create_linear_layers("mlp", &vs, config.in_dim, &config.units)?;
    let in_dim = config.units.last().copied().unwrap_or(config.in_dim);
    let head = linear(in_dim, config.out_dim, vs.pp("mlp").pp("out"))?;

    Ok(Mlp {
        config,
        device,
        layers,
        head,
    })
}

impl Mlp {
    fn forward_(&self, xs: Tensor) -> Result<Tensor> {
        let xs = mlp_forward(xs, &self.layers)?;
        let xs = self.head.forward(&xs)?;

        match self.config.activation_out {
            false => Ok(xs),
            true => Ok(xs.relu()?),
        }
    }
}

impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Result<Tensor> {
        let input1 = input1.to_device(&self.device)?;
        let input2 = input2.to_device(&self.device)?;
        self.forward_(Tensor::cat(&[input1, input2], D::Minus1)?)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        build(vs, config)
    }
}
