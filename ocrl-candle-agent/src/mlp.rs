//! Multilayer perceptron.
mod base;
mod config;
mod mlp2;
use anyhow::Result;
pub use base::Mlp;
use candle_core::{Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder};
pub use config::MlpConfig;
pub use mlp2::Mlp2;

/// Returns linear layers mapping `in_dim` through `units`.
fn create_linear_layers(
    prefix: &str,
    vs: &VarBuilder,
    in_dim: usize,
    units: &[usize],
) -> Result<Vec<Linear>> {
    let vs = vs.pp(prefix);
    let mut in_dims = vec![in_dim];
    in_dims.extend_from_slice(units);

    in_dims
        .iter()
        .zip(units.iter())
        .enumerate()
        .map(|(i, (&in_dim, &out_dim))| Ok(linear(in_dim, out_dim, vs.pp(format!("ln{}", i)))?))
        .collect()
}

/// Applies the layers with ReLU activation after each of them.
fn mlp_forward(xs: Tensor, layers: &[Linear]) -> Result<Tensor> {
    let mut xs = xs;
    for layer in layers.iter() {
        xs = layer.forward(&xs)?.relu()?;
    }
    Ok(xs)
}
