//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{Device, Shape, Tensor, Var};
use candle_nn::VarMap;
use log::trace;
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<T>> {
    m.lock().map_err(|e| anyhow!("Failed to lock VarMap: {}", e))
}

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("track(tau = {})", tau);
    let dest = lock(dest.data())?;
    let src = lock(src.data())?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("Variable {} is not found in the source", k_dest))?;
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src)? + ((1.0 - tau) * t_dest)?)?;
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Returns a [`VarMap`] holding copies of the variables of `src`.
///
/// The returned variables own their storage, so updates of either map are not
/// visible in the other.
pub fn snapshot(src: &VarMap) -> Result<VarMap> {
    let dest = VarMap::new();
    {
        let src = lock(src.data())?;
        let mut data = lock(dest.data())?;
        for (k, v) in src.iter() {
            data.insert(k.clone(), Var::from_tensor(&v.as_tensor().copy()?)?);
        }
    }
    Ok(dest)
}

/// Returns detached tensors sharing the values of the variables.
///
/// Models built from them with [`candle_nn::VarBuilder::from_tensors`] do not
/// propagate gradients to the variables.
pub fn detached_tensors(src: &VarMap) -> Result<HashMap<String, Tensor>> {
    let src = lock(src.data())?;
    Ok(src
        .iter()
        .map(|(k, v)| (k.clone(), v.as_tensor().detach()))
        .collect())
}

/// Returns the values of the variables, keyed by name.
pub fn varmap_values(varmap: &VarMap) -> Result<HashMap<String, Vec<f32>>> {
    let data = lock(varmap.data())?;
    data.iter()
        .map(|(k, v)| Ok((k.clone(), v.as_tensor().flatten_all()?.to_vec1::<f32>()?)))
        .collect()
}

/// Overwrites the variables with values drawn from `rng`.
///
/// Weights and biases of a linear layer with `n` inputs are drawn from
/// `U(-1/sqrt(n), 1/sqrt(n))`. Variables are visited in the order of their
/// names so that a seed determines the result.
pub fn init_varmap(varmap: &VarMap, rng: &mut impl Rng) -> Result<()> {
    let data = lock(varmap.data())?;
    let mut names = data.keys().cloned().collect::<Vec<_>>();
    names.sort();

    for name in names.iter() {
        let var = &data[name];
        let dims = var.as_tensor().dims().to_vec();
        let fan_in = match dims.len() {
            2 => dims[1],
            _ => {
                let weight = name.replace("bias", "weight");
                match data.get(&weight).map(|w| w.as_tensor().dims().to_vec()) {
                    Some(d) if d.len() == 2 => d[1],
                    _ => dims.iter().product(),
                }
            }
        };
        let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
        let n = dims.iter().product::<usize>();
        let values = (0..n)
            .map(|_| rng.gen_range(-bound..bound))
            .collect::<Vec<f32>>();
        let t = Tensor::from_vec(values, dims.as_slice(), var.as_tensor().device())?;
        var.set(&t)?;
    }

    Ok(())
}

/// Samples a tensor from the standard normal distribution with `rng`.
pub fn randn<S: Into<Shape>>(shape: S, rng: &mut impl RngCore, device: &Device) -> Result<Tensor> {
    let shape = shape.into();
    let values = (0..shape.elem_count())
        .map(|_| rng.sample::<f32, _>(StandardNormal))
        .collect::<Vec<_>>();
    Ok(Tensor::from_vec(values, shape, device)?)
}

/// Returns the mean of a tensor as `f32`.
pub fn mean_scalar(t: &Tensor) -> Result<f32> {
    Ok(t.mean_all()?.to_scalar::<f32>()?)
}
