use candle_core::{bail, Result, Tensor};
use candle_nn::{Init, VarMap};
use log::debug;
use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Weight initialization of fully-connected layers
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinearInit {
    /// uniform on `±sqrt(6 / (fan_in + fan_out))`
    #[default]
    Xavier,
    Kaiming,
}

impl LinearInit {
    pub fn hint(&self, fan_in: usize, fan_out: usize) -> Init {
        match self {
            LinearInit::Xavier => {
                let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
                Init::Uniform {
                    lo: -bound,
                    up: bound,
                }
            }
            LinearInit::Kaiming => candle_nn::init::DEFAULT_KAIMING_NORMAL,
        }
    }
}

/// gain of ReLU-type nonlinearities
pub fn relu_gain() -> f64 {
    2_f64.sqrt()
}

/// A `rows x cols` matrix (row-major) whose rows or columns,
/// whichever are fewer, are orthonormal, then scaled by `gain`.
///
/// Take QR of a standard normal matrix and fix the signs with the
/// diagonal of R so the result is uniform over orthogonal matrices.
pub fn orthogonal<R>(rows: usize, cols: usize, gain: f64, rng: &mut R) -> Vec<f32>
where
    R: Rng + ?Sized,
{
    let (tall, short) = (rows.max(cols), rows.min(cols));

    let flat = DMatrix::<f64>::from_fn(tall, short, |_, _| rng.sample::<f64, _>(StandardNormal));
    let qr = flat.qr();
    let mut q = qr.q();
    let r = qr.r();

    for j in 0..short {
        if r[(j, j)] < 0. {
            q.column_mut(j).neg_mut();
        }
    }

    let q = if rows < cols { q.transpose() } else { q };

    let mut ret = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        for j in 0..cols {
            ret.push((gain * q[(i, j)]) as f32);
        }
    }
    ret
}

/// Delta-orthogonal kernel for a `(a, b, k, k)` convolution weight:
/// zero everywhere but the centre tap, which holds `orthogonal(a, b)`.
pub fn delta_orthogonal<R>(dims: &[usize], gain: f64, rng: &mut R) -> Result<Vec<f32>>
where
    R: Rng + ?Sized,
{
    let (aa, bb, kh, kw) = match *dims {
        [aa, bb, kh, kw] => (aa, bb, kh, kw),
        _ => bail!("delta-orthogonal needs a 4-d kernel, got {:?}", dims),
    };

    if kh != kw {
        bail!("delta-orthogonal needs a square kernel, got {} x {}", kh, kw);
    }

    let mid = kh / 2;
    let center = orthogonal(aa, bb, gain, rng);

    let mut ret = vec![0_f32; aa * bb * kh * kw];
    for a in 0..aa {
        for b in 0..bb {
            ret[((a * bb + b) * kh + mid) * kw + mid] = center[a * bb + b];
        }
    }
    Ok(ret)
}

fn under_prefix(name: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Re-initialize every variable under `prefix`:
///
/// * 4-d `*.weight` (convolution): delta-orthogonal with ReLU gain
/// * 2-d `*.weight` (linear): orthogonal
/// * `*.bias`: zero
///
/// Variables are visited in sorted order so the result only depends
/// on the state of `rng`.
pub fn init_orthogonal<R>(varmap: &VarMap, prefix: &str, rng: &mut R) -> Result<()>
where
    R: Rng + ?Sized,
{
    let data = varmap
        .data()
        .lock()
        .map_err(|e| candle_core::Error::Msg(format!("variable map lock: {}", e)))?;

    let mut names = data
        .keys()
        .filter(|name| under_prefix(name, prefix))
        .cloned()
        .collect::<Vec<_>>();
    names.sort();

    for name in names.iter() {
        let Some(var) = data.get(name) else {
            continue;
        };
        let dims = var.as_tensor().dims().to_vec();

        let values = if name.ends_with("bias") {
            vec![0_f32; dims.iter().product()]
        } else if name.ends_with("weight") {
            match dims.len() {
                4 => delta_orthogonal(&dims, relu_gain(), rng)?,
                2 => orthogonal(dims[0], dims[1], 1.0, rng),
                _ => continue,
            }
        } else {
            continue;
        };

        let value =
            Tensor::from_vec(values, dims.as_slice(), var.device())?.to_dtype(var.dtype())?;
        var.set(&value)?;
        debug!("orthogonal init: {} {:?}", name, dims);
    }
    Ok(())
}

/// Number of scalar parameters under `prefix`
pub fn num_parameters(varmap: &VarMap, prefix: &str) -> Result<usize> {
    let data = varmap
        .data()
        .lock()
        .map_err(|e| candle_core::Error::Msg(format!("variable map lock: {}", e)))?;

    Ok(data
        .iter()
        .filter(|(name, _)| under_prefix(name, prefix))
        .map(|(_, var)| var.as_tensor().elem_count())
        .sum())
}
