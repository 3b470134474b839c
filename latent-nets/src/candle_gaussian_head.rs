use crate::candle_aux_layers::*;
use crate::candle_diag_gaussian::DiagGaussian;
use crate::candle_param_init::LinearInit;
use candle_core::{bail, Result, Tensor, D};
use candle_nn::{Activation, Linear, Module, VarBuilder};

const MIN_SCALE: f64 = 1e-5;

///////////////////////////////
// Gaussian head over an MLP //
///////////////////////////////

pub struct GaussianHead {
    input_dim: usize,
    output_dim: usize,
    fixed_std: Option<f64>,
    net: StackLayers<Linear>,
}

impl GaussianHead {
    /// Will create a Gaussian head with these variables:
    ///
    /// * `fc.{}.weight`, `fc.{}.bias` where {} is the layer index
    ///
    /// With `std = None` the network also predicts the scale: its
    /// output is split in halves, `(mean, pre_scale)`, and
    /// `scale = softplus(pre_scale) + 1e-5`.
    ///
    /// # Arguments
    /// * `input_dim` - input feature dimension
    /// * `output_dim` - dimension of the Gaussian
    /// * `hidden_units` - fully connected layers, each with the dim
    /// * `std` - fixed standard deviation, if any
    /// * `leaky_slope` - negative slope of hidden LeakyReLU
    /// * `vb` - variable builder
    pub fn new(
        input_dim: usize,
        output_dim: usize,
        hidden_units: &[usize],
        std: Option<f64>,
        leaky_slope: f64,
        vb: VarBuilder,
    ) -> Result<Self> {
        if let Some(s) = std {
            if s <= 0. {
                bail!("fixed standard deviation must be positive, got {}", s);
            }
        }

        let net_out = if std.is_some() {
            output_dim
        } else {
            2 * output_dim
        };

        let net = linear_network(
            input_dim,
            net_out,
            hidden_units,
            Activation::LeakyRelu(leaky_slope),
            LinearInit::Xavier,
            vb,
        )?;

        Ok(Self {
            input_dim,
            output_dim,
            fixed_std: std,
            net,
        })
    }

    pub fn forward(&self, x_nd: &Tensor) -> Result<DiagGaussian> {
        let h = self.net.forward(x_nd)?;

        match self.fixed_std {
            Some(std) => DiagGaussian::with_constant_scale(h, std),
            None => {
                let mean = h.narrow(D::Minus1, 0, self.output_dim)?;
                let pre_scale = h.narrow(D::Minus1, self.output_dim, self.output_dim)?;
                let scale = (softplus(&pre_scale)? + MIN_SCALE)?;
                DiagGaussian::new(mean, scale)
            }
        }
    }

    /// Concatenate the inputs along the last axis, then `forward`
    pub fn forward_cat(&self, xs: &[&Tensor]) -> Result<DiagGaussian> {
        self.forward(&concat_inputs(xs)?)
    }

    pub fn dim_input(&self) -> usize {
        self.input_dim
    }

    pub fn dim_output(&self) -> usize {
        self.output_dim
    }
}

//////////////////////////////////////
// Gaussian with constant parameters //
//////////////////////////////////////

/// N(0, std²) of shape `batch x output_dim`, whatever the input
#[derive(Clone, Copy, Debug)]
pub struct ConstantGaussian {
    output_dim: usize,
    std: f64,
}

impl ConstantGaussian {
    pub fn new(output_dim: usize, std: f64) -> Result<Self> {
        if std <= 0. {
            bail!("standard deviation must be positive, got {}", std);
        }
        Ok(Self { output_dim, std })
    }

    /// Only the batch size, device and dtype of `x` matter
    pub fn forward(&self, x: &Tensor) -> Result<DiagGaussian> {
        let nn = x.dim(0)?;
        let loc = Tensor::zeros((nn, self.output_dim), x.dtype(), x.device())?;
        DiagGaussian::with_constant_scale(loc, self.std)
    }

    pub fn dim_output(&self) -> usize {
        self.output_dim
    }
}
