use crate::candle_aux_layers::*;
use crate::candle_diag_gaussian::DiagGaussian;
use crate::candle_gaussian_head::GaussianHead;
use crate::candle_model_traits::EncoderModuleT;
use crate::candle_param_init::init_orthogonal;
use candle_core::{bail, Result, Tensor};
use candle_nn::{Activation, Module, VarBuilder, VarMap};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// number of channels coming out of the convolution trunk
const TRUNK_CHANNELS: usize = 64;

/// total down-sampling factor of the convolution trunk
pub const DOWNSAMPLE: usize = 8;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EncoderConfig {
    pub input_channels: usize,
    pub image_size: usize,
    pub latent_dim: usize,
    pub hidden_units: Vec<usize>,
    pub leaky_slope: f64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            input_channels: 3,
            image_size: 216,
            latent_dim: 256,
            hidden_units: vec![256, 256],
            leaky_slope: 0.2,
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_channels == 0 || self.latent_dim == 0 {
            bail!("input channels and latent dim must be positive: {:?}", self);
        }
        if self.image_size == 0 || self.image_size % DOWNSAMPLE != 0 {
            bail!(
                "image size must be a positive multiple of {}, got {}",
                DOWNSAMPLE,
                self.image_size
            );
        }
        Ok(())
    }

    /// side length of the convolution trunk's output
    pub fn trunk_size(&self) -> usize {
        self.image_size / DOWNSAMPLE
    }

    /// dimension of the flattened convolution trunk's output
    pub fn feature_dim(&self) -> usize {
        TRUNK_CHANNELS * self.trunk_size() * self.trunk_size()
    }
}

/////////////////////////////////////////
// Convolutional encoder to a Gaussian //
/////////////////////////////////////////

pub struct ImageEncoder {
    config: EncoderConfig,
    prefix: String,
    convs: StackLayers<ConvLayer>,
    gaussian: GaussianHead,
}

impl EncoderModuleT for ImageEncoder {
    fn forward_dist(&self, x_nchw: &Tensor) -> Result<(Tensor, DiagGaussian)> {
        let h_nd = self.features(x_nchw)?;
        let q_z = self.gaussian.forward(&h_nd)?;
        Ok((q_z.loc().clone(), q_z))
    }

    fn dim_obs(&self) -> usize {
        self.config.input_channels
    }

    fn dim_latent(&self) -> usize {
        self.config.latent_dim
    }
}

impl ImageEncoder {
    /// Will create a new image encoder with these variables:
    ///
    /// * `conv.{}.weight`, `conv.{}.bias` where {} is the layer index
    /// * `gaussian.fc.{}.weight`, `gaussian.fc.{}.bias`
    ///
    /// Six convolutions, each followed by LeakyReLU, bring a
    /// `c x s x s` image to `64 x s/8 x s/8`; the flattened result
    /// feeds a Gaussian head with a learned scale.
    ///
    /// # Arguments
    /// * `config` - encoder configuration
    /// * `vs` - variable builder
    pub fn new(config: EncoderConfig, vs: VarBuilder) -> Result<Self> {
        config.validate()?;

        let act = Activation::LeakyRelu(config.leaky_slope);

        // (in, out, kernel, stride, padding)
        let layers = [
            (config.input_channels, 32, 5, 2, 2),
            (32, 32, 3, 2, 1),
            (32, 64, 3, 1, 1),
            (64, 64, 3, 2, 1),
            (64, 64, 3, 1, 1),
            (64, TRUNK_CHANNELS, 1, 1, 0),
        ];

        let mut convs = StackLayers::<ConvLayer>::new();
        for (j, &(c_in, c_out, kernel, stride, padding)) in layers.iter().enumerate() {
            let _name = format!("conv.{}", j);
            convs.push_with_act(
                conv_layer(c_in, c_out, kernel, stride, padding, vs.pp(_name))?,
                act,
            );
        }

        let gaussian = GaussianHead::new(
            config.feature_dim(),
            config.latent_dim,
            &config.hidden_units,
            None,
            config.leaky_slope,
            vs.pp("gaussian"),
        )?;

        Ok(Self {
            prefix: vs.prefix(),
            config,
            convs,
            gaussian,
        })
    }

    /// Flattened convolution trunk output (n x feature_dim)
    pub fn features(&self, x_nchw: &Tensor) -> Result<Tensor> {
        let (_, cc, hh, ww) = x_nchw.dims4()?;
        let ss = self.config.image_size;

        if cc != self.config.input_channels || hh != ss || ww != ss {
            bail!(
                "expected images of {} x {} x {}, got {:?}",
                self.config.input_channels,
                ss,
                ss,
                x_nchw.dims()
            );
        }

        self.convs.forward(x_nchw)?.flatten_from(1)
    }

    /// Delta-orthogonal convolutions, orthogonal linear layers
    pub fn init_weights<R: Rng + ?Sized>(&self, varmap: &VarMap, rng: &mut R) -> Result<()> {
        init_orthogonal(varmap, &self.prefix, rng)
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn feature_dim(&self) -> usize {
        self.config.feature_dim()
    }
}
