use crate::candle_aux_layers::*;
use crate::candle_diag_gaussian::DiagGaussian;
use crate::candle_encoder_image::DOWNSAMPLE;
use crate::candle_model_traits::DecoderModuleT;
use crate::candle_param_init::init_orthogonal;
use candle_core::{bail, Result, Tensor};
use candle_nn::{Activation, Module, VarBuilder, VarMap};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DecoderConfig {
    pub latent_dim: usize,
    pub output_channels: usize,
    pub image_size: usize,
    /// standard deviation of the observation model
    pub std: f64,
    pub leaky_slope: f64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            latent_dim: 256,
            output_channels: 3,
            image_size: 216,
            std: 1.0,
            leaky_slope: 0.2,
        }
    }
}

impl DecoderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_channels == 0 || self.latent_dim == 0 {
            bail!("output channels and latent dim must be positive: {:?}", self);
        }
        if self.image_size == 0 || self.image_size % DOWNSAMPLE != 0 {
            bail!(
                "image size must be a positive multiple of {}, got {}",
                DOWNSAMPLE,
                self.image_size
            );
        }
        if self.std <= 0. {
            bail!("observation std must be positive, got {}", self.std);
        }
        Ok(())
    }
}

///////////////////////////////////////////
// Transposed-convolution image decoder //
///////////////////////////////////////////

pub struct ImageDecoder {
    config: DecoderConfig,
    prefix: String,
    convs: StackLayers<ConvLayer>,
    output: ConvLayer,
}

impl DecoderModuleT for ImageDecoder {
    /// N(tanh(net(z)), std²) over `n x c x s x s` images
    fn forward_dist(&self, z_nk: &Tensor) -> Result<DiagGaussian> {
        let (nn, kk) = z_nk.dims2()?;
        if kk != self.config.latent_dim {
            bail!(
                "expected latent dim {}, got {:?}",
                self.config.latent_dim,
                z_nk.dims()
            );
        }

        let h = self.convs.forward(&z_nk.reshape((nn, kk, 1, 1))?)?;
        let recon = self.output.forward(&h)?.tanh()?;

        DiagGaussian::with_constant_scale(recon, self.config.std)
    }

    fn dim_obs(&self) -> usize {
        self.config.output_channels
    }

    fn dim_latent(&self) -> usize {
        self.config.latent_dim
    }
}

impl ImageDecoder {
    /// Will create a new image decoder with these variables:
    ///
    /// * `convt.{}.weight`, `convt.{}.bias` (0..6) transposed convolutions
    /// * `conv.{}.weight`, `conv.{}.bias` (0..3) convolutions
    ///
    /// A `k x 1 x 1` latent is blown up to `s/8 x s/8`, then doubled
    /// three times to `s x s`. Every layer but the last is followed by
    /// LeakyReLU; the last one by tanh.
    ///
    /// # Arguments
    /// * `config` - decoder configuration
    /// * `vs` - variable builder
    pub fn new(config: DecoderConfig, vs: VarBuilder) -> Result<Self> {
        config.validate()?;

        let act = Activation::LeakyRelu(config.leaky_slope);
        let base = config.image_size / DOWNSAMPLE;

        // (in, out, kernel, stride, padding, output padding)
        let transposed = [
            (config.latent_dim, 64, base, 1, 0, 0),
            (64, 64, 3, 1, 1, 0),
            (64, 64, 3, 2, 1, 1),
            (64, 32, 3, 1, 1, 0),
            (32, 32, 3, 2, 1, 1),
            (32, 32, 5, 2, 2, 1),
        ];

        let mut convs = StackLayers::<ConvLayer>::new();

        for (j, &(c_in, c_out, kernel, stride, padding, out_pad)) in transposed.iter().enumerate() {
            let _name = format!("convt.{}", j);
            convs.push_with_act(
                conv_transpose_layer(c_in, c_out, kernel, stride, padding, out_pad, vs.pp(_name))?,
                act,
            );
        }

        convs.push_with_act(conv_layer(32, 64, 3, 1, 1, vs.pp("conv.0"))?, act);
        convs.push_with_act(conv_layer(64, 64, 3, 1, 1, vs.pp("conv.1"))?, act);

        let output = conv_layer(64, config.output_channels, 3, 1, 1, vs.pp("conv.2"))?;

        Ok(Self {
            prefix: vs.prefix(),
            config,
            convs,
            output,
        })
    }

    /// Delta-orthogonal (transposed) convolutions
    pub fn init_weights<R: Rng + ?Sized>(&self, varmap: &VarMap, rng: &mut R) -> Result<()> {
        init_orthogonal(varmap, &self.prefix, rng)
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }
}
