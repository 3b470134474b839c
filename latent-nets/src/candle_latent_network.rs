use crate::candle_decoder_image::{DecoderConfig, ImageDecoder};
use crate::candle_diag_gaussian::DiagGaussian;
use crate::candle_encoder_image::{EncoderConfig, ImageEncoder};
use crate::candle_model_traits::{DecoderModuleT, EncoderModuleT};
use candle_core::{bail, Result, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LatentConfig {
    pub observation_channels: usize,
    pub image_size: usize,
    pub latent_dim: usize,
    pub hidden_units: Vec<usize>,
    pub leaky_slope: f64,
    pub decoder_std: f64,
}

impl Default for LatentConfig {
    fn default() -> Self {
        Self {
            observation_channels: 3,
            image_size: 216,
            latent_dim: 256,
            hidden_units: vec![256, 256],
            leaky_slope: 0.2,
            decoder_std: 0.1_f64.sqrt(),
        }
    }
}

impl LatentConfig {
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            input_channels: self.observation_channels,
            image_size: self.image_size,
            latent_dim: self.latent_dim,
            hidden_units: self.hidden_units.clone(),
            leaky_slope: self.leaky_slope,
        }
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            latent_dim: self.latent_dim,
            output_channels: self.observation_channels,
            image_size: self.image_size,
            std: self.decoder_std,
            leaky_slope: self.leaky_slope,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.encoder_config().validate()?;
        self.decoder_config().validate()
    }
}

/// Image encoder and decoder sharing one latent space
pub struct LatentNetwork {
    pub encoder: ImageEncoder,
    pub decoder: ImageDecoder,
}

impl LatentNetwork {
    /// Will create `encoder.*` and `decoder.*` variables under `vs`
    ///
    /// The Gaussian heads start Xavier-initialized, but the convolutions
    /// keep candle's default init. Call [`LatentNetwork::init_weights`]
    /// on the same `VarMap` before use to get the delta-orthogonal /
    /// orthogonal initialization of the controller networks.
    pub fn new(config: &LatentConfig, vs: VarBuilder) -> Result<Self> {
        config.validate()?;

        let encoder = ImageEncoder::new(config.encoder_config(), vs.pp("encoder"))?;
        let decoder = ImageDecoder::new(config.decoder_config(), vs.pp("decoder"))?;

        info!(
            "latent network: {} channels, {} x {} images, {} latent dims",
            config.observation_channels, config.image_size, config.image_size, config.latent_dim
        );

        Self::build(encoder, decoder)
    }

    /// Put together an encoder and a decoder of matching shapes
    pub fn build(encoder: ImageEncoder, decoder: ImageDecoder) -> Result<Self> {
        if encoder.dim_latent() != decoder.dim_latent() {
            bail!(
                "encoder latent dim {} != decoder latent dim {}",
                encoder.dim_latent(),
                decoder.dim_latent()
            );
        }
        if encoder.dim_obs() != decoder.dim_obs()
            || encoder.config().image_size != decoder.config().image_size
        {
            bail!("encoder input and decoder output must be the same kind of image");
        }
        Ok(Self { encoder, decoder })
    }

    /// `(mean, q(z|x))`
    pub fn encode(&self, x_nchw: &Tensor) -> Result<(Tensor, DiagGaussian)> {
        self.encoder.forward_dist(x_nchw)
    }

    /// `p(x|z)`
    pub fn decode(&self, z_nk: &Tensor) -> Result<DiagGaussian> {
        self.decoder.forward_dist(z_nk)
    }

    /// Decode the posterior mean
    pub fn reconstruct(&self, x_nchw: &Tensor) -> Result<Tensor> {
        let (z_nk, _) = self.encode(x_nchw)?;
        self.decoder.forward_mean(&z_nk)
    }

    /// Re-initialize both halves with (delta-)orthogonal weights
    pub fn init_weights<R: Rng + ?Sized>(&self, varmap: &VarMap, rng: &mut R) -> Result<()> {
        self.encoder.init_weights(varmap, rng)?;
        self.decoder.init_weights(varmap, rng)
    }

    pub fn dim_latent(&self) -> usize {
        self.encoder.dim_latent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_default_config() {
        let config = LatentConfig::default();
        assert!(config.validate().is_ok());
        approx::assert_abs_diff_eq!(config.decoder_config().std, 0.1_f64.sqrt());
        assert_eq!(config.encoder_config().input_channels, 3);
        assert_eq!(config.decoder_config().output_channels, 3);
    }

    #[test]
    fn test_build_mismatch() -> Result<()> {
        let dev = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);

        let encoder = ImageEncoder::new(
            EncoderConfig {
                image_size: 8,
                latent_dim: 4,
                hidden_units: vec![],
                ..Default::default()
            },
            vb.pp("enc"),
        )?;
        let decoder = ImageDecoder::new(
            DecoderConfig {
                image_size: 8,
                latent_dim: 5,
                ..Default::default()
            },
            vb.pp("dec"),
        )?;
        assert!(LatentNetwork::build(encoder, decoder).is_err());
        Ok(())
    }
}
