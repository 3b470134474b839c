use crate::candle_diag_gaussian::DiagGaussian;
use candle_core::{Result, Tensor};

pub trait EncoderModuleT {
    /// An encoder that spits out two results (latent mean, latent distribution)
    ///
    /// # Arguments
    /// * `x_nchw` - observation images (n x c x h x w)
    ///
    /// # Returns `(z_nk, q_z)`
    /// * `z_nk` - mean of the latent distribution (n x k)
    /// * `q_z` - diagonal Gaussian over the latent states
    fn forward_dist(&self, x_nchw: &Tensor) -> Result<(Tensor, DiagGaussian)>;

    /// number of observation channels
    fn dim_obs(&self) -> usize;

    fn dim_latent(&self) -> usize;
}

pub trait DecoderModuleT {
    /// A decoder that spits out a distribution over observations
    fn forward_dist(&self, z_nk: &Tensor) -> Result<DiagGaussian>;

    /// Mean reconstruction (n x c x h x w)
    fn forward_mean(&self, z_nk: &Tensor) -> Result<Tensor> {
        Ok(self.forward_dist(z_nk)?.loc().clone())
    }

    /// number of observation channels
    fn dim_obs(&self) -> usize;

    fn dim_latent(&self) -> usize;
}
