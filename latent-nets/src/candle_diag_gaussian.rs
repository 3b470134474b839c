use candle_core::{bail, DType, Device, Result, Shape, Tensor};

/// Diagonal Gaussian N(μ, σ²) with element-wise location and scale
///
/// All the element-wise quantities (`log_prob`, `entropy`,
/// `kl_divergence`) keep the shape of `loc`; reduce them where they
/// are consumed.
#[derive(Clone, Debug)]
pub struct DiagGaussian {
    loc: Tensor,
    scale: Tensor,
}

impl DiagGaussian {
    /// * `loc` - mean μ
    /// * `scale` - standard deviation σ > 0, same shape as `loc`
    pub fn new(loc: Tensor, scale: Tensor) -> Result<Self> {
        if loc.dims() != scale.dims() {
            bail!(
                "loc {:?} and scale {:?} must have the same shape",
                loc.dims(),
                scale.dims()
            );
        }
        Ok(Self { loc, scale })
    }

    /// N(0, 1) of the given shape
    pub fn standard<S: Into<Shape>>(shape: S, dtype: DType, device: &Device) -> Result<Self> {
        let shape = shape.into();
        let loc = Tensor::zeros(shape.clone(), dtype, device)?;
        let scale = Tensor::ones(shape, dtype, device)?;
        Ok(Self { loc, scale })
    }

    /// N(loc, std²) with the same `std` for every element
    pub fn with_constant_scale(loc: Tensor, std: f64) -> Result<Self> {
        if std <= 0. {
            bail!("standard deviation must be positive, got {}", std);
        }
        let scale = (loc.ones_like()? * std)?;
        Ok(Self { loc, scale })
    }

    pub fn loc(&self) -> &Tensor {
        &self.loc
    }

    pub fn scale(&self) -> &Tensor {
        &self.scale
    }

    pub fn variance(&self) -> Result<Tensor> {
        self.scale.sqr()
    }

    pub fn dims(&self) -> &[usize] {
        self.loc.dims()
    }

    ///
    /// z = μ + σ * ε
    /// where ε ~ N(0, 1)
    ///
    /// Gradients flow back to μ and σ.
    pub fn rsample(&self) -> Result<Tensor> {
        let eps = Tensor::randn_like(&self.loc, 0., 1.)?;
        self.loc.add(&self.scale.mul(&eps)?)
    }

    /// Same as `rsample` but cut off from the graph
    pub fn sample(&self) -> Result<Tensor> {
        Ok(self.rsample()?.detach())
    }

    /// log N(x; μ, σ²) = -0.5 * (x-μ)²/σ² - ln(σ) - 0.5 * ln(2π)
    pub fn log_prob(&self, x: &Tensor) -> Result<Tensor> {
        let half_ln_2pi = 0.5 * (2.0 * std::f64::consts::PI).ln();
        let z = x.broadcast_sub(&self.loc)?.broadcast_div(&self.scale)?;
        let sq = (z.sqr()? * (-0.5))?;
        sq.broadcast_sub(&self.scale.log()?)? - half_ln_2pi
    }

    /// H = 0.5 + 0.5 * ln(2π) + ln(σ)
    pub fn entropy(&self) -> Result<Tensor> {
        let c = 0.5 + 0.5 * (2.0 * std::f64::consts::PI).ln();
        self.scale.log()? + c
    }

    /// KL(self || other)
    ///
    /// ln(σq/σp) + (σp² + (μp - μq)²) / (2σq²) - 0.5
    pub fn kl_divergence(&self, other: &DiagGaussian) -> Result<Tensor> {
        let log_ratio = other.scale.log()?.broadcast_sub(&self.scale.log()?)?;
        let num = self
            .variance()?
            .broadcast_add(&self.loc.broadcast_sub(&other.loc)?.sqr()?)?;
        let den = (other.variance()? * 2.0)?;
        (log_ratio + num.broadcast_div(&den)?)? - 0.5
    }
}
