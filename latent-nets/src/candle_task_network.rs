use crate::candle_aux_layers::*;
use crate::candle_param_init::LinearInit;
use candle_core::{bail, Result, Tensor, D};
use candle_nn::{Activation, Linear, Module, VarBuilder, VarMap};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TaskConfig {
    pub input_dim: usize,
    pub output_dim: usize,
    pub hidden_units: Vec<usize>,
    pub init: LinearInit,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            input_dim: 256,
            output_dim: 64,
            hidden_units: vec![256, 256],
            init: LinearInit::Xavier,
        }
    }
}

impl TaskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 || self.output_dim == 0 {
            bail!("task network dims must be positive: {:?}", self);
        }
        Ok(())
    }
}

/// Affine conditioning parameters
pub struct FilmParams {
    pub gamma: Tensor,
    pub bias: Tensor,
}

impl FilmParams {
    /// h * gamma + bias
    pub fn modulate(&self, h: &Tensor) -> Result<Tensor> {
        h.broadcast_mul(&self.gamma)?.broadcast_add(&self.bias)
    }
}

/// Maps shared latent features to `(gamma, bias)`
pub struct TaskNetwork {
    config: TaskConfig,
    prefix: String,
    net: StackLayers<Linear>,
}

impl TaskNetwork {
    /// Will create `fc.{}.weight`, `fc.{}.bias` under `vs`, an MLP
    /// with ReLU hidden layers and `2 * output_dim` outputs
    pub fn new(config: TaskConfig, vs: VarBuilder) -> Result<Self> {
        config.validate()?;

        let net = linear_network(
            config.input_dim,
            2 * config.output_dim,
            &config.hidden_units,
            Activation::Relu,
            config.init,
            vs.clone(),
        )?;

        Ok(Self {
            config,
            prefix: vs.prefix(),
            net,
        })
    }

    /// Build a network over the variables of an existing one. `source_vb`
    /// must point where the source network was built, so every
    /// `fc.{}.*` lookup returns the source's variable and nothing new is
    /// added to the map. A shape mismatch with the stored variables is an
    /// error.
    pub fn tied(config: TaskConfig, source_vb: VarBuilder) -> Result<Self> {
        Self::new(config, source_vb)
    }

    /// first half of the output is gamma, second half bias
    pub fn forward(&self, x_nd: &Tensor) -> Result<FilmParams> {
        let h = self.net.forward(x_nd)?;
        let kk = self.config.output_dim;
        Ok(FilmParams {
            gamma: h.narrow(D::Minus1, 0, kk)?,
            bias: h.narrow(D::Minus1, kk, kk)?,
        })
    }

    pub fn forward_cat(&self, xs: &[&Tensor]) -> Result<FilmParams> {
        self.forward(&concat_inputs(xs)?)
    }

    /// Share the layers of `source`; later updates to either network
    /// show up in both. Our own variables are dropped from `varmap`, so
    /// they are no longer counted, saved or optimized.
    pub fn tie_weights_from(&mut self, source: &TaskNetwork, varmap: &VarMap) -> Result<()> {
        let (ours, theirs) = (&self.config, &source.config);
        if ours.input_dim != theirs.input_dim
            || ours.output_dim != theirs.output_dim
            || ours.hidden_units != theirs.hidden_units
        {
            bail!("cannot tie task networks of different shapes");
        }
        if self.prefix == source.prefix {
            return Ok(());
        }

        let mut data = varmap
            .data()
            .lock()
            .map_err(|e| candle_core::Error::Msg(format!("variable map lock: {}", e)))?;
        for name in self.var_names() {
            data.remove(&name);
        }
        drop(data);

        self.net = source.net.clone();
        self.prefix = source.prefix.clone();
        Ok(())
    }

    /// Full names of the variables this network reads
    pub fn var_names(&self) -> Vec<String> {
        let full = |name: String| {
            if self.prefix.is_empty() {
                name
            } else {
                format!("{}.{}", self.prefix, name)
            }
        };
        (0..self.net.len())
            .flat_map(|j| [format!("fc.{}.weight", j), format!("fc.{}.bias", j)])
            .map(full)
            .collect()
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle_param_init::num_parameters;
    use candle_core::{DType, Device};

    fn small_config() -> TaskConfig {
        TaskConfig {
            input_dim: 6,
            output_dim: 4,
            hidden_units: vec![10],
            init: LinearInit::Xavier,
        }
    }

    #[test]
    fn test_gamma_bias_split() -> Result<()> {
        let dev = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);
        let task = TaskNetwork::new(small_config(), vb)?;

        let a = Tensor::randn(0f32, 1f32, (3, 2), &dev)?;
        let b = Tensor::randn(0f32, 1f32, (3, 4), &dev)?;
        let film = task.forward_cat(&[&a, &b])?;
        assert_eq!(film.gamma.dims(), &[3, 4]);
        assert_eq!(film.bias.dims(), &[3, 4]);

        let full = task.net.forward(&Tensor::cat(&[&a, &b], 1)?)?;
        let gamma = full.narrow(1, 0, 4)?;
        let diff = (gamma - &film.gamma)?.abs()?.sum_all()?.to_scalar::<f32>()?;
        assert_eq!(diff, 0.0);
        Ok(())
    }

    #[test]
    fn test_modulate() -> Result<()> {
        let dev = Device::Cpu;
        let film = FilmParams {
            gamma: Tensor::new(&[[2f32, 3.0]], &dev)?,
            bias: Tensor::new(&[[1f32, -1.0]], &dev)?,
        };
        let h = Tensor::new(&[[1f32, 1.0], [0.0, 2.0]], &dev)?;
        let y = film.modulate(&h)?.to_vec2::<f32>()?;
        assert_eq!(y, vec![vec![3.0, 2.0], vec![1.0, 5.0]]);
        Ok(())
    }

    #[test]
    fn test_tie_weights() -> Result<()> {
        let dev = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);

        let source = TaskNetwork::new(small_config(), vb.pp("source"))?;
        let mut target = TaskNetwork::new(small_config(), vb.pp("target"))?;
        let n_source = num_parameters(&varmap, "source")?;
        assert_eq!(num_parameters(&varmap, "target")?, n_source);

        let x = Tensor::randn(0f32, 1f32, (2, 6), &dev)?;
        target.tie_weights_from(&source, &varmap)?;

        // the target's own variables are gone
        assert_eq!(num_parameters(&varmap, "target")?, 0);
        assert_eq!(num_parameters(&varmap, "")?, n_source);
        assert_eq!(varmap.all_vars().len(), 4);
        assert_eq!(target.var_names(), source.var_names());

        // a change in the source parameters is seen by the target
        {
            let data = varmap.data().lock().unwrap();
            let var = &data["source.fc.1.bias"];
            var.set(&Tensor::ones(8, DType::F32, &dev)?)?;
        }

        let y_src = source.forward(&x)?;
        let y_tgt = target.forward(&x)?;
        let diff = (y_src.bias - y_tgt.bias)?.abs()?.sum_all()?.to_scalar::<f32>()?;
        assert_eq!(diff, 0.0);

        // tying again is a no-op
        target.tie_weights_from(&source, &varmap)?;
        assert_eq!(num_parameters(&varmap, "source")?, n_source);

        let mut other = TaskNetwork::new(
            TaskConfig {
                hidden_units: vec![3],
                ..small_config()
            },
            vb.pp("other"),
        )?;
        assert!(other.tie_weights_from(&source, &varmap).is_err());
        assert!(num_parameters(&varmap, "other")? > 0);
        Ok(())
    }

    #[test]
    fn test_tied_adds_no_variables() -> Result<()> {
        let dev = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &dev);

        let source = TaskNetwork::new(small_config(), vb.pp("source"))?;
        let n_vars = varmap.all_vars().len();
        let target = TaskNetwork::tied(small_config(), vb.pp("source"))?;
        assert_eq!(varmap.all_vars().len(), n_vars);
        assert_eq!(target.var_names(), source.var_names());

        {
            let data = varmap.data().lock().unwrap();
            data["source.fc.0.weight"].set(&Tensor::zeros((10, 6), DType::F32, &dev)?)?;
        }
        let x = Tensor::randn(0f32, 1f32, (3, 6), &dev)?;
        let (y_src, y_tgt) = (source.forward(&x)?, target.forward(&x)?);
        let diff = (y_src.gamma - y_tgt.gamma)?.abs()?.sum_all()?.to_scalar::<f32>()?;
        assert_eq!(diff, 0.0);

        // stored shapes must agree
        let wider = TaskConfig {
            hidden_units: vec![12],
            ..small_config()
        };
        assert!(TaskNetwork::tied(wider, vb.pp("source")).is_err());
        Ok(())
    }
}
