use crate::candle_param_init::LinearInit;
use candle_core::{bail, Result, Tensor, D};
use candle_nn::{Activation, Conv2d, ConvTranspose2d, Linear, Module, VarBuilder};

/// build a stack of alternating `M` and `A` layers
#[derive(Clone, Debug)]
pub struct StackLayers<M>
where
    M: Module,
{
    module_layers: Vec<M>,
    activation_layers: Vec<Option<Activation>>,
}

impl<M> Module for StackLayers<M>
where
    M: Module,
{
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let mut x = input.clone();
        for (module, activation) in self.module_layers.iter().zip(self.activation_layers.iter()) {
            x = module.forward(&x)?;
            if let Some(activation) = activation {
                x = activation.forward(&x)?;
            }
        }
        Ok(x)
    }
}

impl<M> StackLayers<M>
where
    M: Module,
{
    pub fn new() -> Self {
        Self {
            module_layers: Vec::new(),
            activation_layers: Vec::new(),
        }
    }

    /// Appends a layer after all the current layers.
    pub fn push_with_act(&mut self, layer: M, activation: Activation) {
        self.module_layers.push(layer);
        self.activation_layers.push(Some(activation));
    }

    pub fn push(&mut self, layer: M) {
        self.module_layers.push(layer);
        self.activation_layers.push(None);
    }

    pub fn len(&self) -> usize {
        self.module_layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.module_layers.is_empty()
    }

    pub fn layers(&self) -> &[M] {
        &self.module_layers
    }
}

impl<M> Default for StackLayers<M>
where
    M: Module,
{
    fn default() -> Self {
        Self::new()
    }
}

//////////////////////////////////////////
// convolution or transposed convolution //
//////////////////////////////////////////

/// Lets a single `StackLayers` mix upsampling and same-size convolutions
#[derive(Clone, Debug)]
pub enum ConvLayer {
    Conv(Conv2d),
    Transpose(ConvTranspose2d),
}

impl Module for ConvLayer {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        match self {
            ConvLayer::Conv(conv) => conv.forward(x),
            ConvLayer::Transpose(convt) => convt.forward(x),
        }
    }
}

/// `kernel x kernel` convolution
pub fn conv_layer(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    vb: VarBuilder,
) -> Result<ConvLayer> {
    let config = candle_nn::Conv2dConfig {
        padding,
        stride,
        ..Default::default()
    };
    Ok(ConvLayer::Conv(candle_nn::conv2d(
        in_channels,
        out_channels,
        kernel,
        config,
        vb,
    )?))
}

/// `kernel x kernel` transposed convolution
pub fn conv_transpose_layer(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    output_padding: usize,
    vb: VarBuilder,
) -> Result<ConvLayer> {
    let config = candle_nn::ConvTranspose2dConfig {
        padding,
        output_padding,
        stride,
        ..Default::default()
    };
    Ok(ConvLayer::Transpose(candle_nn::conv_transpose2d(
        in_channels,
        out_channels,
        kernel,
        config,
        vb,
    )?))
}

/// A fully-connected layer `in_dim -> out_dim` with zero bias
pub fn init_linear(in_dim: usize, out_dim: usize, init: LinearInit, vb: VarBuilder) -> Result<Linear> {
    let ws = vb.get_with_hints((out_dim, in_dim), "weight", init.hint(in_dim, out_dim))?;
    let bs = vb.get_with_hints(out_dim, "bias", candle_nn::init::ZERO)?;
    Ok(Linear::new(ws, Some(bs)))
}

/// Multi-layer perceptron with variables:
///
/// * `fc.{j}.weight`, `fc.{j}.bias` where {j} is the layer index
///
/// Every hidden layer is followed by `hidden_act`; the output layer
/// is left linear.
///
/// # Arguments
/// * `input_dim` - input dimension
/// * `output_dim` - output dimension
/// * `hidden_units` - hidden layers, each with the dim
/// * `hidden_act` - activation after each hidden layer
/// * `init` - weight initialization
/// * `vb` - variable builder
pub fn linear_network(
    input_dim: usize,
    output_dim: usize,
    hidden_units: &[usize],
    hidden_act: Activation,
    init: LinearInit,
    vb: VarBuilder,
) -> Result<StackLayers<Linear>> {
    let mut fc = StackLayers::<Linear>::new();
    let mut prev_dim = input_dim;
    for (j, &next_dim) in hidden_units.iter().enumerate() {
        let _name = format!("fc.{}", j);
        fc.push_with_act(init_linear(prev_dim, next_dim, init, vb.pp(_name))?, hidden_act);
        prev_dim = next_dim;
    }
    let _name = format!("fc.{}", hidden_units.len());
    fc.push(init_linear(prev_dim, output_dim, init, vb.pp(_name))?);
    Ok(fc)
}

/// Concatenate a list of inputs along the last dimension
pub fn concat_inputs(xs: &[&Tensor]) -> Result<Tensor> {
    match xs {
        [] => bail!("no input tensors to concatenate"),
        [x] => Ok((*x).clone()),
        _ => Tensor::cat(xs, D::Minus1),
    }
}

/// Numerically stable `log(1 + exp(x))`
pub fn softplus(x: &Tensor) -> Result<Tensor> {
    let tail = (x.abs()?.neg()?.exp()? + 1.0)?.log()?;
    x.relu()? + tail
}
