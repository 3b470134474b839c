use super::{read_config, ComputeDevice, Networks};
use crate::candle_param_init::num_parameters;
use anyhow::Result;
use candle_core::{DType, Tensor};
use clap::Args;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    /// JSON configuration; defaults are used where missing
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Number of dummy observations to push through
    #[arg(long, default_value_t = 2)]
    pub batch_size: usize,

    /// Candle device
    #[arg(long, value_enum, default_value = "cpu")]
    pub device: ComputeDevice,
}

/// Shapes of the intermediate results of one forward pass
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardSummary {
    pub latent_mean: Vec<usize>,
    pub reconstruction: Vec<usize>,
    pub gamma: Vec<usize>,
    pub bias: Vec<usize>,
    pub num_encoder_parameters: usize,
    pub num_decoder_parameters: usize,
    pub num_task_parameters: usize,
}

/// Push a batch of blank images through the latent network and the
/// resulting latent means (or zeros, if the task network expects a
/// different width) through the task network
pub fn summarize(nets: &Networks, batch_size: usize) -> Result<ForwardSummary> {
    let enc = nets.latent.encoder.config();
    let dev = &nets.device;

    let x = Tensor::zeros(
        (batch_size, enc.input_channels, enc.image_size, enc.image_size),
        DType::F32,
        dev,
    )?;

    let (z_mean, q_z) = nets.latent.encode(&x)?;
    let p_x = nets.latent.decode(&q_z.rsample()?)?;

    let task_input = if nets.task.config().input_dim == enc.latent_dim {
        z_mean.clone()
    } else {
        Tensor::zeros((batch_size, nets.task.config().input_dim), DType::F32, dev)?
    };
    let film = nets.task.forward(&task_input)?;

    Ok(ForwardSummary {
        latent_mean: z_mean.dims().to_vec(),
        reconstruction: p_x.loc().dims().to_vec(),
        gamma: film.gamma.dims().to_vec(),
        bias: film.bias.dims().to_vec(),
        num_encoder_parameters: num_parameters(&nets.parameters, "latent.encoder")?,
        num_decoder_parameters: num_parameters(&nets.parameters, "latent.decoder")?,
        num_task_parameters: num_parameters(&nets.parameters, "task")?,
    })
}

pub fn run(args: &SummaryArgs) -> Result<()> {
    let config = read_config(&args.config)?;
    let dev = args.device.to_device(0)?;
    info!("Using device: {:?}", dev);

    let nets = Networks::build(&config, &dev)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    nets.latent.init_weights(&nets.parameters, &mut rng)?;

    let summary = summarize(&nets, args.batch_size)?;

    info!("latent mean: {:?}", summary.latent_mean);
    info!("reconstruction: {:?}", summary.reconstruction);
    info!("gamma: {:?}, bias: {:?}", summary.gamma, summary.bias);

    println!("encoder parameters\t{}", summary.num_encoder_parameters);
    println!("decoder parameters\t{}", summary.num_decoder_parameters);
    println!("task parameters\t{}", summary.num_task_parameters);
    Ok(())
}
