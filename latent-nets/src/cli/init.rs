use super::{read_config, ComputeDevice, Networks};
use anyhow::Result;
use clap::Args;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// JSON configuration; defaults are used where missing
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Output weights (`.safetensors`)
    #[arg(long, short, required = true)]
    pub out: PathBuf,

    /// Override the seed of the configuration
    #[arg(long)]
    pub seed: Option<u64>,

    /// Candle device
    #[arg(long, value_enum, default_value = "cpu")]
    pub device: ComputeDevice,
}

/// Build the networks, orthogonally initialize the latent network
/// and write every variable to `out`
pub fn init_and_save(nets: &Networks, seed: u64, out: &Path) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    nets.latent.init_weights(&nets.parameters, &mut rng)?;
    nets.parameters.save(out)?;
    info!("saved {} variables to {}", nets.parameters.all_vars().len(), out.display());
    Ok(())
}

pub fn run(args: &InitArgs) -> Result<()> {
    let mut config = read_config(&args.config)?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let dev = args.device.to_device(0)?;
    info!("Using device: {:?}", dev);

    let nets = Networks::build(&config, &dev)?;
    init_and_save(&nets, config.seed, &args.out)
}
