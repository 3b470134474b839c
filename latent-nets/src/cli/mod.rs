pub mod init;
pub mod summary;

use crate::candle_config::LatentNetsConfig;
use crate::candle_latent_network::LatentNetwork;
use crate::candle_task_network::TaskNetwork;
use anyhow::Result;
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::path::PathBuf;

pub use init::InitArgs;
pub use summary::SummaryArgs;

#[derive(Parser)]
#[command(name = "latent-nets")]
#[command(about = "Latent-state encoder/decoder and task networks for robot control")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// verbosity
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// `RUST_LOG` value to set before starting the logger: `--verbose`
    /// asks for `info`, but an existing `RUST_LOG` wins
    pub fn log_filter(&self, rust_log: Option<&std::ffi::OsStr>) -> Option<&'static str> {
        match (self.verbose, rust_log) {
            (true, None) => Some("info"),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the networks and report shapes and parameter counts
    Summary(SummaryArgs),
    /// Build the networks, initialize them and save the weights
    Init(InitArgs),
}

/// Compute device selection
#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    Cuda,
    Metal,
}

impl ComputeDevice {
    /// Create a candle `Device` from this enum.
    pub fn to_device(&self, device_no: usize) -> Result<Device> {
        Ok(match self {
            ComputeDevice::Metal => Device::new_metal(device_no)?,
            ComputeDevice::Cuda => Device::new_cuda(device_no)?,
            ComputeDevice::Cpu => Device::Cpu,
        })
    }
}

pub(crate) fn read_config(path: &Option<PathBuf>) -> Result<LatentNetsConfig> {
    match path {
        Some(p) => LatentNetsConfig::from_json_file(p),
        None => {
            info!("no configuration file; using defaults");
            Ok(LatentNetsConfig::default())
        }
    }
}

/// Latent and task networks registered in one variable map:
/// `latent.encoder.*`, `latent.decoder.*` and `task.*`
pub struct Networks {
    pub device: Device,
    pub parameters: VarMap,
    pub latent: LatentNetwork,
    pub task: TaskNetwork,
}

impl Networks {
    pub fn build(config: &LatentNetsConfig, dev: &Device) -> Result<Self> {
        let parameters = VarMap::new();
        let param_builder = VarBuilder::from_varmap(&parameters, DType::F32, dev);

        let latent = LatentNetwork::new(&config.latent, param_builder.pp("latent"))?;
        let task = TaskNetwork::new(config.task.clone(), param_builder.pp("task"))?;

        Ok(Self {
            device: dev.clone(),
            parameters,
            latent,
            task,
        })
    }
}
