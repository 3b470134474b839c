use crate::candle_latent_network::LatentConfig;
use crate::candle_task_network::TaskConfig;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything needed to build the latent and task networks
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LatentNetsConfig {
    pub latent: LatentConfig,
    pub task: TaskConfig,
    /// seed of the weight initialization
    pub seed: u64,
}

impl Default for LatentNetsConfig {
    fn default() -> Self {
        let latent = LatentConfig::default();
        let task = TaskConfig {
            input_dim: latent.latent_dim,
            ..Default::default()
        };
        Self {
            latent,
            task,
            seed: 42,
        }
    }
}

impl LatentNetsConfig {
    /// Read a JSON file; missing fields take their default values
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        info!("read configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> candle_core::Result<()> {
        self.latent.validate()?;
        self.task.validate()
    }
}
