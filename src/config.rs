use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    delegate::config::{DelegationConfig, DelegatorClientConfig},
    envelope::config::EnvelopeConfig,
    tracing::TracingConfig,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub envelope: EnvelopeConfig,
    #[serde(default)]
    pub delegation: DelegationConfig,
    #[serde(default)]
    pub delegator: DelegatorClientConfig,
}

impl HostConfig {
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_file = std::fs::read_to_string(path).context("Couldn't read config file")?;
        let config: HostConfig =
            serde_yaml::from_str(&config_file).context("Couldn't parse config file")?;
        Ok(config)
    }
}
