use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
        }
    }
}

#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegatorClientConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_timeout")]
    pub timeout: std::time::Duration,
    #[serde(default = "default_number_of_retries")]
    pub number_of_retries: u32,
}

impl Default for DelegatorClientConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: default_timeout(),
            number_of_retries: default_number_of_retries(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(10)
}

fn default_number_of_retries() -> u32 {
    2
}
