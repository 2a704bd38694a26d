use serde::{Deserialize, Serialize};

#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_request_timeout")]
    pub request_timeout: std::time::Duration,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(10)
}
