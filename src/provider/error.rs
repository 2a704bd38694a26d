use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("ProviderError - CouldNotConnect: {0}")]
    CouldNotConnect(String),
    #[error("ProviderError - RemoteCallFailure: {0}")]
    RemoteCallFailure(String),
    #[error("ProviderError - SubscriptionClosed")]
    SubscriptionClosed,
    #[error("ProviderError - Reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("ProviderError - SerdeJson: {0}")]
    SerdeJson(#[from] serde_json::Error),
}
