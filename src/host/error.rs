use thiserror::Error;

use crate::{
    address::error::AddressError, delegate::error::DelegateError,
    provider::error::ProviderError, repository::error::RepositoryError,
};

#[derive(Error, Debug)]
pub enum HostError {
    #[error("HostError - UnknownMessageType: {0}")]
    UnknownMessageType(String),
    #[error("HostError - InvalidPayload: {0}")]
    InvalidPayload(String),
    #[error("HostError - WalletNotInitialized: wallet not initialized")]
    WalletNotInitialized,
    #[error("HostError - DelegatorUnavailable: no delegator configured")]
    DelegatorUnavailable,
    #[error("HostError - Factory: {0}")]
    Factory(String),
    #[error("HostError - Repository: {0}")]
    Repository(#[from] RepositoryError),
    #[error("HostError - Provider: {0}")]
    Provider(#[from] ProviderError),
    #[error("HostError - Delegate: {0}")]
    Delegate(#[from] DelegateError),
    #[error("HostError - Address: {0}")]
    Address(#[from] AddressError),
    #[error("HostError - SerdeJson: {0}")]
    SerdeJson(#[from] serde_json::Error),
}
