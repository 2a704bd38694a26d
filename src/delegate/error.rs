use thiserror::Error;

use crate::{
    address::error::AddressError,
    fees::FeeError,
    identity::error::SigningError,
    intent::error::IntentError,
    primitives::{bitcoin::*, Satoshis},
    provider::error::ProviderError,
};

#[derive(Error, Debug)]
pub enum DelegateError {
    #[error("DelegateError - Dust: destination amount {amount} does not exceed dust limit {dust}")]
    Dust { amount: Satoshis, dust: Satoshis },
    #[error("DelegateError - MissingExpiry: coin {0} has no batch expiry")]
    MissingExpiry(OutPoint),
    #[error("DelegateError - MissingDelegatorLeaf: no tapleaf of {0} includes the delegator key")]
    MissingDelegatorLeaf(OutPoint),
    #[error("DelegateError - InvalidDelegatorKey: {0}")]
    InvalidDelegatorKey(String),
    #[error("DelegateError - Rejected: {0}")]
    Rejected(String),
    #[error("DelegateError - CouldNotDecodeResponseBody: {0}")]
    CouldNotDecodeResponseBody(reqwest::Error),
    #[error("DelegateError - Reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("DelegateError - ReqwestMiddleware: {0}")]
    ReqwestMiddleware(#[from] reqwest_middleware::Error),
    #[error("DelegateError - Psbt: {0}")]
    Psbt(#[from] psbt::Error),
    #[error("DelegateError - Provider: {0}")]
    Provider(#[from] ProviderError),
    #[error("DelegateError - Fee: {0}")]
    Fee(#[from] FeeError),
    #[error("DelegateError - Intent: {0}")]
    Intent(#[from] IntentError),
    #[error("DelegateError - Signing: {0}")]
    Signing(#[from] SigningError),
    #[error("DelegateError - Address: {0}")]
    Address(#[from] AddressError),
    #[error("DelegateError - SerdeJson: {0}")]
    SerdeJson(#[from] serde_json::Error),
}
