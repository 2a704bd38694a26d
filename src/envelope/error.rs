use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("EnvelopeError - Timeout: no response to {0}")]
    Timeout(String),
    #[error("EnvelopeError - Remote: {0}")]
    Remote(String),
    #[error("EnvelopeError - DuplicateId: {0} is already pending")]
    DuplicateId(String),
    #[error("EnvelopeError - HostUnavailable")]
    HostUnavailable,
    #[error("EnvelopeError - SerdeJson: {0}")]
    SerdeJson(#[from] serde_json::Error),
}
