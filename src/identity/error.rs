use thiserror::Error;

#[derive(Error, Debug)]
pub enum SigningError {
    #[error("SigningError - RemoteCallFailure: {0}")]
    RemoteCallFailure(String),
    #[error("SigningError - InputIndexOutOfRange: {0}")]
    InputIndexOutOfRange(usize),
    #[error("SigningError - EncodeError: {0}")]
    EncodeError(#[from] crate::primitives::bitcoin::consensus::encode::Error),
}
