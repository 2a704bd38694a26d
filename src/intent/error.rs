use thiserror::Error;

use crate::{
    identity::error::SigningError,
    primitives::bitcoin::{psbt, OutPoint},
};

#[derive(Error, Debug)]
pub enum IntentError {
    #[error("IntentError - NoInputs: an intent needs at least one input")]
    NoInputs,
    #[error("IntentError - OutputIndexOutOfRange: {0}")]
    OutputIndexOutOfRange(usize),
    #[error("IntentError - MissingIntentLeaf: {0}")]
    MissingIntentLeaf(OutPoint),
    #[error("IntentError - ProofMismatch: signer altered the proof transaction")]
    ProofMismatch,
    #[error("IntentError - Psbt: {0}")]
    Psbt(#[from] psbt::Error),
    #[error("IntentError - Signing: {0}")]
    Signing(#[from] SigningError),
    #[error("IntentError - SerdeJson: {0}")]
    SerdeJson(#[from] serde_json::Error),
}
