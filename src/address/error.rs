use thiserror::Error;

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("AddressError - Bech32: {0}")]
    Bech32(#[from] crate::primitives::bitcoin::bech32::Error),
    #[error("AddressError - Secp256k1: {0}")]
    Secp256k1(#[from] crate::primitives::bitcoin::secp256k1::Error),
    #[error("AddressError - Onchain: {0}")]
    Onchain(#[from] crate::primitives::bitcoin::address::Error),
    #[error("AddressError - UnsupportedVariant: expected bech32m")]
    UnsupportedVariant,
    #[error("AddressError - InvalidLength: {0}")]
    InvalidLength(usize),
    #[error("AddressError - UnknownPrefix: {0}")]
    UnknownPrefix(String),
    #[error("AddressError - UnknownNetwork: {0}")]
    UnknownNetwork(String),
}
