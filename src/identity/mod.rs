pub mod error;

use async_trait::async_trait;

use crate::primitives::bitcoin::{Psbt, XOnlyPublicKey};
use error::SigningError;

/// Key holder able to sign on behalf of the wallet.
#[async_trait]
pub trait Identity: Send + Sync + 'static {
    /// Signs `psbt`, restricted to `input_indexes` when given.
    async fn sign(
        &self,
        psbt: Psbt,
        input_indexes: Option<&[usize]>,
    ) -> Result<Psbt, SigningError>;

    fn x_only_public_key(&self) -> XOnlyPublicKey;
}
