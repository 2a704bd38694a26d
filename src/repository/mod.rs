pub mod error;
mod memory;

use async_trait::async_trait;

use crate::{history::TransactionRecord, vtxo::*};
use error::RepositoryError;
pub use memory::InMemoryWalletRepository;

/// Durable store of coins and history, keyed by address.
///
/// Saves upsert: coins are keyed by outpoint and history entries by their
/// transaction key, so re-saving the same set leaves the store unchanged.
#[async_trait]
pub trait WalletRepository: Send + Sync + 'static {
    async fn get_vtxos(&self, address: &str) -> Result<Vec<ExtendedVirtualCoin>, RepositoryError>;
    async fn save_vtxos(
        &self,
        address: &str,
        vtxos: &[ExtendedVirtualCoin],
    ) -> Result<(), RepositoryError>;
    async fn clear_vtxos(&self, address: &str) -> Result<(), RepositoryError>;

    async fn get_utxos(&self, address: &str) -> Result<Vec<Coin>, RepositoryError>;
    async fn save_utxos(&self, address: &str, utxos: &[Coin]) -> Result<(), RepositoryError>;
    async fn clear_utxos(&self, address: &str) -> Result<(), RepositoryError>;

    async fn get_transaction_history(
        &self,
        address: &str,
    ) -> Result<Vec<TransactionRecord>, RepositoryError>;
    async fn save_transactions(
        &self,
        address: &str,
        transactions: &[TransactionRecord],
    ) -> Result<(), RepositoryError>;
    async fn clear_transactions(&self, address: &str) -> Result<(), RepositoryError>;

    async fn clear(&self) -> Result<(), RepositoryError>;
}
