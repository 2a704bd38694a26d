use async_trait::async_trait;
use tokio::sync::RwLock;

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use super::{error::RepositoryError, WalletRepository};
use crate::{
    history::{sort_newest_first, TransactionKey, TransactionRecord},
    primitives::bitcoin::OutPoint,
    vtxo::*,
};

#[derive(Default)]
struct AddressEntries {
    vtxos: BTreeMap<OutPoint, ExtendedVirtualCoin>,
    utxos: BTreeMap<OutPoint, Coin>,
    transactions: BTreeMap<TransactionKey, TransactionRecord>,
}

#[derive(Clone, Default)]
pub struct InMemoryWalletRepository {
    entries: Arc<RwLock<HashMap<String, AddressEntries>>>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletRepository {
    async fn get_vtxos(&self, address: &str) -> Result<Vec<ExtendedVirtualCoin>, RepositoryError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(address)
            .map(|e| e.vtxos.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_vtxos(
        &self,
        address: &str,
        vtxos: &[ExtendedVirtualCoin],
    ) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(address.to_string()).or_default();
        for vtxo in vtxos {
            entry.vtxos.insert(vtxo.outpoint, vtxo.clone());
        }
        Ok(())
    }

    async fn clear_vtxos(&self, address: &str) -> Result<(), RepositoryError> {
        if let Some(entry) = self.entries.write().await.get_mut(address) {
            entry.vtxos.clear();
        }
        Ok(())
    }

    async fn get_utxos(&self, address: &str) -> Result<Vec<Coin>, RepositoryError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(address)
            .map(|e| e.utxos.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save_utxos(&self, address: &str, utxos: &[Coin]) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(address.to_string()).or_default();
        for utxo in utxos {
            entry.utxos.insert(utxo.outpoint, utxo.clone());
        }
        Ok(())
    }

    async fn clear_utxos(&self, address: &str) -> Result<(), RepositoryError> {
        if let Some(entry) = self.entries.write().await.get_mut(address) {
            entry.utxos.clear();
        }
        Ok(())
    }

    async fn get_transaction_history(
        &self,
        address: &str,
    ) -> Result<Vec<TransactionRecord>, RepositoryError> {
        let entries = self.entries.read().await;
        let mut records: Vec<_> = entries
            .get(address)
            .map(|e| e.transactions.values().cloned().collect())
            .unwrap_or_default();
        sort_newest_first(&mut records);
        Ok(records)
    }

    async fn save_transactions(
        &self,
        address: &str,
        transactions: &[TransactionRecord],
    ) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(address.to_string()).or_default();
        for record in transactions {
            entry.transactions.insert(record.key.clone(), record.clone());
        }
        Ok(())
    }

    async fn clear_transactions(&self, address: &str) -> Result<(), RepositoryError> {
        if let Some(entry) = self.entries.write().await.get_mut(address) {
            entry.transactions.clear();
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        self.entries.write().await.clear();
        Ok(())
    }
}
