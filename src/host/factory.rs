use async_trait::async_trait;

use std::sync::Arc;

use super::{error::HostError, messages::InitWalletPayload};
use crate::{
    delegate::DelegatorTransport,
    identity::Identity,
    provider::{Coordinator, Indexer, Settler},
    vtxo::VtxoScriptTemplate,
};

#[derive(Clone)]
pub struct Providers {
    pub indexer: Arc<dyn Indexer>,
    pub coordinator: Arc<dyn Coordinator>,
    pub delegator: Option<Arc<dyn DelegatorTransport>>,
}

pub struct SigningSetup {
    pub identity: Arc<dyn Identity>,
    pub settler: Arc<dyn Settler>,
}

pub struct WalletSetup {
    pub address: String,
    pub boarding_address: String,
    pub offchain_script: VtxoScriptTemplate,
    /// `None` for a watch-only wallet.
    pub signing: Option<SigningSetup>,
}

/// Builds remote clients and key material from an `INIT_WALLET` request.
#[async_trait]
pub trait WalletFactory: Send + Sync + 'static {
    async fn providers(&self, payload: &InitWalletPayload) -> Result<Providers, HostError>;

    async fn wallet(
        &self,
        payload: &InitWalletPayload,
        providers: &Providers,
    ) -> Result<WalletSetup, HostError>;
}
