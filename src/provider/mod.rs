mod entity;
pub mod error;
mod subscription;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

use crate::{primitives::bitcoin::ScriptBuf, vtxo::*};
pub use entity::*;
use error::ProviderError;
pub use subscription::Subscription;

pub type FundsStream = BoxStream<'static, Result<FundsEvent, ProviderError>>;
pub type ContractStream = BoxStream<'static, Result<ContractEvent, ProviderError>>;

#[async_trait]
pub trait Indexer: Send + Sync + 'static {
    async fn get_vtxos(&self, scripts: &[ScriptBuf]) -> Result<Vec<VirtualCoin>, ProviderError>;

    async fn get_boarding_utxos(&self, address: &str) -> Result<Vec<Coin>, ProviderError>;

    async fn subscribe_for_scripts(
        &self,
        scripts: Vec<ScriptBuf>,
    ) -> Result<FundsStream, ProviderError>;

    async fn subscribe_for_contracts(
        &self,
        scripts: Vec<ScriptBuf>,
    ) -> Result<ContractStream, ProviderError>;
}

#[async_trait]
pub trait Coordinator: Send + Sync + 'static {
    async fn get_info(&self) -> Result<CoordinatorInfo, ProviderError>;

    /// Completes off-chain transactions that were submitted but never finalized.
    async fn finalize_pending_txs(
        &self,
        vtxos: &[ExtendedVirtualCoin],
    ) -> Result<PendingTxRecovery, ProviderError>;
}

/// Drives the settlement round and payment protocols on behalf of a signing wallet.
#[async_trait]
pub trait Settler: Send + Sync + 'static {
    async fn send_bitcoin(&self, params: SendBitcoinParams) -> Result<String, ProviderError>;

    /// Joins the next batch. Round events are forwarded on `events` as they happen.
    async fn settle(
        &self,
        params: Option<SettleParams>,
        events: mpsc::UnboundedSender<serde_json::Value>,
    ) -> Result<String, ProviderError>;
}
