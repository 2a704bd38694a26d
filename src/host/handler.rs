use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::instrument;

use std::sync::Arc;

use super::{error::HostError, factory::*, messages::DelegatePayload};
use crate::{
    address::ArkAddress,
    balance::WalletBalance,
    delegate::{DelegateOutcome, DelegationEngine},
    history::TransactionRecord,
    provider::*,
    repository::WalletRepository,
    vtxo::*,
};

/// Read paths every wallet serves, whether or not it can sign.
#[async_trait]
pub trait ReadonlyCapabilities: Send + Sync {
    fn address(&self) -> &str;
    fn boarding_address(&self) -> &str;
    fn offchain_script(&self) -> &VtxoScriptTemplate;

    async fn get_vtxos(&self, filter: VtxoFilter) -> Result<Vec<ExtendedVirtualCoin>, HostError>;
    async fn get_boarding_utxos(&self) -> Result<Vec<Coin>, HostError>;
    async fn get_balance(&self) -> Result<WalletBalance, HostError>;
    async fn get_transaction_history(&self) -> Result<Vec<TransactionRecord>, HostError>;
}

pub struct ReadonlyWallet {
    address: String,
    boarding_address: String,
    offchain_script: VtxoScriptTemplate,
    repository: Arc<dyn WalletRepository>,
}

#[async_trait]
impl ReadonlyCapabilities for ReadonlyWallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn boarding_address(&self) -> &str {
        &self.boarding_address
    }

    fn offchain_script(&self) -> &VtxoScriptTemplate {
        &self.offchain_script
    }

    async fn get_vtxos(&self, filter: VtxoFilter) -> Result<Vec<ExtendedVirtualCoin>, HostError> {
        let vtxos = self.repository.get_vtxos(&self.address).await?;
        Ok(vtxos.into_iter().filter(|v| filter.matches(v)).collect())
    }

    async fn get_boarding_utxos(&self) -> Result<Vec<Coin>, HostError> {
        Ok(self.repository.get_utxos(&self.boarding_address).await?)
    }

    #[instrument(name = "readonly_wallet.get_balance", skip(self), err)]
    async fn get_balance(&self) -> Result<WalletBalance, HostError> {
        let utxos = self.repository.get_utxos(&self.boarding_address).await?;
        let vtxos = self.repository.get_vtxos(&self.address).await?;
        Ok(WalletBalance::aggregate(&utxos, &vtxos))
    }

    async fn get_transaction_history(&self) -> Result<Vec<TransactionRecord>, HostError> {
        Ok(self
            .repository
            .get_transaction_history(&self.address)
            .await?)
    }
}

pub struct FullWallet {
    readonly: ReadonlyWallet,
    settler: Arc<dyn Settler>,
    delegation: Option<DelegationEngine>,
}

impl FullWallet {
    pub fn delegation(&self) -> Option<&DelegationEngine> {
        self.delegation.as_ref()
    }

    pub async fn send_bitcoin(&self, params: SendBitcoinParams) -> Result<String, HostError> {
        Ok(self.settler.send_bitcoin(params).await?)
    }

    pub async fn settle(
        &self,
        params: Option<SettleParams>,
        events: mpsc::UnboundedSender<serde_json::Value>,
    ) -> Result<String, HostError> {
        Ok(self.settler.settle(params, events).await?)
    }

    /// Delegates the selected coins, or every spendable coin when none are named.
    #[instrument(name = "full_wallet.delegate", skip(self), err)]
    pub async fn delegate(&self, payload: DelegatePayload) -> Result<DelegateOutcome, HostError> {
        let engine = self
            .delegation
            .as_ref()
            .ok_or(HostError::DelegatorUnavailable)?;
        let filter = VtxoFilter {
            with_recoverable: true,
            with_unrolled: false,
        };
        let mut coins = self.readonly.get_vtxos(filter).await?;
        if let Some(outpoints) = payload.outpoints.as_ref() {
            coins.retain(|c| outpoints.contains(&c.outpoint));
        }
        let destination = match payload.destination.as_deref() {
            Some(address) => address.parse::<ArkAddress>()?.script_pubkey(),
            None => self.readonly.offchain_script.pk_script.clone(),
        };
        Ok(engine
            .delegate(coins, &destination, payload.delegate_at)
            .await)
    }
}

#[async_trait]
impl ReadonlyCapabilities for FullWallet {
    fn address(&self) -> &str {
        self.readonly.address()
    }

    fn boarding_address(&self) -> &str {
        self.readonly.boarding_address()
    }

    fn offchain_script(&self) -> &VtxoScriptTemplate {
        self.readonly.offchain_script()
    }

    async fn get_vtxos(&self, filter: VtxoFilter) -> Result<Vec<ExtendedVirtualCoin>, HostError> {
        self.readonly.get_vtxos(filter).await
    }

    async fn get_boarding_utxos(&self) -> Result<Vec<Coin>, HostError> {
        self.readonly.get_boarding_utxos().await
    }

    async fn get_balance(&self) -> Result<WalletBalance, HostError> {
        self.readonly.get_balance().await
    }

    async fn get_transaction_history(&self) -> Result<Vec<TransactionRecord>, HostError> {
        self.readonly.get_transaction_history().await
    }
}

pub enum WalletHandler {
    Readonly(ReadonlyWallet),
    Full(FullWallet),
}

impl WalletHandler {
    pub fn new(
        setup: WalletSetup,
        repository: Arc<dyn WalletRepository>,
        providers: &Providers,
    ) -> Self {
        let readonly = ReadonlyWallet {
            address: setup.address,
            boarding_address: setup.boarding_address,
            offchain_script: setup.offchain_script,
            repository,
        };
        match setup.signing {
            None => WalletHandler::Readonly(readonly),
            Some(SigningSetup { identity, settler }) => {
                let delegation = providers.delegator.as_ref().map(|delegator| {
                    DelegationEngine::new(
                        identity,
                        Arc::clone(&providers.coordinator),
                        Arc::clone(delegator),
                    )
                });
                WalletHandler::Full(FullWallet {
                    readonly,
                    settler,
                    delegation,
                })
            }
        }
    }

    pub fn reads(&self) -> &dyn ReadonlyCapabilities {
        match self {
            WalletHandler::Readonly(wallet) => wallet,
            WalletHandler::Full(wallet) => wallet,
        }
    }

    pub fn signing(&self) -> Option<&FullWallet> {
        match self {
            WalletHandler::Readonly(_) => None,
            WalletHandler::Full(wallet) => Some(wallet),
        }
    }

    pub fn is_readonly(&self) -> bool {
        self.signing().is_none()
    }
}
