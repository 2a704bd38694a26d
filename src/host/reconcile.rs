use serde::Serialize;
use tokio::sync::mpsc;
use tracing::instrument;

use std::sync::Arc;

use super::{error::HostError, factory::Providers, handler::*, messages::*};
use crate::{
    delegate::config::DelegationConfig,
    envelope::Envelope,
    history::build_history,
    primitives::bitcoin::ScriptBuf,
    provider::*,
    repository::WalletRepository,
    vtxo::*,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VtxoUpdate<'a> {
    new_vtxos: &'a [ExtendedVirtualCoin],
    spent_vtxos: &'a [ExtendedVirtualCoin],
}

#[derive(Serialize)]
struct UtxoUpdate<'a> {
    coins: &'a [Coin],
}

/// Indexer state for one wallet, fetched but not yet persisted.
pub struct WalletSnapshot {
    pub vtxos: Vec<ExtendedVirtualCoin>,
    pub utxos: Vec<Coin>,
}

/// Keeps the repository in line with the indexer and pushes changes to listeners.
#[derive(Clone)]
pub struct Reconciler {
    repository: Arc<dyn WalletRepository>,
    outbound: mpsc::Sender<Envelope>,
    delegation: DelegationConfig,
}

impl Reconciler {
    pub fn new(
        repository: Arc<dyn WalletRepository>,
        outbound: mpsc::Sender<Envelope>,
        delegation: DelegationConfig,
    ) -> Self {
        Self {
            repository,
            outbound,
            delegation,
        }
    }

    /// Pulls the full coin set and boarding outputs, recovering pending
    /// transactions along the way. Nothing is persisted.
    #[instrument(name = "reconciler.fetch", skip_all, err)]
    pub async fn fetch(
        &self,
        handler: &WalletHandler,
        providers: &Providers,
    ) -> Result<WalletSnapshot, HostError> {
        let wallet = handler.reads();
        let template = wallet.offchain_script();
        let vtxos: Vec<ExtendedVirtualCoin> = providers
            .indexer
            .get_vtxos(&[template.pk_script.clone()])
            .await?
            .into_iter()
            .map(|v| template.extend(v))
            .collect();

        if handler.signing().is_some() {
            let pending: Vec<ExtendedVirtualCoin> =
                vtxos.iter().filter(|v| is_pending(v)).cloned().collect();
            if !pending.is_empty() {
                match providers.coordinator.finalize_pending_txs(&pending).await {
                    Ok(recovery) => tracing::info!(
                        finalized = recovery.finalized.len(),
                        pending = recovery.pending.len(),
                        "recovered pending transactions"
                    ),
                    Err(error) => {
                        tracing::warn!(%error, "could not finalize pending transactions")
                    }
                }
            }
        }

        let utxos = providers
            .indexer
            .get_boarding_utxos(wallet.boarding_address())
            .await?;
        Ok(WalletSnapshot { vtxos, utxos })
    }

    /// Writes a fetched snapshot: coins, boarding outputs and the derived history.
    #[instrument(name = "reconciler.persist", skip_all, err)]
    pub async fn persist(
        &self,
        wallet: &dyn ReadonlyCapabilities,
        snapshot: &WalletSnapshot,
    ) -> Result<(), HostError> {
        self.repository
            .save_vtxos(wallet.address(), &snapshot.vtxos)
            .await?;
        self.replace_utxos(wallet.boarding_address(), &snapshot.utxos)
            .await?;
        self.refresh_history(wallet).await?;
        Ok(())
    }

    pub async fn subscribe_funds(
        &self,
        handler: Arc<WalletHandler>,
        providers: &Providers,
    ) -> Result<Subscription, HostError> {
        let scripts = vec![handler.reads().offchain_script().pk_script.clone()];
        let stream = providers.indexer.subscribe_for_scripts(scripts).await?;
        let reconciler = self.clone();
        Ok(Subscription::spawn(stream, move |event| {
            let reconciler = reconciler.clone();
            let handler = Arc::clone(&handler);
            async move {
                let result = match event {
                    Ok(event) => reconciler.handle_funds_event(&handler, event).await,
                    Err(error) => Err(error.into()),
                };
                if let Err(error) = result {
                    tracing::warn!(%error, "could not process funds event");
                }
            }
        }))
    }

    pub async fn watch_contracts(
        &self,
        providers: &Providers,
        scripts: Vec<ScriptBuf>,
    ) -> Result<Subscription, HostError> {
        let stream = providers.indexer.subscribe_for_contracts(scripts).await?;
        let reconciler = self.clone();
        Ok(Subscription::spawn(stream, move |event| {
            let reconciler = reconciler.clone();
            async move {
                let result = match event {
                    Ok(event) => reconciler.broadcast(CONTRACT_EVENT, &event).await,
                    Err(error) => Err(error.into()),
                };
                if let Err(error) = result {
                    tracing::warn!(%error, "could not process contract event");
                }
            }
        }))
    }

    #[instrument(name = "reconciler.handle_funds_event", skip_all, err)]
    pub async fn handle_funds_event(
        &self,
        handler: &WalletHandler,
        event: FundsEvent,
    ) -> Result<(), HostError> {
        let wallet = handler.reads();
        match event {
            FundsEvent::Vtxo {
                new_vtxos,
                spent_vtxos,
            } => {
                let template = wallet.offchain_script();
                let new: Vec<_> = new_vtxos.into_iter().map(|v| template.extend(v)).collect();
                let spent: Vec<_> = spent_vtxos
                    .into_iter()
                    .map(|v| template.extend(v))
                    .collect();
                let touched: Vec<_> = new.iter().chain(spent.iter()).cloned().collect();
                self.repository
                    .save_vtxos(wallet.address(), &touched)
                    .await?;
                self.refresh_history(wallet).await?;
                self.broadcast(
                    VTXO_UPDATE,
                    &VtxoUpdate {
                        new_vtxos: &new,
                        spent_vtxos: &spent,
                    },
                )
                .await?;
                self.delegate_opportunistically(handler, new).await;
            }
            FundsEvent::Utxo { coins } => {
                self.replace_utxos(wallet.boarding_address(), &coins)
                    .await?;
                self.refresh_history(wallet).await?;
                self.broadcast(UTXO_UPDATE, &UtxoUpdate { coins: &coins })
                    .await?;
            }
        }
        Ok(())
    }

    /// Best effort: failures are logged and never reach the caller.
    pub async fn delegate_opportunistically(
        &self,
        handler: &WalletHandler,
        coins: Vec<ExtendedVirtualCoin>,
    ) {
        if !self.delegation.enabled {
            return;
        }
        let Some(engine) = handler.signing().and_then(|w| w.delegation()) else {
            return;
        };
        let eligible: Vec<_> = coins
            .into_iter()
            .filter(|v| is_spendable(v) && !v.is_unrolled)
            .collect();
        if eligible.is_empty() {
            return;
        }
        let destination = handler.reads().offchain_script().pk_script.clone();
        let outcome = engine.delegate(eligible, &destination, None).await;
        if !outcome.delegated.is_empty() {
            tracing::info!(n_coins = outcome.delegated.len(), "delegated coins");
        }
        for failure in outcome.failed {
            tracing::warn!(
                error = %failure.error,
                n_coins = failure.outpoints.len(),
                "opportunistic delegation failed"
            );
        }
    }

    async fn replace_utxos(&self, boarding_address: &str, utxos: &[Coin]) -> Result<(), HostError> {
        self.repository.clear_utxos(boarding_address).await?;
        self.repository.save_utxos(boarding_address, utxos).await?;
        Ok(())
    }

    async fn refresh_history(&self, wallet: &dyn ReadonlyCapabilities) -> Result<(), HostError> {
        let coins: Vec<VirtualCoin> = self
            .repository
            .get_vtxos(wallet.address())
            .await?
            .into_iter()
            .map(|v| v.coin)
            .collect();
        let utxos = self
            .repository
            .get_utxos(wallet.boarding_address())
            .await?;
        let history = build_history(&coins, &utxos);
        self.repository.clear_transactions(wallet.address()).await?;
        self.repository
            .save_transactions(wallet.address(), &history)
            .await?;
        Ok(())
    }

    async fn broadcast<T: Serialize>(&self, kind: &str, payload: &T) -> Result<(), HostError> {
        let envelope = Envelope::broadcast(kind, serde_json::to_value(payload)?);
        if self.outbound.send(envelope).await.is_err() {
            tracing::warn!(kind, "outbound channel closed, dropping broadcast");
        }
        Ok(())
    }
}

/// Submitted off-chain but not yet part of a batch.
fn is_pending(vtxo: &VirtualCoin) -> bool {
    vtxo.state() == VirtualState::Preconfirmed && !vtxo.is_spent
}
