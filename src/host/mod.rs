pub mod error;
mod factory;
mod handler;
pub mod messages;
mod reconcile;
mod session;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, RwLock};
use tracing::{instrument, Instrument};

use std::sync::Arc;

use crate::{
    config::HostConfig,
    delegate::RestDelegatorClient,
    envelope::Envelope,
    primitives::bitcoin::ScriptBuf,
    provider::SettleParams,
    repository::WalletRepository,
    tracing::inject_tracing_data,
};
use error::HostError;
pub use factory::*;
pub use handler::*;
use messages::*;
pub use reconcile::Reconciler;
pub use session::Session;

struct HostInner {
    session: RwLock<Session>,
    repository: Arc<dyn WalletRepository>,
    factory: Arc<dyn WalletFactory>,
    outbound: mpsc::Sender<Envelope>,
    reconciler: Reconciler,
    config: HostConfig,
}

/// Owns the wallet session and answers envelopes arriving from clients.
#[derive(Clone)]
pub struct WalletHost {
    inner: Arc<HostInner>,
}

impl WalletHost {
    pub fn new(
        config: HostConfig,
        repository: Arc<dyn WalletRepository>,
        factory: Arc<dyn WalletFactory>,
        outbound: mpsc::Sender<Envelope>,
    ) -> Self {
        let reconciler = Reconciler::new(
            Arc::clone(&repository),
            outbound.clone(),
            config.delegation.clone(),
        );
        Self {
            inner: Arc::new(HostInner {
                session: RwLock::new(Session::default()),
                repository,
                factory,
                outbound,
                reconciler,
                config,
            }),
        }
    }

    /// Serves `inbound` until it closes and every in-flight request has replied.
    ///
    /// Requests are handled concurrently, so replies may leave out of order.
    pub async fn run(self, mut inbound: mpsc::Receiver<Envelope>) {
        let mut in_flight = FuturesUnordered::new();
        loop {
            tokio::select! {
                Some(envelope) = inbound.recv() => {
                    let host = self.clone();
                    in_flight.push(async move { host.handle(envelope).await });
                }
                Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
                else => break,
            }
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.session.read().await.is_initialized()
    }

    async fn handle(&self, envelope: Envelope) {
        let span = tracing::info_span!(
            "host.handle_message",
            kind = %envelope.kind,
            id = %envelope.id
        );
        inject_tracing_data(&span, &envelope.tracing);
        let reply = match self.dispatch(&envelope).instrument(span).await {
            Ok(payload) => Envelope::success(&envelope, payload),
            Err(error) => {
                tracing::warn!(%error, kind = %envelope.kind, "request failed");
                Envelope::failure(envelope.id.clone(), error.to_string())
            }
        };
        self.send(reply).await;
    }

    async fn dispatch(&self, envelope: &Envelope) -> Result<Option<Value>, HostError> {
        let message = HostMessage::parse(&envelope.kind, envelope.payload.clone())?;
        let handler = if message.needs_wallet() {
            Some(self.inner.session.read().await.ready()?.0)
        } else {
            None
        };

        match (message, handler) {
            (HostMessage::InitWallet(payload), _) => {
                self.init_wallet(payload).await?;
                Ok(None)
            }
            (HostMessage::Clear, _) => {
                self.clear().await?;
                Ok(None)
            }
            (HostMessage::GetStatus, _) => {
                let session = self.inner.session.read().await;
                let readonly = session.handler.as_ref().map(|h| h.is_readonly());
                Ok(Some(json!({
                    "walletInitialized": session.is_initialized(),
                    "readonly": readonly,
                })))
            }
            (_, None) => Err(HostError::WalletNotInitialized),
            (HostMessage::ReloadWallet, Some(_)) => {
                self.on_initialized().await?;
                Ok(None)
            }
            (HostMessage::GetAddress, Some(handler)) => {
                Ok(Some(json!({ "address": handler.reads().address() })))
            }
            (HostMessage::GetBoardingAddress, Some(handler)) => Ok(Some(
                json!({ "address": handler.reads().boarding_address() }),
            )),
            (HostMessage::GetBalance, Some(handler)) => {
                to_payload(&handler.reads().get_balance().await?)
            }
            (HostMessage::GetVtxos(filter), Some(handler)) => {
                to_payload(&handler.reads().get_vtxos(filter).await?)
            }
            (HostMessage::GetBoardingUtxos, Some(handler)) => {
                to_payload(&handler.reads().get_boarding_utxos().await?)
            }
            (HostMessage::GetTransactionHistory, Some(handler)) => {
                to_payload(&handler.reads().get_transaction_history().await?)
            }
            (HostMessage::SendBitcoin(params), Some(handler)) => match handler.signing() {
                None => Ok(Some(not_supported())),
                Some(wallet) => {
                    let txid = wallet.send_bitcoin(params).await?;
                    Ok(Some(json!({ "txid": txid })))
                }
            },
            (HostMessage::Settle(params), Some(handler)) => match handler.signing() {
                None => Ok(Some(not_supported())),
                Some(wallet) => self.settle(wallet, &envelope.id, params).await,
            },
            (HostMessage::Delegate(payload), Some(handler)) => match handler.signing() {
                None => Ok(Some(not_supported())),
                Some(wallet) => to_payload(&wallet.delegate(payload).await?),
            },
            (HostMessage::WatchContracts(payload), Some(_)) => {
                self.watch_contracts(payload.scripts).await?;
                Ok(None)
            }
        }
    }

    #[instrument(name = "host.init_wallet", skip_all, fields(readonly = payload.is_readonly()), err)]
    async fn init_wallet(&self, payload: InitWalletPayload) -> Result<(), HostError> {
        self.inner.session.write().await.teardown();

        let mut providers = self.inner.factory.providers(&payload).await?;
        if providers.delegator.is_none() {
            let url = payload
                .delegator_url
                .clone()
                .or_else(|| self.inner.config.delegator.url.clone());
            if let Some(url) = url {
                providers.delegator = Some(Arc::new(RestDelegatorClient::new(
                    url,
                    self.inner.config.delegator.clone(),
                )));
            }
        }
        let setup = self.inner.factory.wallet(&payload, &providers).await?;
        let handler = Arc::new(WalletHandler::new(
            setup,
            Arc::clone(&self.inner.repository),
            &providers,
        ));
        {
            let mut session = self.inner.session.write().await;
            session.teardown();
            session.handler = Some(handler);
            session.providers = Some(providers);
        }
        self.on_initialized().await
    }

    #[instrument(name = "host.clear", skip_all, err)]
    async fn clear(&self) -> Result<(), HostError> {
        self.inner.session.write().await.teardown();
        self.inner.repository.clear().await?;
        Ok(())
    }

    /// Full reconciliation pass followed by a fresh funds subscription.
    #[instrument(name = "host.on_initialized", skip_all, err)]
    pub async fn on_initialized(&self) -> Result<(), HostError> {
        let Ok((handler, providers)) = self.inner.session.read().await.ready() else {
            return Ok(());
        };
        if !handler.reads().offchain_script().has_spending_paths() {
            return Ok(());
        }
        let reconciler = &self.inner.reconciler;
        let snapshot = reconciler.fetch(&handler, &providers).await?;
        {
            // held across the write so a concurrent clear cannot interleave
            let session = self.inner.session.read().await;
            if !session.serves(&handler) {
                return Ok(());
            }
            reconciler.persist(handler.reads(), &snapshot).await?;
        }

        let previous = self.inner.session.write().await.funds_subscription.take();
        if let Some(previous) = previous {
            previous.cancel();
        }
        let subscription = reconciler
            .subscribe_funds(Arc::clone(&handler), &providers)
            .await?;
        {
            let mut session = self.inner.session.write().await;
            if !session.serves(&handler) {
                return Ok(());
            }
            session.funds_subscription = Some(subscription);
        }

        reconciler
            .delegate_opportunistically(&handler, snapshot.vtxos)
            .await;
        Ok(())
    }

    async fn watch_contracts(&self, scripts: Vec<ScriptBuf>) -> Result<(), HostError> {
        let (handler, providers) = self.inner.session.read().await.ready()?;
        let previous = self.inner.session.write().await.contract_subscription.take();
        if let Some(previous) = previous {
            previous.cancel();
        }
        let subscription = self
            .inner
            .reconciler
            .watch_contracts(&providers, scripts)
            .await?;
        let mut session = self.inner.session.write().await;
        if session.serves(&handler) {
            session.contract_subscription = Some(subscription);
        }
        Ok(())
    }

    /// Runs a settlement, streaming round events back as progress envelopes
    /// before the terminal reply.
    async fn settle(
        &self,
        wallet: &FullWallet,
        id: &str,
        params: Option<SettleParams>,
    ) -> Result<Option<Value>, HostError> {
        let (events, mut rx) = mpsc::unbounded_channel();
        let settlement = wallet.settle(params, events);
        tokio::pin!(settlement);
        let txid = loop {
            tokio::select! {
                result = &mut settlement => break result?,
                Some(event) = rx.recv() => {
                    self.send(Envelope::progress(id, SETTLE_EVENT, event)).await;
                }
            }
        };
        while let Ok(event) = rx.try_recv() {
            self.send(Envelope::progress(id, SETTLE_EVENT, event)).await;
        }
        Ok(Some(json!({ "txid": txid })))
    }

    async fn send(&self, envelope: Envelope) {
        if self.inner.outbound.send(envelope).await.is_err() {
            tracing::warn!("outbound channel closed, dropping reply");
        }
    }
}

fn not_supported() -> Value {
    json!({ "status": "not_supported" })
}

fn to_payload<T: Serialize>(value: &T) -> Result<Option<Value>, HostError> {
    Ok(Some(serde_json::to_value(value)?))
}
