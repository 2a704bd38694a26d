#![allow(dead_code)]

use async_trait::async_trait;
use bdk::bitcoin::{
    opcodes::all::{OP_CHECKSIG, OP_CHECKSIGVERIFY, OP_CSV, OP_DROP},
    secp256k1::Secp256k1,
    taproot::TaprootBuilder,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;

use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};

use vtxo_wallet::{
    address::ArkAddress,
    config::HostConfig,
    delegate::{error::DelegateError, DelegateInfo, DelegatorTransport},
    envelope::{config::EnvelopeConfig, MessageClient},
    host::{error::HostError, messages::InitWalletPayload, *},
    identity::{error::SigningError, Identity},
    intent::{RegisterMessage, SignedIntent},
    primitives::{bitcoin::*, *},
    provider::{error::ProviderError, *},
    repository::InMemoryWalletRepository,
    vtxo::*,
};

pub const OWNER_KEY: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
pub const SERVER_KEY: &str = "c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";
pub const DELEGATOR_KEY: &str = "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9";

pub fn key(hex: &str) -> XOnlyPublicKey {
    XOnlyPublicKey::from_str(hex).expect("valid key")
}

fn multisig(keys: &[XOnlyPublicKey]) -> ScriptBuf {
    let mut builder = ScriptBuilder::new();
    for (idx, k) in keys.iter().enumerate() {
        builder = builder.push_x_only_key(k);
        builder = if idx + 1 == keys.len() {
            builder.push_opcode(OP_CHECKSIG)
        } else {
            builder.push_opcode(OP_CHECKSIGVERIFY)
        };
    }
    builder.into_script()
}

fn exit_script(owner: &XOnlyPublicKey) -> ScriptBuf {
    ScriptBuilder::new()
        .push_int(144)
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_x_only_key(owner)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Owner+server forfeit path, owner exit path and an owner+delegator leaf.
pub fn template() -> anyhow::Result<VtxoScriptTemplate> {
    let owner = key(OWNER_KEY);
    let forfeit = multisig(&[owner, key(SERVER_KEY)]);
    let exit = exit_script(&owner);
    let delegate = multisig(&[owner, key(DELEGATOR_KEY)]);

    let secp = Secp256k1::verification_only();
    let spend_info = TaprootBuilder::new()
        .add_leaf(1, forfeit.clone())?
        .add_leaf(2, exit.clone())?
        .add_leaf(2, delegate.clone())?
        .finalize(&secp, key(SERVER_KEY))
        .map_err(|_| anyhow::anyhow!("could not finalize tap tree"))?;
    let leaf = |script: ScriptBuf| -> anyhow::Result<TapLeafScript> {
        let control_block = spend_info
            .control_block(&(script.clone(), LeafVersion::TapScript))
            .ok_or_else(|| anyhow::anyhow!("leaf missing from tree"))?;
        Ok(TapLeafScript {
            control_block: control_block.serialize(),
            script,
        })
    };
    Ok(VtxoScriptTemplate {
        pk_script: ScriptBuf::new_v1_p2tr_tweaked(spend_info.output_key()),
        forfeit: leaf(forfeit.clone())?,
        exit: leaf(exit.clone())?,
        leaves: vec![leaf(forfeit)?, leaf(exit)?, leaf(delegate)?],
    })
}

pub fn ark_address() -> String {
    ArkAddress::new(false, key(SERVER_KEY), key(OWNER_KEY)).to_string()
}

pub fn regtest_address(hex: &str) -> String {
    Address::p2tr_tweaked(
        TweakedPublicKey::dangerous_assume_tweaked(key(hex)),
        Network::Regtest,
    )
    .to_string()
}

pub fn txid(n: u8) -> Txid {
    Txid::from_str(&format!("{n:02x}").repeat(32)).expect("valid txid")
}

pub fn vtxo(
    n: u8,
    value: u64,
    state: VirtualState,
    expiry: Option<DateTime<Utc>>,
) -> anyhow::Result<VirtualCoin> {
    Ok(VirtualCoin {
        outpoint: OutPoint::new(txid(n), 0),
        value: Satoshis::from(value),
        script: template()?.pk_script,
        virtual_status: VirtualStatus {
            state,
            commitment_txids: vec![format!("{n:02x}").repeat(32)],
            batch_expiry: expiry,
        },
        is_spent: false,
        spent_by: None,
        settled_by: None,
        ark_txid: None,
        created_at: Utc::now() - Duration::hours(1),
        is_unrolled: false,
        assets: vec![],
    })
}

pub fn boarding_coin(n: u8, value: u64, confirmed: bool) -> Coin {
    Coin {
        outpoint: OutPoint::new(txid(n), 1),
        value: Satoshis::from(value),
        status: CoinStatus {
            confirmed,
            block_height: confirmed.then_some(100),
            block_time: confirmed.then(Utc::now),
        },
    }
}

/// Noon, seven days out, so coins built moments apart share an expiry day.
pub fn in_a_week() -> Option<DateTime<Utc>> {
    let day = (Utc::now() + Duration::days(7)).date_naive();
    day.and_hms_opt(12, 0, 0).map(|noon| Utc.from_utc_datetime(&noon))
}

#[derive(Default)]
pub struct MockIndexer {
    pub vtxos: Mutex<Vec<VirtualCoin>>,
    pub utxos: Mutex<Vec<Coin>>,
    funds: Mutex<Option<mpsc::UnboundedSender<Result<FundsEvent, ProviderError>>>>,
    contracts: Mutex<Option<mpsc::UnboundedSender<Result<ContractEvent, ProviderError>>>>,
    gate: Mutex<Option<Arc<FetchGate>>>,
}

/// Parks the next `get_vtxos` call until `release` is notified.
#[derive(Default)]
pub struct FetchGate {
    pub started: Notify,
    pub release: Notify,
}

impl MockIndexer {
    pub fn with_coins(vtxos: Vec<VirtualCoin>, utxos: Vec<Coin>) -> Self {
        Self {
            vtxos: Mutex::new(vtxos),
            utxos: Mutex::new(utxos),
            ..Default::default()
        }
    }

    pub fn holding_next_fetch(self) -> (Self, Arc<FetchGate>) {
        let gate = Arc::new(FetchGate::default());
        *self.gate.lock().expect("lock") = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn push_funds(&self, event: FundsEvent) -> anyhow::Result<()> {
        let sender = self.funds.lock().expect("lock").clone();
        sender
            .ok_or_else(|| anyhow::anyhow!("no funds subscription"))?
            .send(Ok(event))
            .map_err(|_| anyhow::anyhow!("funds subscription closed"))
    }

    pub fn push_contract(&self, event: ContractEvent) -> anyhow::Result<()> {
        let sender = self.contracts.lock().expect("lock").clone();
        sender
            .ok_or_else(|| anyhow::anyhow!("no contract subscription"))?
            .send(Ok(event))
            .map_err(|_| anyhow::anyhow!("contract subscription closed"))
    }

    pub fn funds_subscription_open(&self) -> bool {
        self.funds
            .lock()
            .expect("lock")
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }
}

#[async_trait]
impl Indexer for MockIndexer {
    async fn get_vtxos(&self, _scripts: &[ScriptBuf]) -> Result<Vec<VirtualCoin>, ProviderError> {
        let gate = self.gate.lock().expect("lock").take();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        Ok(self.vtxos.lock().expect("lock").clone())
    }

    async fn get_boarding_utxos(&self, _address: &str) -> Result<Vec<Coin>, ProviderError> {
        Ok(self.utxos.lock().expect("lock").clone())
    }

    async fn subscribe_for_scripts(
        &self,
        _scripts: Vec<ScriptBuf>,
    ) -> Result<FundsStream, ProviderError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.funds.lock().expect("lock") = Some(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }

    async fn subscribe_for_contracts(
        &self,
        _scripts: Vec<ScriptBuf>,
    ) -> Result<ContractStream, ProviderError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.contracts.lock().expect("lock") = Some(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

pub struct MockCoordinator {
    pub info: CoordinatorInfo,
    pub finalize_calls: Mutex<Vec<Vec<OutPoint>>>,
}

impl Default for MockCoordinator {
    fn default() -> Self {
        Self {
            info: CoordinatorInfo {
                signer_pubkey: SERVER_KEY.to_string(),
                fees: FeeInfo::default(),
                dust: Satoshis::from(330),
                forfeit_address: regtest_address(SERVER_KEY),
                network: "regtest".to_string(),
            },
            finalize_calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Coordinator for MockCoordinator {
    async fn get_info(&self) -> Result<CoordinatorInfo, ProviderError> {
        Ok(self.info.clone())
    }

    async fn finalize_pending_txs(
        &self,
        vtxos: &[ExtendedVirtualCoin],
    ) -> Result<PendingTxRecovery, ProviderError> {
        self.finalize_calls
            .lock()
            .expect("lock")
            .push(vtxos.iter().map(|v| v.outpoint).collect());
        Ok(PendingTxRecovery {
            finalized: vtxos.iter().map(|v| v.outpoint.txid).collect(),
            pending: vec![],
        })
    }
}

pub struct RecordedDelegation {
    pub intent: SignedIntent<RegisterMessage>,
    pub forfeits: Vec<String>,
}

pub struct MockDelegator {
    pub info: DelegateInfo,
    /// Reasons handed out to the next submissions, one per call.
    pub rejections: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<RecordedDelegation>>,
}

impl Default for MockDelegator {
    fn default() -> Self {
        Self {
            info: DelegateInfo {
                pubkey: DELEGATOR_KEY.to_string(),
                fee: Satoshis::ZERO,
                delegator_address: String::new(),
            },
            rejections: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockDelegator {
    pub fn rejecting(reason: &str) -> Self {
        Self {
            rejections: Mutex::new(vec![reason.to_string()]),
            ..Default::default()
        }
    }

    pub fn n_calls(&self) -> usize {
        self.calls.lock().expect("lock").len()
    }
}

#[async_trait]
impl DelegatorTransport for MockDelegator {
    async fn get_delegate_info(&self) -> Result<DelegateInfo, DelegateError> {
        Ok(self.info.clone())
    }

    async fn delegate(
        &self,
        intent: &SignedIntent<RegisterMessage>,
        forfeits: &[String],
    ) -> Result<(), DelegateError> {
        if let Some(reason) = self.rejections.lock().expect("lock").pop() {
            return Err(DelegateError::Rejected(reason));
        }
        self.calls.lock().expect("lock").push(RecordedDelegation {
            intent: intent.clone(),
            forfeits: forfeits.to_vec(),
        });
        Ok(())
    }
}

/// Hands PSBTs back untouched; enough for everything short of consensus checks.
pub struct MockIdentity;

#[async_trait]
impl Identity for MockIdentity {
    async fn sign(
        &self,
        psbt: Psbt,
        input_indexes: Option<&[usize]>,
    ) -> Result<Psbt, SigningError> {
        if let Some(idx) = input_indexes
            .unwrap_or_default()
            .iter()
            .find(|idx| **idx >= psbt.inputs.len())
        {
            return Err(SigningError::InputIndexOutOfRange(*idx));
        }
        Ok(psbt)
    }

    fn x_only_public_key(&self) -> XOnlyPublicKey {
        key(OWNER_KEY)
    }
}

pub struct MockSettler;

#[async_trait]
impl Settler for MockSettler {
    async fn send_bitcoin(&self, params: SendBitcoinParams) -> Result<String, ProviderError> {
        Ok(format!("sent-{}", params.amount.into_inner()))
    }

    async fn settle(
        &self,
        _params: Option<SettleParams>,
        events: mpsc::UnboundedSender<serde_json::Value>,
    ) -> Result<String, ProviderError> {
        for step in ["BatchStarted", "TreeSigningStarted", "BatchFinalized"] {
            let _ = events.send(serde_json::json!({ "type": step }));
        }
        Ok(txid(42).to_string())
    }
}

pub struct MockFactory {
    pub indexer: Arc<MockIndexer>,
    pub coordinator: Arc<MockCoordinator>,
    pub delegator: Option<Arc<MockDelegator>>,
}

impl MockFactory {
    pub fn new(indexer: MockIndexer, delegator: Option<MockDelegator>) -> Self {
        Self {
            indexer: Arc::new(indexer),
            coordinator: Arc::new(MockCoordinator::default()),
            delegator: delegator.map(Arc::new),
        }
    }
}

#[async_trait]
impl WalletFactory for MockFactory {
    async fn providers(&self, _payload: &InitWalletPayload) -> Result<Providers, HostError> {
        Ok(Providers {
            indexer: self.indexer.clone(),
            coordinator: self.coordinator.clone(),
            delegator: self
                .delegator
                .clone()
                .map(|d| d as Arc<dyn DelegatorTransport>),
        })
    }

    async fn wallet(
        &self,
        payload: &InitWalletPayload,
        _providers: &Providers,
    ) -> Result<WalletSetup, HostError> {
        let offchain_script = template().map_err(|e| HostError::Factory(e.to_string()))?;
        let signing = payload.private_key.as_ref().map(|_| SigningSetup {
            identity: Arc::new(MockIdentity),
            settler: Arc::new(MockSettler),
        });
        Ok(WalletSetup {
            address: ark_address(),
            boarding_address: regtest_address(OWNER_KEY),
            offchain_script,
            signing,
        })
    }
}

pub fn init_payload(readonly: bool) -> InitWalletPayload {
    InitWalletPayload {
        private_key: (!readonly).then(|| "01".repeat(32)),
        public_key: readonly.then(|| format!("02{OWNER_KEY}")),
        ark_server_url: "http://localhost:7070".to_string(),
        indexer_url: None,
        delegator_url: None,
    }
}

pub struct TestHost {
    pub client: MessageClient,
    pub repository: InMemoryWalletRepository,
    pub factory: Arc<MockFactory>,
}

/// Wires a host and a client back to back over in-memory channels.
pub fn start_host(factory: MockFactory) -> TestHost {
    let (to_host, host_inbound) = mpsc::channel(64);
    let (host_outbound, from_host) = mpsc::channel(64);
    let repository = InMemoryWalletRepository::new();
    let factory = Arc::new(factory);
    let host = WalletHost::new(
        HostConfig::default(),
        Arc::new(repository.clone()),
        factory.clone(),
        host_outbound,
    );
    tokio::spawn(host.run(host_inbound));
    let client = MessageClient::new(to_host, from_host, EnvelopeConfig::default());
    TestHost {
        client,
        repository,
        factory,
    }
}
