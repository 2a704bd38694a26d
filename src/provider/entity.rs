use serde::{Deserialize, Serialize};

use crate::{
    fees::IntentFeeConfig,
    primitives::{bitcoin::*, *},
    vtxo::*,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeInfo {
    #[serde(default)]
    pub intent_fee: IntentFeeConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_fee_rate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorInfo {
    pub signer_pubkey: String,
    #[serde(default)]
    pub fees: FeeInfo,
    pub dust: Satoshis,
    pub forfeit_address: String,
    pub network: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTxRecovery {
    pub finalized: Vec<Txid>,
    pub pending: Vec<Txid>,
}

/// A change to the coins locked to the subscribed scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundsEvent {
    Vtxo {
        new_vtxos: Vec<VirtualCoin>,
        spent_vtxos: Vec<VirtualCoin>,
    },
    Utxo {
        coins: Vec<Coin>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEvent {
    pub script: ScriptBuf,
    #[serde(default)]
    pub new_vtxos: Vec<VirtualCoin>,
    #[serde(default)]
    pub spent_vtxos: Vec<VirtualCoin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBitcoinParams {
    pub address: String,
    pub amount: Satoshis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_rate: Option<rust_decimal::Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleOutput {
    pub address: String,
    pub amount: Satoshis,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleParams {
    #[serde(default)]
    pub inputs: Vec<OutPoint>,
    #[serde(default)]
    pub outputs: Vec<SettleOutput>,
}
