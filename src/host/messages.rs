use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::error::HostError;
use crate::{
    primitives::bitcoin::{OutPoint, ScriptBuf},
    provider::{SendBitcoinParams, SettleParams},
    vtxo::VtxoFilter,
};

pub const INIT_WALLET: &str = "INIT_WALLET";
pub const CLEAR: &str = "CLEAR";
pub const RELOAD_WALLET: &str = "RELOAD_WALLET";
pub const GET_ADDRESS: &str = "GET_ADDRESS";
pub const GET_BOARDING_ADDRESS: &str = "GET_BOARDING_ADDRESS";
pub const GET_BALANCE: &str = "GET_BALANCE";
pub const GET_VTXOS: &str = "GET_VTXOS";
pub const GET_BOARDING_UTXOS: &str = "GET_BOARDING_UTXOS";
pub const GET_TRANSACTION_HISTORY: &str = "GET_TRANSACTION_HISTORY";
pub const GET_STATUS: &str = "GET_STATUS";
pub const SEND_BITCOIN: &str = "SEND_BITCOIN";
pub const SETTLE: &str = "SETTLE";
pub const SETTLE_EVENT: &str = "SETTLE_EVENT";
pub const SETTLE_SUCCESS: &str = "SETTLE_SUCCESS";
pub const DELEGATE: &str = "DELEGATE";
pub const WATCH_CONTRACTS: &str = "WATCH_CONTRACTS";

pub const VTXO_UPDATE: &str = "VTXO_UPDATE";
pub const UTXO_UPDATE: &str = "UTXO_UPDATE";
pub const CONTRACT_EVENT: &str = "CONTRACT_EVENT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitWalletPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    pub ark_server_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegator_url: Option<String>,
}

impl InitWalletPayload {
    pub fn is_readonly(&self) -> bool {
        self.private_key.is_none()
    }

    fn validate(&self) -> Result<(), HostError> {
        if self.private_key.is_some() == self.public_key.is_some() {
            return Err(HostError::InvalidPayload(
                "exactly one of privateKey or publicKey is required".to_string(),
            ));
        }
        for url in std::iter::once(&self.ark_server_url)
            .chain(self.indexer_url.iter())
            .chain(self.delegator_url.iter())
        {
            url::Url::parse(url)
                .map_err(|e| HostError::InvalidPayload(format!("invalid url '{url}': {e}")))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outpoints: Option<Vec<OutPoint>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub delegate_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchContractsPayload {
    pub scripts: Vec<ScriptBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMessage {
    InitWallet(InitWalletPayload),
    Clear,
    ReloadWallet,
    GetAddress,
    GetBoardingAddress,
    GetBalance,
    GetVtxos(VtxoFilter),
    GetBoardingUtxos,
    GetTransactionHistory,
    GetStatus,
    SendBitcoin(SendBitcoinParams),
    Settle(Option<SettleParams>),
    Delegate(DelegatePayload),
    WatchContracts(WatchContractsPayload),
}

impl HostMessage {
    /// Decodes and validates a request. Fails before any wallet state is touched.
    pub fn parse(kind: &str, payload: Option<Value>) -> Result<Self, HostError> {
        let message = match kind {
            INIT_WALLET => {
                let init: InitWalletPayload = required(payload)?;
                init.validate()?;
                HostMessage::InitWallet(init)
            }
            CLEAR => HostMessage::Clear,
            RELOAD_WALLET => HostMessage::ReloadWallet,
            GET_ADDRESS => HostMessage::GetAddress,
            GET_BOARDING_ADDRESS => HostMessage::GetBoardingAddress,
            GET_BALANCE => HostMessage::GetBalance,
            GET_VTXOS => HostMessage::GetVtxos(optional(payload)?.unwrap_or_default()),
            GET_BOARDING_UTXOS => HostMessage::GetBoardingUtxos,
            GET_TRANSACTION_HISTORY => HostMessage::GetTransactionHistory,
            GET_STATUS => HostMessage::GetStatus,
            SEND_BITCOIN => HostMessage::SendBitcoin(required(payload)?),
            SETTLE => HostMessage::Settle(optional(payload)?),
            DELEGATE => HostMessage::Delegate(optional(payload)?.unwrap_or_default()),
            WATCH_CONTRACTS => HostMessage::WatchContracts(required(payload)?),
            other => return Err(HostError::UnknownMessageType(other.to_string())),
        };
        Ok(message)
    }

    /// Messages served without an initialized wallet.
    pub fn needs_wallet(&self) -> bool {
        !matches!(
            self,
            HostMessage::InitWallet(_) | HostMessage::Clear | HostMessage::GetStatus
        )
    }
}

fn required<T: DeserializeOwned>(payload: Option<Value>) -> Result<T, HostError> {
    match payload {
        Some(payload) if !payload.is_null() => {
            serde_json::from_value(payload).map_err(|e| HostError::InvalidPayload(e.to_string()))
        }
        _ => Err(HostError::InvalidPayload("missing payload".to_string())),
    }
}

fn optional<T: DeserializeOwned>(payload: Option<Value>) -> Result<Option<T>, HostError> {
    match payload {
        Some(payload) if !payload.is_null() => required(Some(payload)).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_unknown_types() {
        let err = HostMessage::parse("GET_EVERYTHING", None).unwrap_err();
        assert!(matches!(err, HostError::UnknownMessageType(_)));
    }

    #[test]
    fn validates_init_payload() {
        let missing = HostMessage::parse(INIT_WALLET, None).unwrap_err();
        assert!(matches!(missing, HostError::InvalidPayload(_)));

        let bad_url = HostMessage::parse(
            INIT_WALLET,
            Some(json!({"publicKey": "02aa", "arkServerUrl": "not a url"})),
        )
        .unwrap_err();
        assert!(matches!(bad_url, HostError::InvalidPayload(_)));

        let both_keys = HostMessage::parse(
            INIT_WALLET,
            Some(json!({
                "publicKey": "02aa",
                "privateKey": "01",
                "arkServerUrl": "http://localhost:7070"
            })),
        )
        .unwrap_err();
        assert!(matches!(both_keys, HostError::InvalidPayload(_)));

        let ok = HostMessage::parse(
            INIT_WALLET,
            Some(json!({"publicKey": "02aa", "arkServerUrl": "http://localhost:7070"})),
        )
        .unwrap();
        assert!(matches!(ok, HostMessage::InitWallet(p) if p.is_readonly()));
    }

    #[test]
    fn optional_payloads_default() {
        assert_eq!(
            HostMessage::parse(GET_VTXOS, None).unwrap(),
            HostMessage::GetVtxos(VtxoFilter::default())
        );
        assert_eq!(
            HostMessage::parse(SETTLE, Some(Value::Null)).unwrap(),
            HostMessage::Settle(None)
        );
        assert!(!HostMessage::GetStatus.needs_wallet());
        assert!(HostMessage::GetBalance.needs_wallet());
    }
}
