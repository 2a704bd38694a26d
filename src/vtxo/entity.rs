use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::script::TapLeafScript;
use crate::primitives::{bitcoin::*, *};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VirtualState {
    Preconfirmed,
    Settled,
    Swept,
    Spent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualStatus {
    pub state: VirtualState,
    #[serde(default)]
    pub commitment_txids: Vec<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub batch_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAllocation {
    pub asset_id: String,
    pub amount: u64,
}

/// An off-chain coin as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualCoin {
    pub outpoint: OutPoint,
    pub value: Satoshis,
    pub script: ScriptBuf,
    pub virtual_status: VirtualStatus,
    #[serde(default)]
    pub is_spent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spent_by: Option<Txid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_by: Option<Txid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ark_txid: Option<Txid>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_unrolled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<AssetAllocation>,
}

impl VirtualCoin {
    pub fn state(&self) -> VirtualState {
        self.virtual_status.state
    }

    pub fn batch_expiry(&self) -> Option<DateTime<Utc>> {
        self.virtual_status.batch_expiry
    }
}

/// A [`VirtualCoin`] together with the script material needed to spend it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedVirtualCoin {
    #[serde(flatten)]
    pub coin: VirtualCoin,
    pub forfeit_tap_leaf: TapLeafScript,
    pub intent_tap_leaf: TapLeafScript,
    pub tap_tree: Vec<TapLeafScript>,
}

impl std::ops::Deref for ExtendedVirtualCoin {
    type Target = VirtualCoin;

    fn deref(&self) -> &Self::Target {
        &self.coin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinStatus {
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u32>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub block_time: Option<DateTime<Utc>>,
}

/// An on-chain boarding output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    pub outpoint: OutPoint,
    pub value: Satoshis,
    pub status: CoinStatus,
}
