use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

use crate::{primitives::*, vtxo::*};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardingBalance {
    pub confirmed: Satoshis,
    pub unconfirmed: Satoshis,
    pub total: Satoshis,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffchainBalance {
    pub settled: Satoshis,
    pub preconfirmed: Satoshis,
    pub available: Satoshis,
    pub recoverable: Satoshis,
    pub total: Satoshis,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub boarding: BoardingBalance,
    pub offchain: OffchainBalance,
    pub total: Satoshis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<BTreeMap<String, u64>>,
}

impl WalletBalance {
    /// Aggregates boarding outputs and off-chain coins into a balance.
    ///
    /// `vtxos` may contain any coin of the wallet; anything that is not
    /// spendable is ignored.
    pub fn aggregate(boarding: &[Coin], vtxos: &[ExtendedVirtualCoin]) -> Self {
        let mut balance = WalletBalance::default();

        for utxo in boarding {
            if utxo.status.confirmed {
                balance.boarding.confirmed += utxo.value;
            } else {
                balance.boarding.unconfirmed += utxo.value;
            }
        }
        balance.boarding.total = balance.boarding.confirmed + balance.boarding.unconfirmed;

        let mut assets: BTreeMap<String, u64> = BTreeMap::new();
        for vtxo in vtxos.iter().filter(|v| is_spendable(v)) {
            match vtxo.state() {
                VirtualState::Settled => balance.offchain.settled += vtxo.value,
                VirtualState::Preconfirmed => balance.offchain.preconfirmed += vtxo.value,
                VirtualState::Swept => balance.offchain.recoverable += vtxo.value,
                VirtualState::Spent => continue,
            }
            for asset in vtxo.assets.iter() {
                *assets.entry(asset.asset_id.clone()).or_default() += asset.amount;
            }
        }
        let offchain = &mut balance.offchain;
        offchain.available = offchain.settled + offchain.preconfirmed;
        offchain.total = offchain.available + offchain.recoverable;

        balance.total = balance.boarding.total + balance.offchain.total;
        if !assets.is_empty() {
            balance.assets = Some(assets);
        }
        balance
    }
}
