use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashSet},
};

use crate::{
    primitives::{bitcoin::Txid, *},
    vtxo::*,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boarding_txid: Option<Txid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment_txid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ark_txid: Option<Txid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub key: TransactionKey,
    pub kind: TransactionKind,
    pub amount: Satoshis,
    pub settled: bool,
    /// `None` while the underlying transaction is unconfirmed.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Derives the wallet's transaction history from its coins.
///
/// Coins created by one of the wallet's own spends are change and never show up
/// as received; the spend itself is reported as sent, net of that change.
pub fn build_history(vtxos: &[VirtualCoin], boarding: &[Coin]) -> Vec<TransactionRecord> {
    let own_spends: HashSet<Txid> = vtxos.iter().filter_map(|v| v.spent_by).collect();

    let mut received: BTreeMap<Txid, Vec<&VirtualCoin>> = BTreeMap::new();
    let mut change: BTreeMap<Txid, Vec<&VirtualCoin>> = BTreeMap::new();
    let mut spent: BTreeMap<Txid, Vec<&VirtualCoin>> = BTreeMap::new();
    for vtxo in vtxos {
        let txid = vtxo.outpoint.txid;
        if own_spends.contains(&txid) {
            change.entry(txid).or_default().push(vtxo);
        } else {
            received.entry(txid).or_default().push(vtxo);
        }
        if let Some(spent_by) = vtxo.spent_by {
            spent.entry(spent_by).or_default().push(vtxo);
        }
    }

    let mut records = Vec::new();
    for (txid, coins) in received {
        let preconfirmed = coins
            .iter()
            .any(|v| v.state() == VirtualState::Preconfirmed);
        let key = if preconfirmed {
            TransactionKey {
                ark_txid: Some(txid),
                ..Default::default()
            }
        } else {
            TransactionKey {
                commitment_txid: Some(
                    coins
                        .iter()
                        .find_map(|v| v.virtual_status.commitment_txids.first().cloned())
                        .unwrap_or_else(|| txid.to_string()),
                ),
                ..Default::default()
            }
        };
        records.push(TransactionRecord {
            key,
            kind: TransactionKind::Received,
            amount: coins.iter().map(|v| v.value).sum(),
            settled: !preconfirmed,
            created_at: coins.iter().map(|v| v.created_at).min(),
        });
    }

    for (txid, inputs) in spent {
        let outputs = change.get(&txid).map(Vec::as_slice).unwrap_or_default();
        let spent_amount: Satoshis = inputs.iter().map(|v| v.value).sum();
        let change_amount: Satoshis = outputs.iter().map(|v| v.value).sum();
        let amount = spent_amount.saturating_sub(change_amount);
        if amount == Satoshis::ZERO {
            continue;
        }
        records.push(TransactionRecord {
            key: TransactionKey {
                ark_txid: Some(txid),
                ..Default::default()
            },
            kind: TransactionKind::Sent,
            amount,
            settled: outputs
                .iter()
                .all(|v| v.state() != VirtualState::Preconfirmed),
            created_at: outputs
                .iter()
                .chain(inputs.iter())
                .map(|v| v.created_at)
                .max(),
        });
    }

    for coin in boarding {
        records.push(TransactionRecord {
            key: TransactionKey {
                boarding_txid: Some(coin.outpoint.txid),
                ..Default::default()
            },
            kind: TransactionKind::Received,
            amount: coin.value,
            settled: coin.status.confirmed,
            created_at: coin.status.block_time,
        });
    }

    sort_newest_first(&mut records);
    records
}

/// Pending entries first, then newest first.
pub fn sort_newest_first(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| match (a.created_at, b.created_at) {
        (None, None) => a.key.cmp(&b.key),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.key.cmp(&b.key)),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::bitcoin::{OutPoint, ScriptBuf};
    use std::str::FromStr;

    fn txid(n: u8) -> Txid {
        Txid::from_str(&format!("{n:02x}").repeat(32)).unwrap()
    }

    fn vtxo(tx: u8, value: u64, state: VirtualState, spent_by: Option<u8>, at: i64) -> VirtualCoin {
        VirtualCoin {
            outpoint: OutPoint::new(txid(tx), 0),
            value: Satoshis::from(value),
            script: ScriptBuf::new(),
            virtual_status: VirtualStatus {
                state,
                commitment_txids: vec![],
                batch_expiry: None,
            },
            is_spent: spent_by.is_some(),
            spent_by: spent_by.map(txid),
            settled_by: None,
            ark_txid: None,
            created_at: DateTime::from_timestamp(at, 0).unwrap(),
            is_unrolled: false,
            assets: vec![],
        }
    }

    #[test]
    fn nets_change_out_of_sends() {
        let vtxos = vec![
            vtxo(1, 10_000, VirtualState::Settled, Some(2), 100),
            vtxo(2, 4_000, VirtualState::Preconfirmed, None, 200),
        ];
        let history = build_history(&vtxos, &[]);
        assert_eq!(history.len(), 2);

        let sent = &history[0];
        assert_eq!(sent.kind, TransactionKind::Sent);
        assert_eq!(sent.amount, Satoshis::from(6_000));
        assert_eq!(sent.key.ark_txid, Some(txid(2)));
        assert!(!sent.settled);

        let received = &history[1];
        assert_eq!(received.kind, TransactionKind::Received);
        assert_eq!(received.amount, Satoshis::from(10_000));
        assert!(received.settled);
    }

    #[test]
    fn unconfirmed_boarding_sorts_first() {
        let boarding = vec![Coin {
            outpoint: OutPoint::new(txid(9), 1),
            value: Satoshis::from(100_000),
            status: CoinStatus {
                confirmed: false,
                block_height: None,
                block_time: None,
            },
        }];
        let vtxos = vec![vtxo(1, 5_000, VirtualState::Settled, None, 100)];
        let history = build_history(&vtxos, &boarding);
        assert_eq!(history[0].key.boarding_txid, Some(txid(9)));
        assert!(!history[0].settled);
    }
}
