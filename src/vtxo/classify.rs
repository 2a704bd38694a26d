use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::*;
use crate::primitives::Satoshis;

/// Spendable unless spent, or swept without an owner-only path left.
pub fn is_spendable(vtxo: &VirtualCoin) -> bool {
    !vtxo.is_spent && vtxo.state() != VirtualState::Spent
}

/// Swept by the coordinator but still claimable by its owner.
pub fn is_recoverable(vtxo: &VirtualCoin) -> bool {
    vtxo.state() == VirtualState::Swept && is_spendable(vtxo)
}

pub fn is_expired(vtxo: &VirtualCoin, now: DateTime<Utc>) -> bool {
    match vtxo.batch_expiry() {
        Some(expiry) => expiry <= now && !is_recoverable(vtxo),
        None => false,
    }
}

pub fn is_subdust(vtxo: &VirtualCoin, dust: Satoshis) -> bool {
    vtxo.value < dust
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VtxoFilter {
    #[serde(default)]
    pub with_recoverable: bool,
    #[serde(default)]
    pub with_unrolled: bool,
}

impl VtxoFilter {
    pub fn matches(&self, vtxo: &VirtualCoin) -> bool {
        if !is_spendable(vtxo) {
            return false;
        }
        if vtxo.is_unrolled && !self.with_unrolled {
            return false;
        }
        self.with_recoverable || !is_recoverable(vtxo)
    }
}
