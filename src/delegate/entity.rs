use serde::{Deserialize, Serialize, Serializer};

use super::error::DelegateError;
use crate::primitives::{bitcoin::OutPoint, Satoshis};

/// Terms a delegator offers, fetched fresh for every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateInfo {
    pub pubkey: String,
    pub fee: Satoshis,
    pub delegator_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDelegation {
    pub outpoints: Vec<OutPoint>,
    #[serde(serialize_with = "error_message")]
    pub error: DelegateError,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateOutcome {
    pub delegated: Vec<OutPoint>,
    pub failed: Vec<FailedDelegation>,
}

impl DelegateOutcome {
    pub fn is_empty(&self) -> bool {
        self.delegated.is_empty() && self.failed.is_empty()
    }

    /// Every outpoint accounted for, delegated or not.
    pub fn outpoints(&self) -> impl Iterator<Item = &OutPoint> {
        self.delegated
            .iter()
            .chain(self.failed.iter().flat_map(|f| f.outpoints.iter()))
    }
}

fn error_message<S: Serializer>(error: &DelegateError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&error.to_string())
}
