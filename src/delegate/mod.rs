mod client;
pub mod config;
mod entity;
pub mod error;
mod forfeit;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::future::join_all;
use tracing::instrument;

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    address::{onchain_script, parse_network, ArkAddress},
    fees::{FeeEstimator, FeeOutput, InputKind, OffchainInput},
    identity::Identity,
    intent::{create_signed_intent, IntentInput, RegisterMessage},
    primitives::{bitcoin::*, *},
    provider::Coordinator,
    vtxo::*,
};
pub use client::*;
pub use entity::*;
use error::DelegateError;

/// Coins partitioned into independently delegated groups.
#[derive(Debug, Default)]
pub struct DelegationPlan {
    pub groups: Vec<Vec<ExtendedVirtualCoin>>,
    pub missing_expiry: Vec<ExtendedVirtualCoin>,
}

/// Buckets coins by the UTC day they expire on.
///
/// Recoverable coins ride along with the earliest bucket, or form their own
/// group when no bucket exists. Non-recoverable coins without an expiry
/// cannot be scheduled and are set aside.
pub fn plan_groups(coins: Vec<ExtendedVirtualCoin>) -> DelegationPlan {
    let mut plan = DelegationPlan::default();
    let mut recoverable = Vec::new();
    let mut by_day: BTreeMap<NaiveDate, Vec<ExtendedVirtualCoin>> = BTreeMap::new();
    for coin in coins {
        if is_recoverable(&coin) {
            recoverable.push(coin);
            continue;
        }
        match coin.batch_expiry() {
            Some(expiry) => by_day.entry(expiry.date_naive()).or_default().push(coin),
            None => plan.missing_expiry.push(coin),
        }
    }

    if !recoverable.is_empty() {
        match by_day.values_mut().next() {
            Some(earliest) => earliest.append(&mut recoverable),
            None => plan.groups.push(recoverable),
        }
    }
    plan.groups.extend(by_day.into_values());
    plan
}

/// When a group should be renewed: a tenth of the remaining lifetime before the
/// earliest expiry, never sooner than one minute from `now`.
pub fn default_delegate_at(coins: &[ExtendedVirtualCoin], now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = now + Duration::minutes(1);
    match coins.iter().filter_map(|c| c.batch_expiry()).min() {
        Some(expiry) => {
            let at = expiry - (expiry - now) / 10;
            at.max(floor)
        }
        None => floor,
    }
}

#[derive(Clone)]
pub struct DelegationEngine {
    identity: Arc<dyn Identity>,
    coordinator: Arc<dyn Coordinator>,
    delegator: Arc<dyn DelegatorTransport>,
}

impl DelegationEngine {
    pub fn new(
        identity: Arc<dyn Identity>,
        coordinator: Arc<dyn Coordinator>,
        delegator: Arc<dyn DelegatorTransport>,
    ) -> Self {
        Self {
            identity,
            coordinator,
            delegator,
        }
    }

    /// Hands `coins` over to the delegator for renewal.
    ///
    /// With `delegate_at` the input is one all-or-nothing group. Otherwise every
    /// group succeeds or fails on its own and every input coin appears in the
    /// outcome exactly once.
    #[instrument(name = "delegation_engine.delegate", skip_all, fields(n_coins = coins.len()))]
    pub async fn delegate(
        &self,
        coins: Vec<ExtendedVirtualCoin>,
        destination: &ScriptBuf,
        delegate_at: Option<DateTime<Utc>>,
    ) -> DelegateOutcome {
        let mut outcome = DelegateOutcome::default();
        if coins.is_empty() {
            return outcome;
        }

        if let Some(at) = delegate_at {
            let outpoints = coins.iter().map(|c| c.outpoint).collect();
            match self.delegate_group(&coins, destination, at).await {
                Ok(()) => outcome.delegated = outpoints,
                Err(error) => outcome.failed.push(FailedDelegation { outpoints, error }),
            }
            return outcome;
        }

        let plan = plan_groups(coins);
        for coin in plan.missing_expiry {
            outcome.failed.push(FailedDelegation {
                outpoints: vec![coin.outpoint],
                error: DelegateError::MissingExpiry(coin.outpoint),
            });
        }

        let now = Utc::now();
        let results = join_all(plan.groups.iter().map(|group| async move {
            let at = default_delegate_at(group, now);
            (group, self.delegate_group(group, destination, at).await)
        }))
        .await;
        for (group, result) in results {
            let outpoints = group.iter().map(|c| c.outpoint).collect();
            match result {
                Ok(()) => outcome.delegated.extend(outpoints),
                Err(error) => {
                    tracing::warn!(%error, "delegation group failed");
                    outcome.failed.push(FailedDelegation { outpoints, error });
                }
            }
        }
        outcome
    }

    #[instrument(
        name = "delegation_engine.delegate_group",
        skip(self, coins, destination),
        fields(n_coins = coins.len()),
        err
    )]
    async fn delegate_group(
        &self,
        coins: &[ExtendedVirtualCoin],
        destination: &ScriptBuf,
        delegate_at: DateTime<Utc>,
    ) -> Result<(), DelegateError> {
        let info = self.coordinator.get_info().await?;
        let estimator = FeeEstimator::new(&info.fees.intent_fee)?.at(delegate_at);

        let mut amount = Satoshis::ZERO;
        for coin in coins {
            let fee = estimator.eval_offchain_input(&OffchainInput {
                amount: coin.value,
                expiry: coin.batch_expiry(),
                birth: Some(coin.created_at),
                kind: if is_recoverable(coin) {
                    InputKind::Recoverable
                } else {
                    InputKind::Vtxo
                },
                weight: 0,
            })?;
            if fee >= coin.value {
                continue;
            }
            amount += coin.value.saturating_sub(fee);
        }

        let terms = self.delegator.get_delegate_info().await?;
        let mut outputs = Vec::new();
        if terms.fee > Satoshis::ZERO {
            let delegator_address: ArkAddress = terms.delegator_address.parse()?;
            outputs.push(TxOut {
                value: terms.fee.into_inner(),
                script_pubkey: delegator_address.script_pubkey(),
            });
        }
        outputs.push(TxOut {
            value: amount.into_inner(),
            script_pubkey: destination.clone(),
        });

        let mut output_fees = Satoshis::ZERO;
        for output in outputs.iter().filter(|o| o.value > 0) {
            output_fees += estimator.eval_offchain_output(&FeeOutput {
                amount: Satoshis::from(output.value),
                script: output.script_pubkey.clone(),
            })?;
        }
        let amount = above_dust(amount.checked_sub(output_fees), info.dust)?;
        let amount = above_dust(amount.checked_sub(terms.fee), info.dust)?;
        if let Some(last) = outputs.last_mut() {
            last.value = amount.into_inner();
        }

        let inputs: Vec<IntentInput> = coins.iter().map(IntentInput::from).collect();
        let message = RegisterMessage::new(delegate_at, vec![terms.pubkey.clone()]);
        let intent =
            create_signed_intent(self.identity.as_ref(), message, &inputs, outputs).await?;

        let delegator_key = parse_x_only_key(&terms.pubkey)
            .map_err(|_| DelegateError::InvalidDelegatorKey(terms.pubkey.clone()))?;
        let forfeit_script = onchain_script(&info.forfeit_address, parse_network(&info.network)?)?;
        let mut forfeits = Vec::new();
        for coin in coins.iter().filter(|c| !is_recoverable(c)) {
            let leaf = find_leaf_with_participant(&coin.tap_tree, &delegator_key)
                .ok_or(DelegateError::MissingDelegatorLeaf(coin.outpoint))?;
            let psbt = forfeit::build_forfeit(coin, leaf, &forfeit_script)?;
            forfeits.push(forfeit::sign_forfeit(self.identity.as_ref(), psbt).await?);
        }

        self.delegator.delegate(&intent, &forfeits).await
    }
}

fn above_dust(amount: Option<Satoshis>, dust: Satoshis) -> Result<Satoshis, DelegateError> {
    match amount {
        Some(amount) if amount > dust => Ok(amount),
        amount => Err(DelegateError::Dust {
            amount: amount.unwrap_or(Satoshis::ZERO),
            dust,
        }),
    }
}
