use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    error::FeeError,
    expression::{Environment, Expression},
};
use crate::primitives::{bitcoin::ScriptBuf, Satoshis};

/// Fee programs announced by the coordinator for intent registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentFeeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offchain_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offchain_output: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Vtxo,
    Recoverable,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Vtxo => "vtxo",
            InputKind::Recoverable => "recoverable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OffchainInput {
    pub amount: Satoshis,
    pub expiry: Option<DateTime<Utc>>,
    pub birth: Option<DateTime<Utc>>,
    pub kind: InputKind,
    pub weight: u64,
}

#[derive(Debug, Clone)]
pub struct FeeOutput {
    pub amount: Satoshis,
    pub script: ScriptBuf,
}

#[derive(Debug, Clone)]
pub struct FeeEstimator {
    offchain_input: Option<Expression>,
    offchain_output: Option<Expression>,
    now: DateTime<Utc>,
}

impl FeeEstimator {
    pub fn new(config: &IntentFeeConfig) -> Result<Self, FeeError> {
        Ok(Self {
            offchain_input: compile(config.offchain_input.as_deref())?,
            offchain_output: compile(config.offchain_output.as_deref())?,
            now: Utc::now(),
        })
    }

    /// Pins the instant `now()` evaluates to.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn eval_offchain_input(&self, input: &OffchainInput) -> Result<Satoshis, FeeError> {
        let env = Environment::new(self.now)
            .bind("amount", input.amount.into_inner())
            .bind("expiry", unix_or_zero(input.expiry))
            .bind("birth", unix_or_zero(input.birth))
            .bind("weight", input.weight)
            .bind("inputType", input.kind.as_str());
        evaluate(self.offchain_input.as_ref(), &env)
    }

    pub fn eval_offchain_output(&self, output: &FeeOutput) -> Result<Satoshis, FeeError> {
        let env = Environment::new(self.now)
            .bind("amount", output.amount.into_inner())
            .bind("script", hex::encode(output.script.as_bytes()));
        evaluate(self.offchain_output.as_ref(), &env)
    }
}

fn compile(source: Option<&str>) -> Result<Option<Expression>, FeeError> {
    match source.map(str::trim) {
        None | Some("") => Ok(None),
        Some(source) => source.parse().map(Some),
    }
}

fn evaluate(expression: Option<&Expression>, env: &Environment) -> Result<Satoshis, FeeError> {
    match expression {
        None => Ok(Satoshis::ZERO),
        Some(expression) => Ok(Satoshis::from_fee(expression.evaluate(env)?.as_number()?)),
    }
}

fn unix_or_zero(at: Option<DateTime<Utc>>) -> i64 {
    at.map(|t| t.timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn input(expiry: Option<DateTime<Utc>>) -> OffchainInput {
        OffchainInput {
            amount: Satoshis::from(100_000),
            expiry,
            birth: None,
            kind: InputKind::Vtxo,
            weight: 0,
        }
    }

    #[test]
    fn missing_programs_cost_nothing() {
        let estimator = FeeEstimator::new(&IntentFeeConfig {
            offchain_input: Some("   ".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            estimator.eval_offchain_input(&input(None)).unwrap(),
            Satoshis::ZERO
        );
        let output = FeeOutput {
            amount: Satoshis::from(1),
            script: ScriptBuf::new(),
        };
        assert_eq!(
            estimator.eval_offchain_output(&output).unwrap(),
            Satoshis::ZERO
        );
    }

    #[test]
    fn time_dependent_terms_follow_the_pinned_instant() {
        let expiry = Utc.timestamp_opt(1_700_086_400, 0).unwrap();
        let estimator = FeeEstimator::new(&IntentFeeConfig {
            offchain_input: Some("expiry - now() < 3600 ? amount * 0.01 : 0".to_string()),
            ..Default::default()
        })
        .unwrap();

        let early = estimator.clone().at(expiry - Duration::days(1));
        assert_eq!(
            early.eval_offchain_input(&input(Some(expiry))).unwrap(),
            Satoshis::ZERO
        );

        let late = estimator.at(expiry - Duration::minutes(10));
        assert_eq!(
            late.eval_offchain_input(&input(Some(expiry))).unwrap(),
            Satoshis::from(1_000)
        );
    }

    #[test]
    fn output_fee_rounds_up() {
        let estimator = FeeEstimator::new(&IntentFeeConfig {
            offchain_output: Some("amount / 3".to_string()),
            ..Default::default()
        })
        .unwrap();
        let output = FeeOutput {
            amount: Satoshis::from(10),
            script: ScriptBuf::new(),
        };
        assert_eq!(
            estimator.eval_offchain_output(&output).unwrap(),
            Satoshis::from(4)
        );
    }

    #[test]
    fn rejects_malformed_programs() {
        let err = FeeEstimator::new(&IntentFeeConfig {
            offchain_input: Some("amount *".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, FeeError::Parse { .. }));
    }
}
