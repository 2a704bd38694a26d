pub mod error;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    identity::Identity,
    primitives::{bitcoin::*, *},
    vtxo::{ExtendedVirtualCoin, TapLeafScript},
};
use error::IntentError;

const PROOF_TAG: &[u8] = b"ark-intent-proof-message";

/// Registers inputs and outputs for the next batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub onchain_output_indexes: Vec<usize>,
    pub valid_at: i64,
    pub expire_at: i64,
    pub cosigners_public_keys: Vec<String>,
}

impl RegisterMessage {
    pub fn new(valid_at: DateTime<Utc>, cosigners_public_keys: Vec<String>) -> Self {
        Self {
            kind: "register".to_string(),
            onchain_output_indexes: Vec::new(),
            valid_at: valid_at.timestamp(),
            expire_at: 0,
            cosigners_public_keys,
        }
    }
}

pub trait IntentMessage: Serialize {
    fn onchain_output_indexes(&self) -> &[usize];
}

impl IntentMessage for RegisterMessage {
    fn onchain_output_indexes(&self) -> &[usize] {
        &self.onchain_output_indexes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIntent<M> {
    /// Base64 PSBT proving ownership of every input.
    pub proof: String,
    pub message: M,
}

#[derive(Debug, Clone)]
pub struct IntentInput {
    pub outpoint: OutPoint,
    pub value: Satoshis,
    pub script: ScriptBuf,
    pub tap_leaf: TapLeafScript,
}

impl From<&ExtendedVirtualCoin> for IntentInput {
    fn from(vtxo: &ExtendedVirtualCoin) -> Self {
        Self {
            outpoint: vtxo.outpoint,
            value: vtxo.value,
            script: vtxo.script.clone(),
            tap_leaf: vtxo.intent_tap_leaf.clone(),
        }
    }
}

#[instrument(name = "intent.create_signed", skip_all, fields(n_inputs = inputs.len()), err)]
pub async fn create_signed_intent<M: IntentMessage>(
    identity: &dyn Identity,
    message: M,
    inputs: &[IntentInput],
    outputs: Vec<TxOut>,
) -> Result<SignedIntent<M>, IntentError> {
    if let Some(idx) = message
        .onchain_output_indexes()
        .iter()
        .find(|idx| **idx >= outputs.len())
    {
        return Err(IntentError::OutputIndexOutOfRange(*idx));
    }
    let encoded = serde_json::to_string(&message)?;
    let psbt = build_proof(encoded.as_bytes(), inputs, outputs)?;
    let expected: Vec<OutPoint> = psbt
        .unsigned_tx
        .input
        .iter()
        .map(|i| i.previous_output)
        .collect();

    let signed = identity.sign(psbt, None).await?;
    let signed_inputs: Vec<OutPoint> = signed
        .unsigned_tx
        .input
        .iter()
        .map(|i| i.previous_output)
        .collect();
    if signed_inputs != expected {
        return Err(IntentError::ProofMismatch);
    }

    Ok(SignedIntent {
        proof: STANDARD.encode(signed.serialize()),
        message,
    })
}

/// Builds the unsigned proof: a virtual `to_spend` transaction committing to
/// `message`, spent together with every input by the returned PSBT.
pub fn build_proof(
    message: &[u8],
    inputs: &[IntentInput],
    outputs: Vec<TxOut>,
) -> Result<Psbt, IntentError> {
    let first = inputs.first().ok_or(IntentError::NoInputs)?;
    let leaves = inputs
        .iter()
        .map(|input| {
            input
                .tap_leaf
                .control_block()
                .map_err(|_| IntentError::MissingIntentLeaf(input.outpoint))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let to_spend = to_spend_tx(message, &first.script);
    let mut tx_inputs = vec![TxIn {
        previous_output: OutPoint::new(to_spend.txid(), 0),
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    }];
    tx_inputs.extend(inputs.iter().map(|input| TxIn {
        previous_output: input.outpoint,
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    }));
    let outputs = if outputs.is_empty() {
        vec![TxOut {
            value: 0,
            script_pubkey: ScriptBuilder::new()
                .push_opcode(opcodes::all::OP_RETURN)
                .into_script(),
        }]
    } else {
        outputs
    };

    let mut psbt = Psbt::from_unsigned_tx(Transaction {
        version: 2,
        lock_time: LockTime::ZERO,
        input: tx_inputs,
        output: outputs,
    })?;

    psbt.inputs[0].witness_utxo = Some(to_spend.output[0].clone());
    psbt.inputs[0].tap_scripts.insert(
        leaves[0].clone(),
        (first.tap_leaf.script.clone(), LeafVersion::TapScript),
    );
    for (idx, (input, control_block)) in inputs.iter().zip(leaves).enumerate() {
        let psbt_input = &mut psbt.inputs[idx + 1];
        psbt_input.witness_utxo = Some(TxOut {
            value: input.value.into_inner(),
            script_pubkey: input.script.clone(),
        });
        psbt_input
            .tap_scripts
            .insert(control_block, (input.tap_leaf.script.clone(), LeafVersion::TapScript));
    }
    Ok(psbt)
}

fn to_spend_tx(message: &[u8], script_pubkey: &ScriptBuf) -> Transaction {
    let digest = tagged_hash(message);
    Transaction {
        version: 0,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: ScriptBuilder::new()
                .push_int(0)
                .push_slice(digest.to_byte_array())
                .into_script(),
            sequence: Sequence::ZERO,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: 0,
            script_pubkey: script_pubkey.clone(),
        }],
    }
}

fn tagged_hash(message: &[u8]) -> sha256::Hash {
    let tag = sha256::Hash::hash(PROOF_TAG);
    let mut engine = sha256::Hash::engine();
    engine.input(tag.as_ref());
    engine.input(tag.as_ref());
    engine.input(message);
    sha256::Hash::from_engine(engine)
}
