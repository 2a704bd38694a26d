use base64::{engine::general_purpose::STANDARD, Engine};

use super::error::DelegateError;
use crate::{
    identity::Identity,
    primitives::bitcoin::*,
    vtxo::{ExtendedVirtualCoin, TapLeafScript},
};

/// Unsigned forfeit of `vtxo` to `forfeit_script`, spendable through `leaf`.
///
/// Signed with `ALL|ANYONECANPAY`, leaving room for the delegator's connector input.
pub fn build_forfeit(
    vtxo: &ExtendedVirtualCoin,
    leaf: &TapLeafScript,
    forfeit_script: &ScriptBuf,
) -> Result<Psbt, DelegateError> {
    let control_block = leaf
        .control_block()
        .map_err(|_| DelegateError::MissingDelegatorLeaf(vtxo.outpoint))?;
    let tx = Transaction {
        version: 2,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: vtxo.outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: vtxo.value.into_inner(),
            script_pubkey: forfeit_script.clone(),
        }],
    };
    let mut psbt = Psbt::from_unsigned_tx(tx)?;
    let input = &mut psbt.inputs[0];
    input.witness_utxo = Some(TxOut {
        value: vtxo.value.into_inner(),
        script_pubkey: vtxo.script.clone(),
    });
    input
        .tap_scripts
        .insert(control_block, (leaf.script.clone(), LeafVersion::TapScript));
    input.sighash_type = Some(PsbtSighashType::from(
        TapSighashType::AllPlusAnyoneCanPay,
    ));
    Ok(psbt)
}

pub async fn sign_forfeit(identity: &dyn Identity, psbt: Psbt) -> Result<String, DelegateError> {
    let signed = identity.sign(psbt, Some(&[0][..])).await?;
    Ok(STANDARD.encode(signed.serialize()))
}
