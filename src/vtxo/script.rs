use serde::{Deserialize, Serialize};

use std::str::FromStr;

use super::entity::{ExtendedVirtualCoin, VirtualCoin};
use crate::primitives::bitcoin::{
    opcodes::all::{OP_CHECKSIG, OP_CHECKSIGVERIFY},
    secp256k1, taproot::TaprootError, ControlBlock, Instruction, Script, ScriptBuf,
    XOnlyPublicKey,
};

/// A tapscript leaf together with the control block proving its inclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TapLeafScript {
    #[serde(with = "crate::primitives::hex_bytes")]
    pub control_block: Vec<u8>,
    pub script: ScriptBuf,
}

impl TapLeafScript {
    pub fn control_block(&self) -> Result<ControlBlock, TaprootError> {
        ControlBlock::decode(&self.control_block)
    }

    pub fn multisig_participants(&self) -> Option<Vec<XOnlyPublicKey>> {
        multisig_participants(&self.script)
    }
}

/// The spending paths every coin locked to the wallet's off-chain script shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VtxoScriptTemplate {
    pub pk_script: ScriptBuf,
    pub forfeit: TapLeafScript,
    pub exit: TapLeafScript,
    pub leaves: Vec<TapLeafScript>,
}

impl VtxoScriptTemplate {
    /// Both the collaborative and the unilateral path are known.
    pub fn has_spending_paths(&self) -> bool {
        !self.forfeit.script.is_empty() && !self.exit.script.is_empty()
    }

    pub fn extend(&self, coin: VirtualCoin) -> ExtendedVirtualCoin {
        ExtendedVirtualCoin {
            coin,
            forfeit_tap_leaf: self.forfeit.clone(),
            intent_tap_leaf: self.exit.clone(),
            tap_tree: self.leaves.clone(),
        }
    }
}

/// Returns the signer set of a `<pk> CHECKSIGVERIFY ... <pk> CHECKSIG` leaf.
pub fn multisig_participants(script: &Script) -> Option<Vec<XOnlyPublicKey>> {
    let mut keys = Vec::new();
    let mut instructions = script.instructions();
    loop {
        let key = match instructions.next()? {
            Ok(Instruction::PushBytes(bytes)) => {
                XOnlyPublicKey::from_slice(bytes.as_bytes()).ok()?
            }
            _ => return None,
        };
        keys.push(key);
        match instructions.next()? {
            Ok(Instruction::Op(op)) if op == OP_CHECKSIGVERIFY => continue,
            Ok(Instruction::Op(op)) if op == OP_CHECKSIG => break,
            _ => return None,
        }
    }
    if instructions.next().is_some() {
        return None;
    }
    Some(keys)
}

pub fn find_leaf_with_participant<'a>(
    leaves: &'a [TapLeafScript],
    key: &XOnlyPublicKey,
) -> Option<&'a TapLeafScript> {
    leaves.iter().find(|leaf| {
        leaf.multisig_participants()
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    })
}

/// Parses a hex key, dropping the parity byte of a 33 byte compressed encoding.
pub fn parse_x_only_key(key: &str) -> Result<XOnlyPublicKey, secp256k1::Error> {
    let key = match key.get(2..) {
        Some(x_only) if key.len() == 66 => x_only,
        _ => key,
    };
    XOnlyPublicKey::from_str(key)
}
