use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

pub mod bitcoin {
    pub use bdk::bitcoin::{
        absolute::LockTime,
        address::{self, NetworkUnchecked},
        bech32, consensus,
        hashes::{self, sha256, Hash, HashEngine},
        key::TweakedPublicKey,
        opcodes,
        psbt::{self, PartiallySignedTransaction as Psbt, PsbtSighashType},
        script::{self, Builder as ScriptBuilder, Instruction},
        secp256k1::{self, XOnlyPublicKey},
        sighash::TapSighashType,
        taproot::{self, ControlBlock, LeafVersion},
        Address, Network, OutPoint, Script, ScriptBuf, Sequence, Transaction,
        TxIn, TxOut, Txid, Witness,
    };
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Satoshis(u64);

impl Satoshis {
    pub const ZERO: Self = Self(0);

    /// Converts an evaluated fee into whole satoshis, rounding up and clamping
    /// negative results to zero.
    pub fn from_fee(fee: Decimal) -> Self {
        if fee.is_sign_negative() {
            return Self::ZERO;
        }
        Self(fee.ceil().to_u64().unwrap_or(u64::MAX))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }

    pub fn checked_sub(self, rhs: Satoshis) -> Option<Satoshis> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn saturating_sub(self, rhs: Satoshis) -> Satoshis {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl std::fmt::Display for Satoshis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Satoshis {
    fn from(sats: u64) -> Self {
        Self(sats)
    }
}

impl From<Satoshis> for u64 {
    fn from(sats: Satoshis) -> u64 {
        sats.0
    }
}

impl From<Satoshis> for Decimal {
    fn from(sats: Satoshis) -> Decimal {
        Decimal::from(sats.0)
    }
}

impl std::ops::Add<Satoshis> for Satoshis {
    type Output = Satoshis;
    fn add(self, rhs: Satoshis) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign<Satoshis> for Satoshis {
    fn add_assign(&mut self, rhs: Satoshis) {
        *self = Self(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Satoshis {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Satoshis::ZERO, |a, b| a + b)
    }
}

impl<'a> std::iter::Sum<&'a Satoshis> for Satoshis {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Satoshis::ZERO, |a, b| a + *b)
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
