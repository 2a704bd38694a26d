pub mod error;

use std::{fmt, str::FromStr};

use crate::primitives::bitcoin::{
    bech32::{self, FromBase32, ToBase32, Variant},
    Address, Network, NetworkUnchecked, ScriptBuf, TweakedPublicKey, XOnlyPublicKey,
};
use error::AddressError;

const MAINNET_HRP: &str = "ark";
const TESTNET_HRP: &str = "tark";
const PAYLOAD_LEN: usize = 1 + 32 + 32;

/// An off-chain address: the coordinator key plus the taproot key coins are locked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArkAddress {
    hrp: String,
    version: u8,
    server_key: XOnlyPublicKey,
    vtxo_key: XOnlyPublicKey,
}

impl ArkAddress {
    pub fn new(mainnet: bool, server_key: XOnlyPublicKey, vtxo_key: XOnlyPublicKey) -> Self {
        Self {
            hrp: if mainnet { MAINNET_HRP } else { TESTNET_HRP }.to_string(),
            version: 0,
            server_key,
            vtxo_key,
        }
    }

    pub fn server_key(&self) -> XOnlyPublicKey {
        self.server_key
    }

    pub fn vtxo_key(&self) -> XOnlyPublicKey {
        self.vtxo_key
    }

    pub fn script_pubkey(&self) -> ScriptBuf {
        ScriptBuf::new_v1_p2tr_tweaked(TweakedPublicKey::dangerous_assume_tweaked(
            self.vtxo_key,
        ))
    }
}

impl FromStr for ArkAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hrp, data, variant) = bech32::decode(s)?;
        if hrp != MAINNET_HRP && hrp != TESTNET_HRP {
            return Err(AddressError::UnknownPrefix(hrp));
        }
        if variant != Variant::Bech32m {
            return Err(AddressError::UnsupportedVariant);
        }
        let payload = Vec::<u8>::from_base32(&data)?;
        if payload.len() != PAYLOAD_LEN {
            return Err(AddressError::InvalidLength(payload.len()));
        }
        Ok(Self {
            hrp,
            version: payload[0],
            server_key: XOnlyPublicKey::from_slice(&payload[1..33])?,
            vtxo_key: XOnlyPublicKey::from_slice(&payload[33..])?,
        })
    }
}

impl fmt::Display for ArkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        payload.push(self.version);
        payload.extend_from_slice(&self.server_key.serialize());
        payload.extend_from_slice(&self.vtxo_key.serialize());
        let encoded = bech32::encode(&self.hrp, payload.to_base32(), Variant::Bech32m)
            .map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

/// Maps the coordinator's network name onto a bitcoin network.
pub fn parse_network(name: &str) -> Result<Network, AddressError> {
    match name {
        "bitcoin" | "mainnet" => Ok(Network::Bitcoin),
        "testnet" => Ok(Network::Testnet),
        "signet" | "mutinynet" => Ok(Network::Signet),
        "regtest" => Ok(Network::Regtest),
        other => Err(AddressError::UnknownNetwork(other.to_string())),
    }
}

pub fn onchain_script(address: &str, network: Network) -> Result<ScriptBuf, AddressError> {
    let address: Address<NetworkUnchecked> = address.parse()?;
    Ok(address.require_network(network)?.script_pubkey())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const VTXO: &str = "c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";

    #[test]
    fn encodes_and_decodes() {
        let address = ArkAddress::new(
            false,
            XOnlyPublicKey::from_str(SERVER).unwrap(),
            XOnlyPublicKey::from_str(VTXO).unwrap(),
        );
        let encoded = address.to_string();
        assert!(encoded.starts_with("tark1"));
        let decoded: ArkAddress = encoded.parse().unwrap();
        assert_eq!(decoded, address);
        assert!(decoded.script_pubkey().is_v1_p2tr());
    }

    #[test]
    fn rejects_foreign_prefix() {
        let err = "bc1qc7yu0g5qplddngesxuarkkp3na9hkrugpydqs0"
            .parse::<ArkAddress>()
            .unwrap_err();
        assert!(matches!(err, AddressError::UnknownPrefix(_)));
    }

    #[test]
    fn maps_network_names() {
        assert_eq!(parse_network("mutinynet").unwrap(), Network::Signet);
        assert!(parse_network("liquid").is_err());
    }
}
