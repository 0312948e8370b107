use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use alloy_primitives::{address, Address};

use crate::config::MAINNET_NETWORK_ID;
use crate::error::{Error, Result};

pub const SAI_TUB: &str = "SAI_TUB";
pub const SAI_TOP: &str = "SAI_TOP";
pub const SAI_TAP: &str = "SAI_TAP";
pub const SAI_PIP: &str = "SAI_PIP";
pub const SAI_PEP: &str = "SAI_PEP";
pub const SAI_VOX: &str = "SAI_VOX";
pub const SAI_SKR: &str = "SAI_SKR";
pub const SAI_GEM: &str = "SAI_GEM";
pub const SAI: &str = "SAI";
pub const SAI_SIN: &str = "SAI_SIN";
pub const MKR: &str = "MKR";
pub const OLD_MKR: &str = "OLD_MKR";
pub const MAKER_OTC: &str = "MAKER_OTC";
pub const OASIS_PROXY: &str = "OASIS_PROXY";
pub const PROXY_CREATION_AND_EXECUTE: &str = "PROXY_CREATION_AND_EXECUTE";
pub const PROXY_REGISTRY: &str = "PROXY_REGISTRY";
pub const SAI_PROXY: &str = "SAI_PROXY";
/// Not a deployed singleton: the user's proxy, created through the registry.
pub const DS_PROXY: &str = "DS_PROXY";

const MAINNET: &[(&str, Address)] = &[
    (SAI_TUB, address!("448a5065aebb8e423f0896e6c5d525c040f59af3")),
    (SAI_TOP, address!("9b0ccf7c8994e19f39b2b4cf708e0a7df65fa8a3")),
    (SAI_TAP, address!("bda109309f9fafa6dd6a9cb9f1df4085b27ee8ef")),
    (SAI_PIP, address!("729d19f657bd0614b4985cf1d82531c67569197b")),
    (SAI_PEP, address!("99041f808d598b782d5a3e498681c2452a31da08")),
    (SAI_VOX, address!("9b0f70df76165442ca6092939132bbaea77f2d7a")),
    (SAI_SKR, address!("f53ad2c6851052a81b42133467480961b2321c09")),
    (SAI_GEM, address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2")),
    (SAI, address!("89d24a6b4ccb1b6faa2625fe562bdd9a23260359")),
    (MKR, address!("9f8f72aa9304c8b593d555f12ef6589cc3a579a2")),
    (OLD_MKR, address!("c66ea802717bfb9833400264dd12c2bceaa34a6d")),
    (MAKER_OTC, address!("39755357759ce0d7f32dc8dc45414cca409ae24e")),
    (OASIS_PROXY, address!("279594b6843014376a422ebb26a6eab7a30e36f0")),
    (PROXY_CREATION_AND_EXECUTE, address!("793ebbe21607e4f04788f89c7a9b97320773ec59")),
    (PROXY_REGISTRY, address!("4678f0a6958e4d2bc4f1baf7bc52e8f3564f3fe4")),
    (SAI_PROXY, address!("526af336d614ade5cc252a407062b8861af998f5")),
];

/// Addresses bundled for a network; empty for local and unknown networks.
pub fn defaults_for_network(network_id: u64) -> BTreeMap<String, Address> {
    let table: &[(&str, Address)] = match network_id {
        MAINNET_NETWORK_ID => MAINNET,
        _ => &[],
    };
    table
        .iter()
        .map(|(name, address)| (name.to_string(), *address))
        .collect()
}

/// Load a JSON object of `{ "CONTRACT_NAME": "0x..." }`.
pub fn load_from_file(path: &Path) -> Result<BTreeMap<String, Address>> {
    let file = File::open(path).map_err(|e| {
        Error::config(format!("failed to open addresses file {}: {}", path.display(), e))
    })?;
    let reader = BufReader::new(file);
    let addresses = serde_json::from_reader(reader).map_err(|e| {
        Error::config(format!("failed to parse addresses file {}: {}", path.display(), e))
    })?;
    Ok(addresses)
}
