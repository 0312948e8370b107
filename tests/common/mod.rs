#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};

use alloy_sol_types::{SolCall, SolEvent};

use maker_dai_rs::abi::{self, DSProxy, SaiTub};
use maker_dai_rs::config::MakerOptions;
use maker_dai_rs::rpc::Transport;
use maker_dai_rs::services::addresses;
use maker_dai_rs::{Error, Maker, Result};

pub const NETWORK: &str = "999";

pub fn addr(last: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    Address::from(bytes)
}

pub fn account() -> Address {
    Address::repeat_byte(0x16)
}

pub fn wad(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18))
}

pub fn ray(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(27))
}

pub fn word(value: U256) -> Vec<u8> {
    value.to_be_bytes::<32>().to_vec()
}

pub fn address_word(address: Address) -> Vec<u8> {
    address.into_word().to_vec()
}

pub fn words(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

/// Every contract the library knows about, at a fixed local address.
pub const CONTRACTS: &[(&str, u8)] = &[
    (addresses::SAI_TUB, 0xa1),
    (addresses::SAI_TOP, 0xa2),
    (addresses::SAI_TAP, 0xa3),
    (addresses::SAI_PIP, 0xa4),
    (addresses::SAI_PEP, 0xa5),
    (addresses::SAI_VOX, 0xa6),
    (addresses::SAI_SKR, 0xa7),
    (addresses::SAI_GEM, 0xa8),
    (addresses::SAI, 0xa9),
    (addresses::SAI_SIN, 0xaa),
    (addresses::MKR, 0xab),
    (addresses::OLD_MKR, 0xac),
    (addresses::MAKER_OTC, 0xad),
    (addresses::OASIS_PROXY, 0xae),
    (addresses::PROXY_CREATION_AND_EXECUTE, 0xaf),
    (addresses::PROXY_REGISTRY, 0xb0),
    (addresses::SAI_PROXY, 0xb1),
];

pub fn contract(name: &str) -> Address {
    CONTRACTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, last)| addr(*last))
        .unwrap_or_else(|| panic!("no test address for {}", name))
}

pub fn options() -> MakerOptions {
    CONTRACTS.iter().fold(MakerOptions::default(), |options, (name, last)| {
        options.with_address(name, addr(*last))
    })
}

/// A transaction the chain accepted.
#[derive(Debug, Clone)]
pub struct SentTx {
    pub hash: B256,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: Option<U256>,
}

impl SentTx {
    pub fn selector(&self) -> [u8; 4] {
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.data[..4]);
        out
    }

    pub fn calls<C: SolCall>(&self) -> bool {
        self.data.len() >= 4 && self.selector() == C::SELECTOR
    }

    pub fn decode<C: SolCall>(&self) -> C {
        C::abi_decode(&self.data, true).unwrap()
    }

    /// The call a DSProxy `execute` forwards, with its target.
    pub fn executed<C: SolCall>(&self) -> (Address, C) {
        let execute = self.decode::<DSProxy::executeCall>();
        (execute.target, C::abi_decode(&execute.data, true).unwrap())
    }
}

struct Reaction {
    to: Address,
    selector: [u8; 4],
    updates: Vec<(Address, [u8; 4], Vec<u8>)>,
}

/// In-memory node: answers `eth_call` from a table keyed by target and
/// selector (128 zero bytes when unset), accepts every transaction and
/// mines it immediately.
#[derive(Default)]
pub struct MockChain {
    calls: Mutex<HashMap<(Address, [u8; 4]), Vec<u8>>>,
    balances: Mutex<HashMap<Address, U256>>,
    sent: Mutex<Vec<SentTx>>,
    next_logs: Mutex<VecDeque<Vec<Value>>>,
    logs: Mutex<HashMap<B256, Vec<Value>>>,
    reactions: Mutex<Vec<Reaction>>,
    requests: Mutex<Vec<String>>,
    revert: Mutex<bool>,
    reject: Mutex<bool>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn transport(self: &Arc<Self>) -> Arc<dyn Transport> {
        Arc::clone(self) as Arc<dyn Transport>
    }

    pub fn set_call<C: SolCall>(&self, to: Address, data: Vec<u8>) {
        self.calls.lock().unwrap().insert((to, C::SELECTOR), data);
    }

    pub fn set_balance(&self, owner: Address, wei: U256) {
        self.balances.lock().unwrap().insert(owner, wei);
    }

    /// Attach logs to the receipt of the next transaction sent.
    pub fn push_logs(&self, logs: Vec<Value>) {
        self.next_logs.lock().unwrap().push_back(logs);
    }

    /// Once `S` is sent to `to`, answer `C` on `target` with `data`.
    pub fn after_send<S: SolCall, C: SolCall>(&self, to: Address, target: Address, data: Vec<u8>) {
        self.reactions.lock().unwrap().push(Reaction {
            to,
            selector: S::SELECTOR,
            updates: vec![(target, C::SELECTOR, data)],
        });
    }

    /// Mine every later transaction with a failed status.
    pub fn revert_transactions(&self) {
        *self.revert.lock().unwrap() = true;
    }

    /// Refuse every later `eth_sendTransaction`.
    pub fn reject_transactions(&self) {
        *self.reject.lock().unwrap() = true;
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    fn eth_call(&self, params: &Value) -> Result<Value> {
        let to: Address = params[0]["to"].as_str().unwrap().parse().unwrap();
        let data = hex::decode(params[0]["data"].as_str().unwrap().trim_start_matches("0x")).unwrap();
        let mut key = [0u8; 4];
        key.copy_from_slice(&data[..4]);
        let result = self
            .calls
            .lock()
            .unwrap()
            .get(&(to, key))
            .cloned()
            .unwrap_or_else(|| vec![0u8; 128]);
        Ok(json!(format!("0x{}", hex::encode(result))))
    }

    fn send_transaction(&self, params: &Value) -> Result<Value> {
        if *self.reject.lock().unwrap() {
            return Err(Error::Rpc {
                code: -32000,
                message: "insufficient funds for gas * price + value".to_string(),
            });
        }
        let tx = &params[0];
        let to: Address = tx["to"].as_str().unwrap().parse().unwrap();
        let data = tx["data"]
            .as_str()
            .map(|d| hex::decode(d.trim_start_matches("0x")).unwrap())
            .unwrap_or_default();
        let value = tx["value"]
            .as_str()
            .map(|v| U256::from_str_radix(v.trim_start_matches("0x"), 16).unwrap());

        let mut sent = self.sent.lock().unwrap();
        let hash = B256::from(U256::from(sent.len() + 1).to_be_bytes::<32>());
        let logs = self.next_logs.lock().unwrap().pop_front().unwrap_or_default();
        self.logs.lock().unwrap().insert(hash, logs);

        if data.len() >= 4 {
            let reactions = self.reactions.lock().unwrap();
            for reaction in reactions.iter() {
                if reaction.to == to && data[..4] == reaction.selector {
                    let mut calls = self.calls.lock().unwrap();
                    for (target, key, response) in &reaction.updates {
                        calls.insert((*target, *key), response.clone());
                    }
                }
            }
        }

        sent.push(SentTx {
            hash,
            to,
            data,
            value,
        });
        Ok(json!(hash.to_string()))
    }

    fn receipt(&self, params: &Value) -> Result<Value> {
        let hash: B256 = params[0].as_str().unwrap().parse().unwrap();
        let logs = self.logs.lock().unwrap().get(&hash).cloned().unwrap_or_default();
        let status = if *self.revert.lock().unwrap() { "0x0" } else { "0x1" };
        Ok(json!({
            "transactionHash": hash.to_string(),
            "blockNumber": "0x2a",
            "gasUsed": "0x5208",
            "status": status,
            "logs": logs,
        }))
    }
}

#[async_trait]
impl Transport for MockChain {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.requests.lock().unwrap().push(method.to_string());
        match method {
            "net_version" => Ok(json!(NETWORK)),
            "eth_accounts" => Ok(json!([account().to_string()])),
            "eth_blockNumber" => Ok(json!("0x2a")),
            "eth_getBalance" => {
                let owner: Address = params[0].as_str().unwrap().parse().unwrap();
                let balance = self.balances.lock().unwrap().get(&owner).copied().unwrap_or_default();
                Ok(json!(format!("0x{:x}", balance)))
            }
            "eth_call" => self.eth_call(&params),
            "eth_sendTransaction" => self.send_transaction(&params),
            "eth_getTransactionReceipt" => self.receipt(&params),
            other => Err(Error::Rpc {
                code: -32601,
                message: format!("method {} not found", other),
            }),
        }
    }
}

/// A `LogNewCup(address indexed lad, bytes32 cup)` entry as the tub emits it.
pub fn new_cup_log(id: u64) -> Value {
    json!({
        "address": contract(addresses::SAI_TUB).to_string(),
        "topics": [
            SaiTub::LogNewCup::SIGNATURE_HASH.to_string(),
            account().into_word().to_string(),
        ],
        "data": abi::cup_id(id).to_string(),
    })
}

pub async fn maker(chain: &Arc<MockChain>) -> Maker {
    Maker::with_transport("test", options(), chain.transport())
        .await
        .unwrap()
}

pub async fn maker_with(chain: &Arc<MockChain>, options: MakerOptions) -> Maker {
    Maker::with_transport("test", options, chain.transport())
        .await
        .unwrap()
}
