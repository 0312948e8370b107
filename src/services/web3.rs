use std::sync::{Arc, OnceLock};

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::roles;
use crate::container::{Service, ServiceHandle, ServiceManager};
use crate::error::{Error, Result};
use crate::models::receipt::{parse_b256, Receipt};
use crate::rpc::Transport;
use crate::utils::{decode_hex_data, parse_quantity, parse_quantity_u64};

/// Thin typed layer over the node's JSON-RPC interface.
pub struct Web3Service {
    manager: ServiceManager,
    transport: Arc<dyn Transport>,
    expected_network: Option<u64>,
    network_id: OnceLock<u64>,
}

impl Web3Service {
    pub fn new(transport: Arc<dyn Transport>, expected_network: Option<u64>) -> Self {
        Self {
            manager: ServiceManager::new(roles::WEB3),
            transport,
            expected_network,
            network_id: OnceLock::new(),
        }
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.transport.request(method, params).await
    }

    async fn request_str(&self, method: &str, params: Value) -> Result<String> {
        let value = self.request(method, params).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| Error::invalid_response(format!("{} returned {}", method, value)))
    }

    pub fn network_id(&self) -> Result<u64> {
        self.network_id.get().copied().ok_or_else(|| Error::ServiceNotReady {
            role: roles::WEB3.to_string(),
            stage: "connected".to_string(),
        })
    }

    pub async fn net_version(&self) -> Result<u64> {
        let version = self.request_str("net_version", json!([])).await?;
        version
            .parse::<u64>()
            .map_err(|e| Error::invalid_response(format!("net_version {}: {}", version, e)))
    }

    pub async fn block_number(&self) -> Result<u64> {
        let number = self.request_str("eth_blockNumber", json!([])).await?;
        parse_quantity_u64(&number)
    }

    pub async fn balance_of(&self, address: Address) -> Result<U256> {
        let balance = self
            .request_str("eth_getBalance", json!([address.to_string(), "latest"]))
            .await?;
        parse_quantity(&balance)
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        let value = self.request("eth_accounts", json!([])).await?;
        let entries = value
            .as_array()
            .ok_or_else(|| Error::invalid_response("eth_accounts did not return a list"))?;
        entries
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .and_then(|s| s.parse::<Address>().ok())
                    .ok_or_else(|| Error::invalid_response(format!("bad account {}", entry)))
            })
            .collect()
    }

    pub async fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>> {
        let result = self
            .request_str(
                "eth_call",
                json!([{ "to": to.to_string(), "data": format!("0x{}", hex::encode(data)) }, "latest"]),
            )
            .await?;
        decode_hex_data(&result)
    }

    pub async fn send_transaction(&self, transaction: Value) -> Result<B256> {
        let hash = self
            .request_str("eth_sendTransaction", json!([transaction]))
            .await?;
        parse_b256(&hash)
    }

    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        let value = self
            .request("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        Receipt::from_json(&value).map(Some)
    }
}

#[async_trait]
impl Service for Web3Service {
    fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    fn into_handle(self: Arc<Self>) -> ServiceHandle {
        self
    }

    async fn connect(&self) -> Result<()> {
        let network = self.net_version().await?;
        if let Some(expected) = self.expected_network {
            if expected != network {
                return Err(Error::NetworkMismatch {
                    expected,
                    actual: network,
                });
            }
        }
        if let Err(network) = self.network_id.set(network) {
            // Reconnecting must find the node on the network it started on.
            let known = self.network_id()?;
            if known != network {
                return Err(Error::NetworkMismatch {
                    expected: known,
                    actual: network,
                });
            }
            tracing::debug!(network, "already connected");
            return Ok(());
        }
        tracing::info!(network, "connected to node");
        Ok(())
    }
}
