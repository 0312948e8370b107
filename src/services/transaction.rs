use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::abi::DSProxy;
use crate::config::{roles, TransactionSettings};
use crate::container::{Service, ServiceHandle, ServiceManager};
use crate::error::{Error, Result};
use crate::models::receipt::Receipt;
use crate::services::accounts::AccountsService;
use crate::services::event::{EventService, TRANSACTION_FAILED, TRANSACTION_MINED, TRANSACTION_PENDING};
use crate::services::web3::Web3Service;
use crate::utils::to_quantity;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxOptions {
    pub value: Option<U256>,
    pub gas_limit: Option<u64>,
    /// Route the call through this DSProxy's `execute(address,bytes)`.
    pub ds_proxy: Option<Address>,
}

impl TxOptions {
    pub fn with_value(value: U256) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn via_proxy(proxy: Address) -> Self {
        Self {
            ds_proxy: Some(proxy),
            ..Self::default()
        }
    }
}

/// Sends transactions from the current account and hands back a
/// [`TransactionObject`] that can be awaited until mined.
pub struct TransactionManager {
    manager: ServiceManager,
    settings: TransactionSettings,
}

impl TransactionManager {
    pub fn new(settings: TransactionSettings) -> Self {
        Self {
            manager: ServiceManager::new(roles::TRANSACTION_MANAGER)
                .dependency(roles::WEB3)
                .dependency(roles::ACCOUNTS)
                .dependency(roles::EVENT),
            settings,
        }
    }

    /// Build the `eth_sendTransaction` object; proxied calls become
    /// `execute(target, data)` on the proxy.
    pub fn build_transaction(
        from: Address,
        to: Address,
        data: Vec<u8>,
        options: &TxOptions,
    ) -> Value {
        let (to, data) = match options.ds_proxy {
            Some(proxy) => (
                proxy,
                DSProxy::executeCall {
                    target: to,
                    data: data.into(),
                }
                .abi_encode(),
            ),
            None => (to, data),
        };

        let mut tx = Map::new();
        tx.insert("from".into(), json!(from.to_string()));
        tx.insert("to".into(), json!(to.to_string()));
        if !data.is_empty() {
            tx.insert("data".into(), json!(format!("0x{}", hex::encode(&data))));
        }
        if let Some(value) = options.value {
            tx.insert("value".into(), json!(to_quantity(value)));
        }
        if let Some(gas) = options.gas_limit {
            tx.insert("gas".into(), json!(to_quantity(U256::from(gas))));
        }
        Value::Object(tx)
    }

    pub async fn send(
        &self,
        to: Address,
        data: Vec<u8>,
        options: TxOptions,
        label: &str,
    ) -> Result<TransactionObject> {
        let web3 = self.manager.get::<Web3Service>(roles::WEB3)?;
        let events = self.manager.get::<EventService>(roles::EVENT)?;
        let from = self.manager.get::<AccountsService>(roles::ACCOUNTS)?.current_address()?;

        let tx = Self::build_transaction(from, to, data, &options);
        let hash = match web3.send_transaction(tx).await {
            Ok(hash) => hash,
            Err(e) => {
                events.emit(TRANSACTION_FAILED, json!({ "label": label, "error": e.to_string() }));
                return Err(e);
            }
        };

        tracing::info!(%hash, label, "transaction sent");
        events.emit(
            TRANSACTION_PENDING,
            json!({ "hash": hash.to_string(), "label": label, "to": to.to_string() }),
        );

        Ok(TransactionObject {
            hash,
            label: label.to_string(),
            web3,
            events,
            settings: self.settings.clone(),
        })
    }
}

#[async_trait]
impl Service for TransactionManager {
    fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    fn into_handle(self: Arc<Self>) -> ServiceHandle {
        self
    }
}

/// A sent transaction.
pub struct TransactionObject {
    hash: B256,
    label: String,
    web3: Arc<Web3Service>,
    events: Arc<EventService>,
    settings: TransactionSettings,
}

impl std::fmt::Debug for TransactionObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionObject")
            .field("hash", &self.hash)
            .field("label", &self.label)
            .finish()
    }
}

impl TransactionObject {
    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Poll for the receipt until the transaction is mined.
    pub async fn mined(&self) -> Result<Receipt> {
        for _ in 0..self.settings.max_polls {
            if let Some(receipt) = self.web3.transaction_receipt(self.hash).await? {
                let payload = json!({
                    "hash": self.hash.to_string(),
                    "label": self.label,
                    "block": receipt.block_number,
                });
                if !receipt.status {
                    tracing::warn!(hash = %self.hash, label = %self.label, "transaction reverted");
                    self.events.emit(TRANSACTION_FAILED, payload);
                    return Err(Error::TransactionFailed {
                        hash: self.hash.to_string(),
                    });
                }
                tracing::info!(hash = %self.hash, block = receipt.block_number, "transaction mined");
                self.events.emit(TRANSACTION_MINED, payload);
                return Ok(receipt);
            }
            tokio::time::sleep(Duration::from_millis(self.settings.poll_interval_ms)).await;
        }

        self.events.emit(
            TRANSACTION_FAILED,
            json!({ "hash": self.hash.to_string(), "label": self.label, "error": "timeout" }),
        );
        Err(Error::Timeout {
            hash: self.hash.to_string(),
            polls: self.settings.max_polls,
        })
    }
}
