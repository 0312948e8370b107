use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use async_trait::async_trait;

use crate::config::roles;
use crate::container::{Service, ServiceHandle, ServiceManager};
use crate::error::{Error, Result};
use crate::services::addresses;
use crate::services::transaction::{TransactionManager, TransactionObject, TxOptions};
use crate::services::web3::Web3Service;

/// A deployed contract the library talks to.
#[derive(Clone)]
pub struct Contract {
    name: String,
    address: Address,
    web3: Arc<Web3Service>,
    transactions: Arc<TransactionManager>,
}

impl std::fmt::Debug for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Contract")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish()
    }
}

impl Contract {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// `eth_call` a typed function and decode its return values.
    pub async fn call<C: SolCall>(&self, call: &C) -> Result<C::Return> {
        tracing::debug!(contract = %self.name, signature = C::SIGNATURE, "call");
        let data = call.abi_encode();
        let output = self.web3.call(self.address, &data).await?;
        Ok(C::abi_decode_returns(&output, false)?)
    }

    pub async fn send<C: SolCall>(&self, call: &C, options: TxOptions) -> Result<TransactionObject> {
        let label = format!("{}.{}", self.name, C::SIGNATURE);
        self.send_calldata(call.abi_encode(), options, &label).await
    }

    /// Send pre-encoded calldata, for entry points chosen at runtime.
    pub async fn send_calldata(
        &self,
        data: Vec<u8>,
        options: TxOptions,
        label: &str,
    ) -> Result<TransactionObject> {
        self.transactions.send(self.address, data, options, label).await
    }
}

/// Resolves contract names to addresses for the connected network.
pub struct SmartContractService {
    manager: ServiceManager,
    overrides: BTreeMap<String, Address>,
    addresses_file: Option<PathBuf>,
    addresses: RwLock<BTreeMap<String, Address>>,
}

impl SmartContractService {
    pub fn new(overrides: BTreeMap<String, Address>, addresses_file: Option<PathBuf>) -> Self {
        Self {
            manager: ServiceManager::new(roles::SMART_CONTRACT)
                .dependency(roles::WEB3)
                .dependency(roles::TRANSACTION_MANAGER),
            overrides,
            addresses_file,
            addresses: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn address_of(&self, name: &str) -> Result<Address> {
        self.addresses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownContract {
                name: name.to_string(),
            })
    }

    pub fn contract_names(&self) -> Vec<String> {
        self.addresses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn contract_by_name(&self, name: &str) -> Result<Contract> {
        let address = self.address_of(name)?;
        self.contract_at(name, address)
    }

    /// A contract handle for an address outside the registry (e.g. a user's DSProxy).
    pub fn contract_at(&self, name: &str, address: Address) -> Result<Contract> {
        Ok(Contract {
            name: name.to_string(),
            address,
            web3: self.manager.get::<Web3Service>(roles::WEB3)?,
            transactions: self.manager.get::<TransactionManager>(roles::TRANSACTION_MANAGER)?,
        })
    }
}

#[async_trait]
impl Service for SmartContractService {
    fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    fn into_handle(self: Arc<Self>) -> ServiceHandle {
        self
    }

    async fn connect(&self) -> Result<()> {
        let network = self.manager.get::<Web3Service>(roles::WEB3)?.network_id()?;
        // Later sources win: bundled, then file, then explicit overrides.
        let mut resolved = addresses::defaults_for_network(network);
        if let Some(path) = &self.addresses_file {
            resolved.extend(addresses::load_from_file(path)?);
        }
        resolved.extend(self.overrides.iter().map(|(k, v)| (k.clone(), *v)));

        tracing::info!(network, contracts = resolved.len(), "contract addresses resolved");
        *self.addresses.write().unwrap_or_else(PoisonError::into_inner) = resolved;
        Ok(())
    }
}
