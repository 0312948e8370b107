use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::abi::{DSProxy, ProxyRegistry};
use crate::config::roles;
use crate::container::{Service, ServiceHandle, ServiceManager};
use crate::error::{Error, Result};
use crate::services::accounts::AccountsService;
use crate::services::addresses;
use crate::services::smart_contract::SmartContractService;
use crate::services::transaction::TxOptions;

/// Looks up and creates the DSProxy owned by the current account.
pub struct DsProxyService {
    manager: ServiceManager,
}

impl DsProxyService {
    pub fn new() -> Self {
        Self {
            manager: ServiceManager::new(roles::PROXY)
                .dependency(roles::SMART_CONTRACT)
                .dependency(roles::ACCOUNTS),
        }
    }

    fn contracts(&self) -> Result<Arc<SmartContractService>> {
        self.manager.get::<SmartContractService>(roles::SMART_CONTRACT)
    }

    /// The registry's proxy for `owner`; a zero address means none was built.
    pub async fn proxy_of(&self, owner: Address) -> Result<Option<Address>> {
        let proxy = self
            .contracts()?
            .contract_by_name(addresses::PROXY_REGISTRY)?
            .call(&ProxyRegistry::proxiesCall { owner })
            .await?
            .proxy;
        Ok((proxy != Address::ZERO).then_some(proxy))
    }

    pub async fn current_proxy(&self) -> Result<Option<Address>> {
        let owner = self
            .manager
            .get::<AccountsService>(roles::ACCOUNTS)?
            .current_address()?;
        self.proxy_of(owner).await
    }

    /// Build a proxy for the current account through the registry.
    pub async fn build(&self) -> Result<Address> {
        let tx = self
            .contracts()?
            .contract_by_name(addresses::PROXY_REGISTRY)?
            .send(&ProxyRegistry::buildCall {}, TxOptions::default())
            .await?;
        let receipt = tx.mined().await?;
        let proxy = self.current_proxy().await?.ok_or_else(|| Error::MissingEvent {
            event: "ProxyRegistry.proxies".to_string(),
            hash: receipt.transaction_hash.to_string(),
        })?;
        tracing::info!(%proxy, "built DSProxy");
        Ok(proxy)
    }

    pub async fn ensure_proxy(&self) -> Result<Address> {
        match self.current_proxy().await? {
            Some(proxy) => Ok(proxy),
            None => self.build().await,
        }
    }

    pub async fn get_owner(&self, proxy: Address) -> Result<Address> {
        self.contracts()?
            .contract_at(addresses::DS_PROXY, proxy)?
            .call(&DSProxy::ownerCall {})
            .await
            .map(|ret| ret.owner)
    }
}

impl Default for DsProxyService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for DsProxyService {
    fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    fn into_handle(self: Arc<Self>) -> ServiceHandle {
        self
    }
}
