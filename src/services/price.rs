use std::sync::Arc;

use alloy_primitives::{B256, U256};
use async_trait::async_trait;

use crate::abi::{DSValue, SaiTub};
use crate::config::roles;
use crate::container::{Service, ServiceHandle, ServiceManager};
use crate::error::Result;
use crate::models::currency::{self, Currency, CurrencyUnit};
use crate::models::receipt::Receipt;
use crate::services::addresses;
use crate::services::smart_contract::{Contract, SmartContractService};
use crate::services::transaction::TxOptions;
use crate::utils::ray_to_f64;

/// Reads (and on test chains, writes) the ETH and MKR price feeds.
pub struct PriceService {
    manager: ServiceManager,
}

impl PriceService {
    pub fn new() -> Self {
        Self {
            manager: ServiceManager::new(roles::PRICE)
                .dependency(roles::SMART_CONTRACT),
        }
    }

    fn contract(&self, name: &str) -> Result<Contract> {
        self.manager
            .get::<SmartContractService>(roles::SMART_CONTRACT)?
            .contract_by_name(name)
    }

    async fn read_feed(&self, feed: &str, unit: CurrencyUnit) -> Result<Currency> {
        let read = self.contract(feed)?.call(&DSValue::readCall {}).await?;
        Ok(unit.wei(U256::from_be_bytes(read.value.0)))
    }

    async fn poke_feed(&self, feed: &str, value: &str, unit: CurrencyUnit) -> Result<Receipt> {
        let value = B256::from(unit.parse(value)?.wei().to_be_bytes::<32>());
        let tx = self
            .contract(feed)?
            .send(&DSValue::pokeCall { value }, TxOptions::default())
            .await?;
        tx.mined().await
    }

    pub async fn get_eth_price(&self) -> Result<Currency> {
        self.read_feed(addresses::SAI_PIP, CurrencyUnit::UsdEth).await
    }

    /// Only works against a feed that accepts `poke(bytes32)` from the account, as on test chains.
    pub async fn set_eth_price(&self, value: &str) -> Result<Receipt> {
        self.poke_feed(addresses::SAI_PIP, value, CurrencyUnit::UsdEth).await
    }

    pub async fn get_mkr_price(&self) -> Result<Currency> {
        self.read_feed(addresses::SAI_PEP, CurrencyUnit::UsdMkr).await
    }

    pub async fn set_mkr_price(&self, value: &str) -> Result<Receipt> {
        self.poke_feed(addresses::SAI_PEP, value, CurrencyUnit::UsdMkr).await
    }

    /// USD value of one PETH, from the tub's `tag()`.
    pub async fn get_peth_price(&self) -> Result<Currency> {
        let tag = self
            .contract(addresses::SAI_TUB)?
            .call(&SaiTub::tagCall {})
            .await?;
        Ok(CurrencyUnit::UsdPeth.ray(tag.ray))
    }

    /// WETH backing one PETH, from the tub's `per()`.
    pub async fn get_weth_to_peth_ratio(&self) -> Result<f64> {
        let per = self
            .contract(addresses::SAI_TUB)?
            .call(&SaiTub::perCall {})
            .await?;
        ray_to_f64(per.ray)
    }

    pub fn value_for_contract(&self, value: &str, unit: CurrencyUnit) -> Result<String> {
        currency::value_for_contract(value, unit)
    }
}

impl Default for PriceService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for PriceService {
    fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    fn into_handle(self: Arc<Self>) -> ServiceHandle {
        self
    }
}
