use std::sync::Arc;

use alloy_primitives::{Address, U256};
use serde::Serialize;

use crate::abi::SaiTub;
use crate::error::Result;
use crate::models::currency::Currency;
use crate::models::receipt::Receipt;
use crate::services::cdp::EthereumCdpService;

/// Raw `cups(bytes32)` record from the tub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CdpInfo {
    /// owner
    pub lad: Address,
    /// locked PETH
    pub ink: U256,
    /// normalised debt
    pub art: U256,
    /// normalised debt including governance fee
    pub ire: U256,
}

impl From<SaiTub::cupsReturn> for CdpInfo {
    fn from(cup: SaiTub::cupsReturn) -> Self {
        CdpInfo {
            lad: cup.lad,
            ink: cup.ink,
            art: cup.art,
            ire: cup.ire,
        }
    }
}

impl CdpInfo {
    /// Shut or never-opened cups have no owner.
    pub fn exists(&self) -> bool {
        self.lad != Address::ZERO
    }
}

/// A CDP owned directly by an account.
#[derive(Clone)]
pub struct Cdp {
    id: u64,
    service: Arc<EthereumCdpService>,
}

impl Cdp {
    pub fn new(id: u64, service: Arc<EthereumCdpService>) -> Self {
        Self { id, service }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn get_info(&self) -> Result<CdpInfo> {
        self.service.get_info(self.id).await
    }

    pub async fn lock_eth(&self, eth: &Currency) -> Result<Receipt> {
        self.service.lock_eth(self.id, eth).await
    }

    pub async fn lock_weth(&self, weth: &Currency) -> Result<Receipt> {
        self.service.lock_weth(self.id, weth).await
    }

    pub async fn lock_peth(&self, peth: &Currency) -> Result<Receipt> {
        self.service.lock_peth(self.id, peth).await
    }

    pub async fn free_peth(&self, peth: &Currency) -> Result<Receipt> {
        self.service.free_peth(self.id, peth).await
    }

    pub async fn draw_dai(&self, dai: &Currency) -> Result<Receipt> {
        self.service.draw_dai(self.id, dai).await
    }

    pub async fn wipe_dai(&self, dai: &Currency) -> Result<Receipt> {
        self.service.wipe_dai(self.id, dai).await
    }

    pub async fn shut(&self) -> Result<Receipt> {
        self.service.shut_cdp(self.id).await
    }

    pub async fn give(&self, new_owner: Address) -> Result<Receipt> {
        self.service.give_cdp(self.id, new_owner).await
    }

    pub async fn get_collateral_value(&self) -> Result<Currency> {
        self.service.get_collateral_value(self.id).await
    }

    pub async fn get_collateral_value_usd(&self) -> Result<Currency> {
        self.service.get_collateral_value_usd(self.id).await
    }

    pub async fn get_debt_value(&self) -> Result<Currency> {
        self.service.get_debt_value(self.id).await
    }

    pub async fn get_collateralization_ratio(&self) -> Result<Option<f64>> {
        self.service.get_collateralization_ratio(self.id).await
    }

    pub async fn get_liquidation_price(&self) -> Result<Option<Currency>> {
        self.service.get_liquidation_price(self.id).await
    }

    pub async fn is_safe(&self) -> Result<bool> {
        self.service.is_cdp_safe(self.id).await
    }
}

impl std::fmt::Debug for Cdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cdp").field("id", &self.id).finish()
    }
}

/// A CDP held by a DSProxy; writes go through the SaiProxy library.
#[derive(Clone)]
pub struct ProxyCdp {
    cdp: Cdp,
    proxy: Address,
}

impl ProxyCdp {
    pub fn new(id: u64, proxy: Address, service: Arc<EthereumCdpService>) -> Self {
        Self {
            cdp: Cdp::new(id, service),
            proxy,
        }
    }

    pub fn id(&self) -> u64 {
        self.cdp.id
    }

    pub fn proxy(&self) -> Address {
        self.proxy
    }

    /// Read-only view; reads are the same whoever owns the cup.
    pub fn cdp(&self) -> &Cdp {
        &self.cdp
    }

    pub async fn lock_eth(&self, eth: &Currency) -> Result<Receipt> {
        self.cdp.service.lock_eth_proxy(self.proxy, self.cdp.id, eth).await
    }

    pub async fn free_eth(&self, eth: &Currency) -> Result<Receipt> {
        self.cdp.service.free_eth_proxy(self.proxy, self.cdp.id, eth).await
    }

    pub async fn draw_dai(&self, dai: &Currency) -> Result<Receipt> {
        self.cdp.service.draw_dai_proxy(self.proxy, self.cdp.id, dai).await
    }

    pub async fn wipe_dai(&self, dai: &Currency) -> Result<Receipt> {
        self.cdp.service.wipe_dai_proxy(self.proxy, self.cdp.id, dai).await
    }

    pub async fn shut(&self) -> Result<Receipt> {
        self.cdp.service.shut_proxy(self.proxy, self.cdp.id).await
    }

    pub async fn give(&self, new_owner: Address) -> Result<Receipt> {
        self.cdp.service.give_proxy(self.proxy, self.cdp.id, new_owner).await
    }
}

impl std::fmt::Debug for ProxyCdp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCdp")
            .field("id", &self.cdp.id)
            .field("proxy", &self.proxy)
            .finish()
    }
}
